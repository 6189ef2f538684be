//! Company listing and approval workflow.

pub mod store;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::aggregation::{
    aggregate_companies, derive_company_status, normalize_optional_registration_number,
    CompanyOverview, KeyFinancialView,
};
use crate::core::shared::enums::{ApprovalStage, CompanyStatus, ProcessingStatus};
use crate::core::shared::error::{ApiError, ApiJson, ApiResult};
use crate::core::shared::models::{
    company_data, company_pdfs, summary_notes, Company, CompanyPdfs, SummaryNote,
};
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::extraction::apply_extraction_response;
use crate::security::auth::AuthenticatedUser;

pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE_SIZE: i64 = 500;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompanyListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub search: Option<String>,
    pub sort_order: Option<String>,
    pub show_inactive: Option<String>,
    pub approval: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalFilter {
    All,
    Approved,
    /// Stages 0 and 2.
    Unapproved,
}

/// Validated form of [`CompanyListQuery`].
#[derive(Debug, Clone, PartialEq)]
pub struct ListFilters {
    pub page: i64,
    pub per_page: i64,
    pub search: Option<String>,
    pub sort_order: SortOrder,
    pub show_inactive: bool,
    pub approval: ApprovalFilter,
    pub status: Option<ProcessingStatus>,
    offset: i64,
}

impl ListFilters {
    pub fn from_query(query: CompanyListQuery) -> ApiResult<Self> {
        let page = query.page.unwrap_or(1);
        if page < 1 {
            return Err(ApiError::bad_request("page must be 1 or greater"));
        }
        let per_page = query.per_page.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&per_page) {
            return Err(ApiError::bad_request(format!(
                "per_page must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        let offset = (page - 1)
            .checked_mul(per_page)
            .ok_or_else(|| ApiError::bad_request("page is out of range"))?;

        let sort_order = match lowered(query.sort_order).as_deref() {
            None | Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            Some(other) => {
                return Err(ApiError::bad_request(format!("Invalid sort_order: {other}")))
            }
        };
        let show_inactive = match lowered(query.show_inactive).as_deref() {
            None | Some("no") | Some("false") => false,
            Some("yes") | Some("true") => true,
            Some(other) => {
                return Err(ApiError::bad_request(format!("Invalid show_inactive: {other}")))
            }
        };
        let approval = match lowered(query.approval).as_deref() {
            None | Some("all") => ApprovalFilter::All,
            Some("approved") => ApprovalFilter::Approved,
            Some("unapproved") => ApprovalFilter::Unapproved,
            Some(other) => return Err(ApiError::bad_request(format!("Invalid approval: {other}"))),
        };
        let status = match query.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) if s.eq_ignore_ascii_case("all") => None,
            Some(s) => Some(s.parse::<ProcessingStatus>().map_err(ApiError::bad_request)?),
        };

        Ok(Self {
            page,
            per_page,
            search: query
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            sort_order,
            show_inactive,
            approval,
            status,
            offset,
        })
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}

fn lowered(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        Self {
            page,
            per_page,
            total,
            total_pages: (total + per_page - 1) / per_page,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompanyListResponse {
    pub data: Vec<CompanyOverview>,
    pub pagination: Pagination,
}

fn filtered_companies(filters: &ListFilters) -> company_data::BoxedQuery<'static, Pg> {
    let mut q = company_data::table.into_boxed();

    if !filters.show_inactive {
        q = q.filter(
            company_data::registration_number
                .is_not_null()
                .and(company_data::registration_number.ne("")),
        );
    }

    match filters.approval {
        ApprovalFilter::All => {}
        ApprovalFilter::Approved => {
            q = q.filter(company_data::approval_stage.eq(ApprovalStage::Approved));
        }
        ApprovalFilter::Unapproved => {
            q = q.filter(company_data::approval_stage.ne(ApprovalStage::Approved));
        }
    }

    if let Some(status) = filters.status {
        q = q.filter(company_data::status.eq(status));
    }

    if let Some(search) = &filters.search {
        let pattern = format!("%{}%", store::escape_like(search));
        q = q.filter(
            company_data::company_name
                .ilike(pattern.clone())
                .or(company_data::registration_number.ilike(pattern)),
        );
    }

    q
}

pub async fn list_companies(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<CompanyListQuery>,
) -> ApiResult<Json<CompanyListResponse>> {
    let filters = ListFilters::from_query(query)?;
    let mut conn = state.conn.get()?;

    let total: i64 = filtered_companies(&filters).count().get_result(&mut conn)?;

    let ordered = match filters.sort_order {
        SortOrder::Asc => filtered_companies(&filters)
            .order((company_data::company_name.asc(), company_data::id.asc())),
        SortOrder::Desc => filtered_companies(&filters)
            .order((company_data::company_name.desc(), company_data::id.desc())),
    };
    let companies: Vec<Company> = ordered
        .limit(filters.per_page)
        .offset(filters.offset())
        .load(&mut conn)?;

    let regs: Vec<String> = companies
        .iter()
        .filter_map(|c| normalize_optional_registration_number(c.registration_number.as_deref()))
        .collect();
    let key_data = store::key_data_for(&mut conn, &regs)?;
    let pdfs: Vec<CompanyPdfs> = company_pdfs::table
        .filter(company_pdfs::registration_number.eq_any(&regs))
        .load(&mut conn)?;
    let notes: Vec<SummaryNote> = summary_notes::table
        .filter(summary_notes::registration_number.eq_any(&regs))
        .select(SummaryNote::as_select())
        .load(&mut conn)?;

    let aggregation = aggregate_companies(&companies, &key_data, &pdfs, &notes);
    if let Err(e) =
        store::write_back_aggregation(&mut conn, &aggregation.link_repairs, &aggregation.promotions)
    {
        warn!("Failed to write back company links: {}", e);
    }

    Ok(Json(CompanyListResponse {
        data: aggregation.rows,
        pagination: Pagination::new(filters.page, filters.per_page, total),
    }))
}

/// Approved companies keep their registration number.
pub fn ensure_registration_editable(company: &Company) -> ApiResult<()> {
    if company.approval_stage == ApprovalStage::Approved {
        return Err(ApiError::Conflict(
            "Registration number cannot be changed for an approved company".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UpdateRegistrationNumberRequest {
    #[serde(default)]
    pub registration_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateRegistrationNumberResponse {
    pub message: String,
    pub new_registration_number: Option<String>,
    pub company_status: CompanyStatus,
}

pub async fn update_registration_number(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<UpdateRegistrationNumberRequest>,
) -> ApiResult<Json<UpdateRegistrationNumberResponse>> {
    let mut conn = state.conn.get()?;
    let company = store::find_company(&mut conn, id)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Company not found"))?;
    ensure_registration_editable(&company)?;

    let registration_number =
        normalize_optional_registration_number(req.registration_number.as_deref());
    let key_financial_data_id = match &registration_number {
        Some(reg) => store::find_key_financial(&mut conn, reg)?.map(|k| k.id),
        None => None,
    };

    diesel::update(company_data::table.find(id))
        .set((
            company_data::registration_number.eq(&registration_number),
            company_data::key_financial_data_id.eq(key_financial_data_id),
            company_data::status.eq(ProcessingStatus::NotStarted),
            company_data::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

    info!(
        "Company {} registration number changed to {:?}",
        id, registration_number
    );

    Ok(Json(UpdateRegistrationNumberResponse {
        message: "Registration number updated".to_string(),
        company_status: derive_company_status(registration_number.as_deref()),
        new_registration_number: registration_number,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateApprovalStageRequest {
    pub approval_stage: i32,
}

/// Unapproving or rejecting a company sends it back to `Not Started`.
pub fn status_after_approval(stage: ApprovalStage, current: ProcessingStatus) -> ProcessingStatus {
    if stage.resets_processing() {
        ProcessingStatus::NotStarted
    } else {
        current
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateApprovalStageResponse {
    pub message: String,
    pub approval_stage: ApprovalStage,
    pub new_status: ProcessingStatus,
}

pub async fn update_approval_stage(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<UpdateApprovalStageRequest>,
) -> ApiResult<Json<UpdateApprovalStageResponse>> {
    let stage = ApprovalStage::try_from(req.approval_stage).map_err(ApiError::bad_request)?;

    let mut conn = state.conn.get()?;
    let company = store::find_company(&mut conn, id)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Company not found"))?;

    let new_status = status_after_approval(stage, company.status);

    diesel::update(company_data::table.find(id))
        .set((
            company_data::approval_stage.eq(stage),
            company_data::status.eq(new_status),
            company_data::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

    Ok(Json(UpdateApprovalStageResponse {
        message: format!("Approval stage set to {}", stage.label()),
        approval_stage: stage,
        new_status,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeleteCompaniesRequest {
    #[serde(default)]
    pub ids: Vec<i32>,
}

#[derive(Debug, Serialize)]
pub struct DeleteCompaniesResponse {
    pub deleted_count: usize,
}

pub async fn delete_companies(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    ApiJson(req): ApiJson<DeleteCompaniesRequest>,
) -> ApiResult<Json<DeleteCompaniesResponse>> {
    if req.ids.is_empty() {
        return Err(ApiError::bad_request("No company ids given"));
    }
    let mut conn = state.conn.get()?;
    let deleted_count = diesel::delete(company_data::table.filter(company_data::id.eq_any(&req.ids)))
        .execute(&mut conn)?;
    info!("Deleted {} companies", deleted_count);
    Ok(Json(DeleteCompaniesResponse { deleted_count }))
}

pub async fn get_key_financial_data(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<KeyFinancialView>> {
    let mut conn = state.conn.get()?;
    let company = store::find_company(&mut conn, id)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Company not found"))?;

    let record = match normalize_optional_registration_number(company.registration_number.as_deref()) {
        Some(reg) => store::find_key_financial(&mut conn, &reg)?,
        None => None,
    }
    .ok_or_else(|| ApiError::not_found("Key financial data not found"))?;

    if company.key_financial_data_id != Some(record.id) {
        diesel::update(company_data::table.find(id))
            .set(company_data::key_financial_data_id.eq(Some(record.id)))
            .execute(&mut conn)?;
    }

    Ok(Json(KeyFinancialView::new(company.id, &record)))
}

#[derive(Debug, Serialize)]
pub struct ReprocessResponse {
    pub message: String,
    pub new_status: ProcessingStatus,
}

pub async fn reprocess_company(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<ReprocessResponse>> {
    let client = state
        .extraction
        .as_ref()
        .filter(|c| c.can_reprocess())
        .ok_or_else(|| {
            ApiError::ServiceUnavailable("Reprocessing service is not configured".to_string())
        })?;

    let company = {
        let mut conn = state.conn.get()?;
        store::find_company(&mut conn, id)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Company not found"))?
    };
    let registration_number =
        normalize_optional_registration_number(company.registration_number.as_deref())
            .ok_or_else(|| ApiError::bad_request("Company has no registration number"))?;

    let response = client.reprocess_company(&registration_number).await?;

    let mut conn = state.conn.get()?;
    let outcome = apply_extraction_response(
        &mut conn,
        &registration_number,
        Some(&company.company_name),
        response,
    )?;
    let new_status = outcome.company_status();
    store::set_company_status(&mut conn, id, new_status)?;

    info!("Company {} sent for reprocessing, status {}", id, new_status);
    Ok(Json(ReprocessResponse {
        message: format!("Reprocessing started for {}", company.company_name),
        new_status,
    }))
}

pub fn configure_companies_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::COMPANY_DATA, get(list_companies))
        .route(ApiUrls::UPDATE_REGISTRATION_NUMBER, put(update_registration_number))
        .route(ApiUrls::UPDATE_APPROVAL_STAGE, put(update_approval_stage))
        .route(ApiUrls::DELETE_COMPANIES, post(delete_companies))
        .route(ApiUrls::KEY_FINANCIAL_DATA, get(get_key_financial_data))
        .route(ApiUrls::REPROCESS_COMPANY, post(reprocess_company))
}
