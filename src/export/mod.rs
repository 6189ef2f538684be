//! Multi-sheet `.xlsx` export of selected companies.

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use diesel::prelude::*;
use log::info;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::Deserialize;
use std::sync::Arc;

use crate::aggregation::{
    build_export_bundle, normalize_optional_registration_number, Cell, ExportBundle,
    ExportOptions, ExportSources,
};
use crate::companies::store;
use crate::core::shared::error::{ApiError, ApiJson, ApiResult};
use crate::core::shared::models::{
    company_charges, company_data, company_pdfs, people_data, summary_notes, Company,
    CompanyCharges, CompanyPdfs, Person, SummaryNote,
};
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::security::auth::AuthenticatedUser;

pub const CONTENT_DISPOSITION_VALUE: &str = "attachment; filename=\"exported_companies.xlsx\"";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to write workbook: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("Too many rows for sheet {0}")]
    TooManyRows(String),
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// Serialize a bundle; each sheet gets a bold, frozen header row.
pub fn write_workbook(bundle: &ExportBundle) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    for sheet in &bundle.sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (col, title) in sheet.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, title, &bold)?;
        }
        worksheet.set_freeze_panes(1, 0)?;

        for (i, cells) in sheet.rows.iter().enumerate() {
            let row = u32::try_from(i + 1).map_err(|_| ExportError::TooManyRows(sheet.name.clone()))?;
            for (col, cell) in cells.iter().enumerate() {
                let col = col as u16;
                match cell {
                    Cell::Text(text) => {
                        worksheet.write_string(row, col, text)?;
                    }
                    Cell::Number(value) => {
                        worksheet.write_number(row, col, *value)?;
                    }
                    Cell::Empty => {}
                }
            }
        }

        if !sheet.headers.is_empty() {
            worksheet.autofit();
        }
    }

    Ok(workbook.save_to_buffer()?)
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub ids: Vec<i32>,
    #[serde(flatten)]
    pub options: ExportOptions,
}

fn load_sources(conn: &mut PgConnection, ids: &[i32], options: ExportOptions) -> QueryResult<ExportSources> {
    let companies: Vec<Company> = company_data::table
        .filter(company_data::id.eq_any(ids))
        .order(company_data::id.asc())
        .select(Company::as_select())
        .load(conn)?;

    let regs: Vec<String> = companies
        .iter()
        .filter_map(|c| normalize_optional_registration_number(c.registration_number.as_deref()))
        .collect();

    let pdfs: Vec<CompanyPdfs> = company_pdfs::table
        .filter(company_pdfs::registration_number.eq_any(&regs))
        .load(conn)?;
    let key_data = store::key_data_for(conn, &regs)?;

    let people: Vec<Person> = if options.people_data {
        people_data::table
            .filter(people_data::registration_number.eq_any(&regs))
            .select(Person::as_select())
            .load(conn)?
    } else {
        Vec::new()
    };
    let notes: Vec<SummaryNote> = if options.summary_notes {
        summary_notes::table
            .filter(summary_notes::registration_number.eq_any(&regs))
            .select(SummaryNote::as_select())
            .load(conn)?
    } else {
        Vec::new()
    };
    let charges: Vec<CompanyCharges> = if options.company_charges {
        company_charges::table
            .filter(company_charges::registration_number.eq_any(&regs))
            .select(CompanyCharges::as_select())
            .load(conn)?
    } else {
        Vec::new()
    };

    Ok(ExportSources {
        companies,
        key_data,
        pdfs,
        notes,
        people,
        charges,
    })
}

pub fn xlsx_response(bytes: Vec<u8>) -> Response {
    let mut response = bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(XLSX_CONTENT_TYPE));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static(CONTENT_DISPOSITION_VALUE),
    );
    response
}

pub async fn export_company_data(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    ApiJson(req): ApiJson<ExportRequest>,
) -> ApiResult<Response> {
    if req.ids.is_empty() {
        return Err(ApiError::bad_request("No company ids given"));
    }

    let sources = {
        let mut conn = state.conn.get()?;
        load_sources(&mut conn, &req.ids, req.options)?
    };
    if sources.companies.is_empty() {
        return Err(ApiError::not_found("No companies found for the given ids"));
    }

    let count = sources.companies.len();
    let options = req.options;
    let bytes = tokio::task::spawn_blocking(move || {
        write_workbook(&build_export_bundle(&sources, options))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("export task failed: {e}")))??;

    info!("Exported {} companies ({} bytes)", count, bytes.len());
    Ok(xlsx_response(bytes))
}

pub fn configure_export_routes() -> Router<Arc<AppState>> {
    Router::new().route(ApiUrls::EXPORT_COMPANY_DATA, post(export_company_data))
}
