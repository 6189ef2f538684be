//! Free-text summary notes, one per registration number.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::aggregation::normalize_optional_registration_number;
use crate::companies::store;
use crate::core::shared::error::{ApiError, ApiJson, ApiResult};
use crate::core::shared::models::{summary_notes, Company, NewSummaryNote, SummaryNote};
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::security::auth::AuthenticatedUser;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummaryNoteResponse {
    pub company_id: i32,
    pub company_name: String,
    pub registration_number: String,
    pub summary: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SummaryNoteResponse {
    pub fn new(company: &Company, registration_number: String, note: Option<SummaryNote>) -> Self {
        let (summary, updated_at) = match note {
            Some(note) => (note.summary, note.updated_at.or(Some(note.created_at))),
            None => (None, None),
        };
        Self {
            company_id: company.id,
            company_name: company.company_name.clone(),
            registration_number,
            summary,
            updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveSummaryRequest {
    #[serde(default)]
    pub summary: Option<String>,
}

fn company_with_registration(conn: &mut PgConnection, company_id: i32) -> ApiResult<(Company, String)> {
    let company = store::find_company(conn, company_id)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Company not found"))?;
    let registration_number =
        normalize_optional_registration_number(company.registration_number.as_deref())
            .ok_or_else(|| ApiError::bad_request("Company has no registration number"))?;
    Ok((company, registration_number))
}

pub async fn get_summary_note(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(company_id): Path<i32>,
) -> ApiResult<Json<SummaryNoteResponse>> {
    let mut conn = state.conn.get()?;
    let (company, registration_number) = company_with_registration(&mut conn, company_id)?;

    let note = summary_notes::table
        .filter(summary_notes::registration_number.eq(&registration_number))
        .select(SummaryNote::as_select())
        .first(&mut conn)
        .optional()?;

    Ok(Json(SummaryNoteResponse::new(&company, registration_number, note)))
}

pub async fn save_summary_note(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(company_id): Path<i32>,
    ApiJson(req): ApiJson<SaveSummaryRequest>,
) -> ApiResult<Json<SummaryNoteResponse>> {
    let mut conn = state.conn.get()?;
    let (company, registration_number) = company_with_registration(&mut conn, company_id)?;

    let summary = req.summary.filter(|s| !s.trim().is_empty());
    let note: SummaryNote = diesel::insert_into(summary_notes::table)
        .values(&NewSummaryNote {
            registration_number: registration_number.clone(),
            summary: summary.clone(),
        })
        .on_conflict(summary_notes::registration_number)
        .do_update()
        .set((
            summary_notes::summary.eq(&summary),
            summary_notes::updated_at.eq(Some(Utc::now())),
        ))
        .returning(SummaryNote::as_returning())
        .get_result(&mut conn)?;

    log::info!("Summary note saved for company {}", company.id);
    Ok(Json(SummaryNoteResponse::new(&company, registration_number, Some(note))))
}

pub fn configure_notes_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        ApiUrls::SUMMARY_NOTES,
        get(get_summary_note).post(save_summary_note),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::testing::{company, note};

    #[test]
    fn test_response_without_note() {
        let c = company(7, "Acme Pensions Ltd", Some("01234567"));
        let response = SummaryNoteResponse::new(&c, "01234567".into(), None);
        assert_eq!(response.company_id, 7);
        assert_eq!(response.summary, None);
        assert_eq!(response.updated_at, None);
    }

    #[test]
    fn test_response_falls_back_to_created_at() {
        let c = company(7, "Acme Pensions Ltd", Some("01234567"));
        let n = note("01234567", Some("Scheme closed to new members"));
        let created = n.created_at;
        let response = SummaryNoteResponse::new(&c, "01234567".into(), Some(n));
        assert_eq!(response.summary.as_deref(), Some("Scheme closed to new members"));
        assert_eq!(response.updated_at, Some(created));
    }
}
