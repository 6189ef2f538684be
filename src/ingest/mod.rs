//! CSV company uploads and key financial workbook imports.

pub mod csv_upload;
pub mod headers;
pub mod workbook;

use axum::{
    extract::{Multipart, Query, State},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::companies::store;
use crate::core::shared::enums::{ApprovalStage, ProcessingStatus};
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::{company_data, csv_file_data, Company, NewCompany, NewCsvFileRow};
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::extraction::{apply_extraction_response, ExtractionError};
use crate::security::auth::AuthenticatedUser;

pub use csv_upload::{parse_company_csv, CsvCompanyRow};
pub use workbook::{
    parse_key_financial_rows, pick_import_sheet, read_import_sheet, KeyFinancialRow, WorkbookImport,
};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("No file was uploaded")]
    NoFile,
    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),
    #[error("The uploaded file is empty")]
    EmptyFile,
    #[error("Missing {0} column")]
    MissingColumn(&'static str),
    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid workbook: {0}")]
    Workbook(String),
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

/// Uploaded file taken from the `file` field, or the first file field.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default()
    }

    pub fn require_extension(&self, allowed: &[&str]) -> Result<(), IngestError> {
        if allowed.contains(&self.extension().as_str()) {
            Ok(())
        } else {
            Err(IngestError::UnsupportedFile(self.filename.clone()))
        }
    }
}

pub async fn read_upload(multipart: &mut Multipart) -> ApiResult<UploadedFile> {
    while let Some(field) = multipart.next_field().await? {
        let is_file = field.name() == Some("file") || field.file_name().is_some();
        if !is_file {
            continue;
        }
        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "upload".to_string());
        let bytes = field.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(IngestError::EmptyFile.into());
        }
        return Ok(UploadedFile { filename, bytes });
    }
    Err(IngestError::NoFile.into())
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UploadQuery {
    #[serde(default = "default_process")]
    pub process: bool,
}

fn default_process() -> bool {
    true
}

#[derive(Debug, Default, Serialize)]
pub struct UploadSummary {
    pub filename: String,
    pub total_rows: usize,
    pub created: usize,
    pub updated: usize,
    pub processed: usize,
    pub errors: Vec<String>,
}

impl UploadSummary {
    /// Name to upsert under, or a row error when the row has none.
    fn company_name<'r>(&mut self, row: &'r CsvCompanyRow) -> Option<&'r str> {
        if row.company_name.is_none() {
            self.errors.push(format!("Row {}: missing company name", row.line));
        }
        row.company_name.as_deref()
    }

    fn record_saved(&mut self, upserted: &Upserted) -> i32 {
        match *upserted {
            Upserted::Created(id) => {
                self.created += 1;
                id
            }
            Upserted::Updated(id) => {
                self.updated += 1;
                id
            }
        }
    }

    fn record_extraction_failure(&mut self, row: &CsvCompanyRow, reg: &str, err: &ExtractionError) {
        self.errors
            .push(format!("Row {}: extraction failed for {}: {}", row.line, reg, err));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upserted {
    Created(i32),
    Updated(i32),
}

/// Company a CSV row updates: same registration number first, then same name.
fn find_existing<C, E>(
    conn: &mut C,
    registration_number: Option<&str>,
    company_name: &str,
    by_registration: impl FnOnce(&mut C, &str) -> Result<Option<Company>, E>,
    by_name: impl FnOnce(&mut C, &str) -> Result<Option<Company>, E>,
) -> Result<Option<Company>, E> {
    if let Some(reg) = registration_number {
        if let Some(company) = by_registration(conn, reg)? {
            return Ok(Some(company));
        }
    }
    by_name(conn, company_name)
}

fn upsert_company(
    conn: &mut PgConnection,
    row: &CsvCompanyRow,
    company_name: &str,
) -> QueryResult<Upserted> {
    conn.transaction(|conn| {
        let key_financial_data_id = match &row.registration_number {
            Some(reg) => Some(store::ensure_key_financial_stub(conn, reg, Some(company_name))?),
            None => None,
        };

        let existing = find_existing(
            conn,
            row.registration_number.as_deref(),
            company_name,
            store::find_company_by_registration,
            store::find_company_by_name,
        )?;

        match existing {
            Some(company) => {
                let registration_number = row
                    .registration_number
                    .clone()
                    .or(company.registration_number.clone());
                diesel::update(company_data::table.find(company.id))
                    .set((
                        company_data::company_name.eq(company_name),
                        company_data::registration_number.eq(&registration_number),
                        company_data::key_financial_data_id
                            .eq(key_financial_data_id.or(company.key_financial_data_id)),
                        company_data::type_of_scheme
                            .eq(row.type_of_scheme.clone().or(company.type_of_scheme.clone())),
                        company_data::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;
                Ok(Upserted::Updated(company.id))
            }
            None => {
                let id = diesel::insert_into(company_data::table)
                    .values(&NewCompany {
                        company_name: company_name.to_string(),
                        registration_number: row.registration_number.clone(),
                        approval_stage: ApprovalStage::Unapproved,
                        status: ProcessingStatus::NotStarted,
                        key_financial_data_id,
                        type_of_scheme: row.type_of_scheme.clone(),
                    })
                    .returning(company_data::id)
                    .get_result(conn)?;
                Ok(Upserted::Created(id))
            }
        }
    })
}

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadSummary>> {
    let upload = read_upload(&mut multipart).await?;
    upload.require_extension(&["csv"])?;
    let rows = parse_company_csv(&upload.bytes)?;

    let extraction = state
        .extraction
        .as_ref()
        .filter(|c| query.process && c.can_process());
    if query.process && extraction.is_none() {
        warn!("Extraction API not configured; {} rows stored without processing", rows.len());
    }

    let mut summary = UploadSummary {
        filename: upload.filename.clone(),
        total_rows: rows.len(),
        ..UploadSummary::default()
    };

    for row in &rows {
        let Some(company_name) = summary.company_name(row) else {
            continue;
        };

        let company_id = {
            let mut conn = state.conn.get()?;
            diesel::insert_into(csv_file_data::table)
                .values(&NewCsvFileRow {
                    company_name: row.company_name.clone(),
                    registration_number: row.registration_number.clone(),
                    address1: row.address1.clone(),
                    address2: row.address2.clone(),
                    address3: row.address3.clone(),
                    city: row.city.clone(),
                    county: row.county.clone(),
                    postcode: row.postcode.clone(),
                    source_file: upload.filename.clone(),
                })
                .execute(&mut conn)?;

            match upsert_company(&mut conn, row, company_name) {
                Ok(upserted) => summary.record_saved(&upserted),
                Err(e) => {
                    error!("Row {} of {}: {}", row.line, upload.filename, e);
                    summary.errors.push(format!("Row {}: could not be saved", row.line));
                    continue;
                }
            }
        };

        let (Some(client), Some(reg)) = (extraction, row.registration_number.as_deref()) else {
            continue;
        };

        match client.process_company(reg, company_name).await {
            Ok(response) => {
                let mut conn = state.conn.get()?;
                let status = match apply_extraction_response(&mut conn, reg, Some(company_name), response) {
                    Ok(outcome) => outcome.company_status(),
                    Err(e) => {
                        warn!("Extraction data for {} not stored: {}", reg, e);
                        ProcessingStatus::Processing
                    }
                };
                store::set_company_status(&mut conn, company_id, status)?;
                summary.processed += 1;
            }
            Err(e) => {
                warn!("Extraction request for {} failed: {}", reg, e);
                summary.record_extraction_failure(row, reg, &e);
            }
        }
    }

    info!(
        "Upload {}: {} rows, {} created, {} updated, {} processed, {} errors",
        summary.filename,
        summary.total_rows,
        summary.created,
        summary.updated,
        summary.processed,
        summary.errors.len()
    );
    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    pub message: String,
    pub updated_count: usize,
    pub errors: Vec<String>,
}

pub async fn import_key_financial_data(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    mut multipart: Multipart,
) -> ApiResult<Json<ImportSummary>> {
    let upload = read_upload(&mut multipart).await?;
    upload.require_extension(&["xlsx", "xls"])?;

    let bytes = upload.bytes;
    let rows = tokio::task::spawn_blocking(move || read_import_sheet(bytes))
        .await
        .map_err(|e| ApiError::Internal(format!("workbook task failed: {e}")))??;
    let import = parse_key_financial_rows(&rows)?;

    let mut errors = import.errors;
    let mut updated_count = 0;
    let mut conn = state.conn.get()?;

    for row in import.rows {
        let result = conn.transaction(|conn| {
            let stored =
                store::upsert_key_financial(conn, &row.registration_number, row.changes, &row.series)?;
            store::link_companies(conn, &row.registration_number, stored.record.id)?;
            if stored.has_key_data() {
                store::promote_processing(conn, &row.registration_number)?;
            }
            Ok::<_, diesel::result::Error>(stored.dropped)
        });
        match result {
            Ok(dropped) => {
                updated_count += 1;
                errors.extend(dropped.iter().map(|d| d.row_message(row.row)));
            }
            Err(e) => {
                error!("Import row {} ({}): {}", row.row, row.registration_number, e);
                errors.push(format!(
                    "Row {}: could not save {}",
                    row.row, row.registration_number
                ));
            }
        }
    }

    info!("Imported key financial data for {} companies", updated_count);
    Ok(Json(ImportSummary {
        message: format!("Imported key financial data for {updated_count} companies"),
        updated_count,
        errors,
    }))
}

pub fn configure_ingest_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::UPLOAD_FILE, post(upload_file))
        .route(ApiUrls::IMPORT_KEY_FINANCIAL_DATA, post(import_key_financial_data))
}
