//! Database access shared by the company, ingestion and extraction paths.
//!
//! Registration numbers passed in here are expected to be normalized already.

use chrono::{Datelike, Utc};
use diesel::prelude::*;
use diesel::upsert::{excluded, on_constraint};
use serde_json::Value;

use crate::aggregation::{normalize_series, FinancialSeries, LinkRepair, NormalizedSeries};
use crate::core::shared::enums::ProcessingStatus;
use crate::core::shared::models::{
    company_charges, company_data, company_pdfs, key_financial_data, people_data, Company,
    KeyFinancialChanges, KeyFinancialData, NewCompanyCharges, NewKeyFinancialStub, NewPerson,
};
use crate::extraction::SeriesInput;

const PEOPLE_UNIQUE_CONSTRAINT: &str = "people_data_unique_entry";

/// Escape `%`, `_` and `\` so a value can be used in a LIKE pattern.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn find_company(conn: &mut PgConnection, id: i32) -> QueryResult<Company> {
    company_data::table
        .find(id)
        .select(Company::as_select())
        .first(conn)
}

pub fn find_company_by_registration(
    conn: &mut PgConnection,
    registration_number: &str,
) -> QueryResult<Option<Company>> {
    company_data::table
        .filter(company_data::registration_number.eq(registration_number))
        .order(company_data::id.asc())
        .select(Company::as_select())
        .first(conn)
        .optional()
}

/// Case-insensitive exact match on the company name.
pub fn find_company_by_name(conn: &mut PgConnection, name: &str) -> QueryResult<Option<Company>> {
    company_data::table
        .filter(company_data::company_name.ilike(escape_like(name.trim())))
        .order(company_data::id.asc())
        .select(Company::as_select())
        .first(conn)
        .optional()
}

pub fn find_key_financial(
    conn: &mut PgConnection,
    registration_number: &str,
) -> QueryResult<Option<KeyFinancialData>> {
    key_financial_data::table
        .filter(key_financial_data::registration_number.eq(registration_number))
        .select(KeyFinancialData::as_select())
        .first(conn)
        .optional()
}

/// Id of the key financial row for `registration_number`, creating it if needed.
pub fn ensure_key_financial_stub(
    conn: &mut PgConnection,
    registration_number: &str,
    company_name: Option<&str>,
) -> QueryResult<i32> {
    diesel::insert_into(key_financial_data::table)
        .values(&NewKeyFinancialStub {
            registration_number: registration_number.to_string(),
            company_name: company_name.map(str::to_string),
        })
        .on_conflict(key_financial_data::registration_number)
        .do_nothing()
        .execute(conn)?;

    key_financial_data::table
        .filter(key_financial_data::registration_number.eq(registration_number))
        .select(key_financial_data::id)
        .first(conn)
}

/// An incoming series label that maps to no calendar year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedLabel {
    pub series: &'static str,
    pub label: String,
}

impl DroppedLabel {
    pub fn row_message(&self, row: usize) -> String {
        format!(
            "Row {row}: unrecognised year label '{}' in {}",
            self.label, self.series
        )
    }
}

/// The stored key financial row and what was left out of it.
#[derive(Debug, Clone)]
pub struct StoredKeyFinancial {
    pub record: KeyFinancialData,
    pub dropped: Vec<DroppedLabel>,
}

impl StoredKeyFinancial {
    /// At least one series value is stored under a calendar year.
    pub fn has_key_data(&self) -> bool {
        NormalizedSeries::from_record(&self.record).has_values()
    }
}

/// Merged series value to write, if anything usable came in, and the
/// incoming labels that were dropped.
fn merge_series(
    existing: &Value,
    incoming: Option<&Value>,
    reference_year: Option<i32>,
) -> (Option<Value>, Vec<String>) {
    let Some(incoming) = incoming else {
        return (None, Vec::new());
    };
    let incoming = normalize_series(incoming, reference_year);
    if incoming.series.is_empty() {
        return (None, incoming.dropped);
    }
    let mut merged: FinancialSeries = normalize_series(existing, reference_year).series;
    merged.merge(&incoming.series);
    (Some(merged.to_json()), incoming.dropped)
}

/// Write scalar fields and merge year-keyed series into the stored record.
///
/// Series are stored re-keyed by calendar year; values for years already
/// present are replaced by the incoming ones.
pub fn upsert_key_financial(
    conn: &mut PgConnection,
    registration_number: &str,
    mut changes: KeyFinancialChanges,
    series: &SeriesInput,
) -> QueryResult<StoredKeyFinancial> {
    conn.transaction(|conn| {
        ensure_key_financial_stub(conn, registration_number, changes.company_name.as_deref())?;
        let existing: KeyFinancialData = key_financial_data::table
            .filter(key_financial_data::registration_number.eq(registration_number))
            .select(KeyFinancialData::as_select())
            .for_update()
            .first(conn)?;

        let reference_year = changes
            .latest_accounts_date
            .or(existing.latest_accounts_date)
            .map(|d| d.year());

        let mut dropped = Vec::new();
        let mut merge = |name: &'static str, stored: &Value, incoming: Option<&Value>| {
            let (value, labels) = merge_series(stored, incoming, reference_year);
            dropped.extend(labels.into_iter().map(|label| DroppedLabel { series: name, label }));
            value
        };
        changes.turnover = merge("turnover", &existing.turnover, series.turnover.as_ref());
        changes.profit = merge("profit", &existing.profit, series.profit.as_ref());
        changes.fair_value_assets = merge(
            "fair_value_assets",
            &existing.fair_value_assets,
            series.fair_value_assets.as_ref(),
        );
        changes.surplus = merge("surplus", &existing.surplus, series.surplus.as_ref());
        changes.updated_at = Some(Utc::now());

        let record = diesel::update(key_financial_data::table.find(existing.id))
            .set(&changes)
            .returning(KeyFinancialData::as_returning())
            .get_result(conn)?;
        Ok(StoredKeyFinancial { record, dropped })
    })
}

/// Point every company with `registration_number` at `key_financial_data_id`.
pub fn link_companies(
    conn: &mut PgConnection,
    registration_number: &str,
    key_financial_data_id: i32,
) -> QueryResult<usize> {
    diesel::update(
        company_data::table
            .filter(company_data::registration_number.eq(registration_number))
            .filter(
                company_data::key_financial_data_id
                    .is_null()
                    .or(company_data::key_financial_data_id.ne(key_financial_data_id)),
            ),
    )
    .set(company_data::key_financial_data_id.eq(Some(key_financial_data_id)))
    .execute(conn)
}

/// `Processing` companies with this registration number become `Done`.
pub fn promote_processing(conn: &mut PgConnection, registration_number: &str) -> QueryResult<usize> {
    diesel::update(
        company_data::table
            .filter(company_data::registration_number.eq(registration_number))
            .filter(company_data::status.eq(ProcessingStatus::Processing)),
    )
    .set((
        company_data::status.eq(ProcessingStatus::Done),
        company_data::updated_at.eq(Utc::now()),
    ))
    .execute(conn)
}

pub fn set_company_status(
    conn: &mut PgConnection,
    id: i32,
    status: ProcessingStatus,
) -> QueryResult<usize> {
    diesel::update(company_data::table.find(id))
        .set((
            company_data::status.eq(status),
            company_data::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
}

/// Insert people, skipping rows that already exist. Returns the number added.
pub fn insert_people(conn: &mut PgConnection, people: &[NewPerson]) -> QueryResult<usize> {
    if people.is_empty() {
        return Ok(0);
    }
    diesel::insert_into(people_data::table)
        .values(people)
        .on_conflict(on_constraint(PEOPLE_UNIQUE_CONSTRAINT))
        .do_nothing()
        .execute(conn)
}

pub fn replace_pdf_links(
    conn: &mut PgConnection,
    registration_number: &str,
    links: &[String],
) -> QueryResult<usize> {
    diesel::insert_into(company_pdfs::table)
        .values((
            company_pdfs::registration_number.eq(registration_number),
            company_pdfs::pdf_links.eq(Value::from(links.to_vec())),
        ))
        .on_conflict(company_pdfs::registration_number)
        .do_update()
        .set(company_pdfs::pdf_links.eq(excluded(company_pdfs::pdf_links)))
        .execute(conn)
}

pub fn replace_charges(conn: &mut PgConnection, charges: &NewCompanyCharges) -> QueryResult<usize> {
    diesel::insert_into(company_charges::table)
        .values(charges)
        .on_conflict(company_charges::registration_number)
        .do_update()
        .set(charges)
        .execute(conn)
}

/// Persist link repairs and status promotions found while aggregating.
pub fn write_back_aggregation(
    conn: &mut PgConnection,
    link_repairs: &[LinkRepair],
    promotions: &[i32],
) -> QueryResult<()> {
    if link_repairs.is_empty() && promotions.is_empty() {
        return Ok(());
    }
    conn.transaction(|conn| {
        for repair in link_repairs.iter().filter(|r| r.needs_write_back()) {
            diesel::update(company_data::table.find(repair.company_id))
                .set(company_data::key_financial_data_id.eq(repair.resolved))
                .execute(conn)?;
        }
        if !promotions.is_empty() {
            diesel::update(
                company_data::table
                    .filter(company_data::id.eq_any(promotions))
                    .filter(company_data::status.eq(ProcessingStatus::Processing)),
            )
            .set((
                company_data::status.eq(ProcessingStatus::Done),
                company_data::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        }
        Ok(())
    })
}

/// Key financial rows for a set of registration numbers.
pub fn key_data_for(
    conn: &mut PgConnection,
    registration_numbers: &[String],
) -> QueryResult<Vec<KeyFinancialData>> {
    if registration_numbers.is_empty() {
        return Ok(Vec::new());
    }
    key_financial_data::table
        .filter(key_financial_data::registration_number.eq_any(registration_numbers))
        .select(KeyFinancialData::as_select())
        .load(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::testing::key_data;
    use serde_json::json;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("Acme Ltd"), "Acme Ltd");
        assert_eq!(escape_like("100%_Pensions\\"), "100\\%\\_Pensions\\\\");
    }

    #[test]
    fn test_merge_series_reports_dropped_labels() {
        let stored = json!({"2021": 5.0, "2022": 7.0});
        let (value, dropped) =
            merge_series(&stored, Some(&json!({"2022": 8.0, "Notes": 1.0})), None);
        assert_eq!(value, Some(json!({"2021": 5.0, "2022": 8.0})));
        assert_eq!(dropped, vec!["Notes".to_string()]);

        let (value, dropped) = merge_series(&stored, Some(&json!({"latest": 900})), None);
        assert_eq!(value, None);
        assert_eq!(dropped, vec!["latest".to_string()]);

        let (value, _) = merge_series(&stored, Some(&json!({"latest": 900})), Some(2023));
        assert_eq!(value, Some(json!({"2021": 5.0, "2022": 7.0, "2023": 900.0})));

        assert_eq!(merge_series(&stored, None, None), (None, Vec::new()));
    }

    #[test]
    fn test_dropped_label_message() {
        let dropped = DroppedLabel {
            series: "turnover",
            label: "notes".into(),
        };
        assert_eq!(
            dropped.row_message(4),
            "Row 4: unrecognised year label 'notes' in turnover"
        );
    }

    #[test]
    fn test_key_data_needs_a_calendar_year() {
        let unresolved = StoredKeyFinancial {
            record: key_data(1, "01234567", json!({"latest": 900})),
            dropped: Vec::new(),
        };
        assert!(!unresolved.has_key_data());

        let mut record = key_data(1, "01234567", json!({"latest": 900}));
        record.latest_accounts_date = chrono::NaiveDate::from_ymd_opt(2023, 12, 31);
        let resolved = StoredKeyFinancial {
            record,
            dropped: Vec::new(),
        };
        assert!(resolved.has_key_data());
    }
}
