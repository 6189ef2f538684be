use diesel::prelude::*;
use log::{debug, info, warn};
use serde_json::Value;

use super::{ExtractionResponse, PersonPayload};
use crate::aggregation::{date_from_json, pdf_links_from_json};
use crate::companies::store;
use crate::core::shared::enums::ProcessingStatus;
use crate::core::shared::models::{NewCompanyCharges, NewPerson};

/// What was stored from one extraction response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub key_data_stored: bool,
    pub people_added: usize,
    pub pdfs_stored: bool,
    pub charges_stored: bool,
}

impl ExtractionOutcome {
    /// Status the company moves to once the request was accepted.
    pub fn company_status(&self) -> ProcessingStatus {
        if self.key_data_stored {
            ProcessingStatus::Done
        } else {
            ProcessingStatus::Processing
        }
    }
}

pub fn people_rows(registration_number: &str, people: &[PersonPayload]) -> Vec<NewPerson> {
    people
        .iter()
        .filter(|p| !p.name.trim().is_empty())
        .map(|p| NewPerson {
            registration_number: registration_number.to_string(),
            name: p.name.trim().to_string(),
            role: p
                .role
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
            appointment_date: p.appointment_date.as_ref().and_then(date_from_json),
            date_of_birth: p.date_of_birth.as_ref().and_then(date_from_json),
        })
        .collect()
}

/// Charges arrive either as a bare array or as `{total_charges, charges}`.
pub fn charges_row(registration_number: &str, value: &Value) -> Option<NewCompanyCharges> {
    let (total, items) = match value {
        Value::Array(items) => (None, Value::Array(items.clone())),
        Value::Object(obj) => {
            let items = obj
                .get("charges")
                .filter(|v| v.is_array())
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new()));
            let total = obj
                .get("total_charges")
                .and_then(Value::as_i64)
                .and_then(|t| i32::try_from(t).ok());
            (total, items)
        }
        _ => return None,
    };
    let counted = items.as_array().map_or(0, Vec::len);
    Some(NewCompanyCharges {
        registration_number: registration_number.to_string(),
        total_charges: total.unwrap_or_else(|| i32::try_from(counted).unwrap_or(i32::MAX)),
        charges: items,
    })
}

/// Store everything an extraction response carried for one company.
pub fn apply_extraction_response(
    conn: &mut PgConnection,
    registration_number: &str,
    company_name: Option<&str>,
    response: ExtractionResponse,
) -> QueryResult<ExtractionOutcome> {
    let mut outcome = ExtractionOutcome::default();

    conn.transaction(|conn| {
        if let Some(payload) = response.key_financial_data {
            let (mut changes, series) = payload.into_update();
            if changes.company_name.is_none() {
                changes.company_name = company_name.map(str::to_string);
            }
            let stored = store::upsert_key_financial(conn, registration_number, changes, &series)?;
            for dropped in &stored.dropped {
                warn!(
                    "Extraction data for {}: unrecognised year label '{}' in {}",
                    registration_number, dropped.label, dropped.series
                );
            }
            store::link_companies(conn, registration_number, stored.record.id)?;
            outcome.key_data_stored = stored.has_key_data();
        }

        if let Some(people) = response.people.as_deref() {
            outcome.people_added =
                store::insert_people(conn, &people_rows(registration_number, people))?;
        }

        if let Some(links) = response.pdf_links.as_ref().filter(|v| v.is_array()) {
            store::replace_pdf_links(conn, registration_number, &pdf_links_from_json(links))?;
            outcome.pdfs_stored = true;
        }

        if let Some(row) = response.charges.as_ref().and_then(|c| charges_row(registration_number, c)) {
            store::replace_charges(conn, &row)?;
            outcome.charges_stored = true;
        }

        Ok::<_, diesel::result::Error>(())
    })?;

    if outcome == ExtractionOutcome::default() {
        debug!("Extraction response for {} carried no data", registration_number);
    } else {
        info!(
            "Stored extraction data for {}: key data {}, {} people, pdfs {}, charges {}",
            registration_number,
            outcome.key_data_stored,
            outcome.people_added,
            outcome.pdfs_stored,
            outcome.charges_stored
        );
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_people_rows_skip_nameless() {
        let people = vec![
            PersonPayload {
                name: "  Jane Doe ".into(),
                role: Some("Director".into()),
                appointment_date: Some(json!("2019-03-01")),
                date_of_birth: Some(json!({"year": 1970, "month": 5})),
            },
            PersonPayload {
                name: " ".into(),
                ..PersonPayload::default()
            },
        ];
        let rows = people_rows("01234567", &people);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Jane Doe");
        assert_eq!(rows[0].date_of_birth, chrono::NaiveDate::from_ymd_opt(1970, 5, 1));
    }

    #[test]
    fn test_charges_shapes() {
        let bare = charges_row("01234567", &json!([{"id": 1}, {"id": 2}])).unwrap();
        assert_eq!(bare.total_charges, 2);

        let wrapped =
            charges_row("01234567", &json!({"total_charges": 5, "charges": [{"id": 1}]})).unwrap();
        assert_eq!(wrapped.total_charges, 5);
        assert_eq!(wrapped.charges, json!([{"id": 1}]));

        assert!(charges_row("01234567", &json!("none")).is_none());
    }

    #[test]
    fn test_outcome_status() {
        assert_eq!(ExtractionOutcome::default().company_status(), ProcessingStatus::Processing);
        let stored = ExtractionOutcome {
            key_data_stored: true,
            ..ExtractionOutcome::default()
        };
        assert_eq!(stored.company_status(), ProcessingStatus::Done);
    }
}
