//! Defined-benefit arrangements stored as a JSON array on the key financial row.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Numbered arrangement column groups read from import workbooks.
pub const IMPORT_SLOTS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Arrangement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme_actuary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme_actuary_firm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// One of the four values held per arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrangementField {
    Name,
    SchemeActuary,
    SchemeActuaryFirm,
    Status,
}

impl ArrangementField {
    pub const ALL: [ArrangementField; 4] = [
        ArrangementField::Name,
        ArrangementField::SchemeActuary,
        ArrangementField::SchemeActuaryFirm,
        ArrangementField::Status,
    ];

    /// Normalized workbook header prefix; the slot number follows it.
    pub fn header_prefix(self) -> &'static str {
        match self {
            ArrangementField::Name => "name_of_defined_benefit_arrangement_",
            ArrangementField::SchemeActuary => "scheme_actuary_",
            ArrangementField::SchemeActuaryFirm => "scheme_actuary_firm_",
            ArrangementField::Status => "status_of_defined_benefit_arrangement_",
        }
    }

    pub fn export_header(self, slot: usize) -> String {
        match self {
            ArrangementField::Name => format!("DB Arrangement {slot} Name"),
            ArrangementField::SchemeActuary => format!("DB Arrangement {slot} Scheme Actuary"),
            ArrangementField::SchemeActuaryFirm => {
                format!("DB Arrangement {slot} Scheme Actuary Firm")
            }
            ArrangementField::Status => format!("DB Arrangement {slot} Status"),
        }
    }
}

/// Match `scheme_actuary_2` style headers. Returns the 0-based slot.
pub fn classify_arrangement_header(header: &str) -> Option<(usize, ArrangementField)> {
    ArrangementField::ALL.into_iter().find_map(|field| {
        let slot: usize = header.strip_prefix(field.header_prefix())?.parse().ok()?;
        (1..=IMPORT_SLOTS).contains(&slot).then_some((slot - 1, field))
    })
}

impl Arrangement {
    pub fn get(&self, field: ArrangementField) -> Option<&str> {
        match field {
            ArrangementField::Name => self.name.as_deref(),
            ArrangementField::SchemeActuary => self.scheme_actuary.as_deref(),
            ArrangementField::SchemeActuaryFirm => self.scheme_actuary_firm.as_deref(),
            ArrangementField::Status => self.status.as_deref(),
        }
    }

    pub fn set(&mut self, field: ArrangementField, value: Option<String>) {
        let slot = match field {
            ArrangementField::Name => &mut self.name,
            ArrangementField::SchemeActuary => &mut self.scheme_actuary,
            ArrangementField::SchemeActuaryFirm => &mut self.scheme_actuary_firm,
            ArrangementField::Status => &mut self.status,
        };
        *slot = value;
    }

    pub fn is_empty(&self) -> bool {
        ArrangementField::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

/// Arrangements in a stored value. Entries that are not objects are skipped.
pub fn arrangements_from_json(value: &Value) -> Vec<Arrangement> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|v| v.is_object())
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// JSON array of the non-empty arrangements, or `None` when all are empty.
pub fn arrangements_to_json(arrangements: &[Arrangement]) -> Option<Value> {
    let filled: Vec<&Arrangement> = arrangements.iter().filter(|a| !a.is_empty()).collect();
    if filled.is_empty() {
        return None;
    }
    serde_json::to_value(filled).ok()
}
