//! Key financial figures imported from the `Main Data` sheet of a workbook.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::io::Cursor;

use super::headers::{self, HeaderIndex};
use super::IngestError;
use crate::aggregation::arrangements::IMPORT_SLOTS;
use crate::aggregation::{
    amount_to_decimal, arrangements_to_json, classify_arrangement_header,
    normalize_optional_registration_number, parse_amount, parse_date, round_amount, Arrangement,
    ArrangementField,
};
use crate::core::shared::models::KeyFinancialChanges;
use crate::extraction::SeriesInput;

const SERIES_PREFIXES: [&str; 4] = ["turnover_", "profit_", "fair_value_assets_", "surplus_"];

/// Sheet holding the import rows; the first sheet is used when it is absent.
pub const IMPORT_SHEET: &str = "Main Data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalar {
    CompanyName,
    CompanyStatus,
    IncorporationDate,
    LatestAccountsDate,
    ParentCompany,
    NationalityOfParent,
    AuditorName,
    AuditorFirm,
    DbArrangements,
    Decimal(usize),
}

const DECIMAL_FIELDS: [&str; 15] = [
    "employer_contrib_latest_year",
    "employer_contrib_previous_year",
    "benefits_paid",
    "expenses_paid_latest_year",
    "expenses_paid_previous_year",
    "defined_contrib_paid",
    "assets_equities",
    "assets_bonds",
    "assets_real_estate",
    "assets_ldi",
    "assets_cash",
    "assets_other",
    "assets_diversified_growth",
    "assets_alternatives",
    "assets_insurance_contracts",
];

fn scalar_for(header: &str) -> Option<Scalar> {
    let scalar = match header {
        "company_name" => Scalar::CompanyName,
        "company_status" => Scalar::CompanyStatus,
        "incorporation_date" => Scalar::IncorporationDate,
        "latest_accounts_date" => Scalar::LatestAccountsDate,
        "parent_company" => Scalar::ParentCompany,
        "nationality_of_parent" => Scalar::NationalityOfParent,
        "auditor_name_latest" => Scalar::AuditorName,
        "auditor_firm_latest" => Scalar::AuditorFirm,
        "number_of_uk_defined_benefit_arrangements" => Scalar::DbArrangements,
        other => Scalar::Decimal(DECIMAL_FIELDS.iter().position(|f| *f == other)?),
    };
    Some(scalar)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Column {
    Series { series: usize, label: String },
    Scalar(Scalar),
    Arrangement { slot: usize, field: ArrangementField },
}

fn classify(header: &str) -> Option<Column> {
    for (series, prefix) in SERIES_PREFIXES.iter().enumerate() {
        if let Some(label) = header.strip_prefix(prefix).filter(|l| !l.is_empty()) {
            return Some(Column::Series {
                series,
                label: label.to_string(),
            });
        }
    }
    if let Some((slot, field)) = classify_arrangement_header(header) {
        return Some(Column::Arrangement { slot, field });
    }
    scalar_for(header).map(Column::Scalar)
}

/// One worksheet row ready to be merged into `key_financial_data`.
#[derive(Debug, Clone)]
pub struct KeyFinancialRow {
    /// 1-based sheet row.
    pub row: usize,
    pub registration_number: String,
    pub changes: KeyFinancialChanges,
    pub series: SeriesInput,
}

#[derive(Debug, Clone, Default)]
pub struct WorkbookImport {
    pub rows: Vec<KeyFinancialRow>,
    /// Rows that could not be used, as user-facing messages.
    pub errors: Vec<String>,
}

fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn cell_amount(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => round_amount(*f),
        Data::Int(i) => round_amount(*i as f64),
        Data::String(s) => parse_amount(s),
        _ => None,
    }
}

fn cell_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(dt) => dt.as_datetime().map(|d| d.date()),
        Data::String(s) | Data::DateTimeIso(s) => parse_date(s),
        _ => None,
    }
}

fn apply_scalar(changes: &mut KeyFinancialChanges, scalar: Scalar, cell: &Data) {
    match scalar {
        Scalar::CompanyName => changes.company_name = cell_text(cell),
        Scalar::CompanyStatus => changes.company_status = cell_text(cell),
        Scalar::IncorporationDate => changes.incorporation_date = cell_date(cell),
        Scalar::LatestAccountsDate => changes.latest_accounts_date = cell_date(cell),
        Scalar::ParentCompany => changes.parent_company = cell_text(cell),
        Scalar::NationalityOfParent => changes.nationality_of_parent = cell_text(cell),
        Scalar::AuditorName => changes.auditor_name_latest = cell_text(cell),
        Scalar::AuditorFirm => changes.auditor_firm_latest = cell_text(cell),
        Scalar::DbArrangements => {
            changes.number_of_uk_defined_benefit_arrangements =
                cell_amount(cell).map(|v| v.round() as i32)
        }
        Scalar::Decimal(index) => {
            let value = cell_amount(cell).and_then(amount_to_decimal);
            let slot = match index {
                0 => &mut changes.employer_contrib_latest_year,
                1 => &mut changes.employer_contrib_previous_year,
                2 => &mut changes.benefits_paid,
                3 => &mut changes.expenses_paid_latest_year,
                4 => &mut changes.expenses_paid_previous_year,
                5 => &mut changes.defined_contrib_paid,
                6 => &mut changes.assets_equities,
                7 => &mut changes.assets_bonds,
                8 => &mut changes.assets_real_estate,
                9 => &mut changes.assets_ldi,
                10 => &mut changes.assets_cash,
                11 => &mut changes.assets_other,
                12 => &mut changes.assets_diversified_growth,
                13 => &mut changes.assets_alternatives,
                _ => &mut changes.assets_insurance_contracts,
            };
            *slot = value;
        }
    }
}

fn series_value(series: Map<String, Value>) -> Option<Value> {
    (!series.is_empty()).then_some(Value::Object(series))
}

/// Turn the rows of a sheet into key financial updates.
pub fn parse_key_financial_rows(rows: &[Vec<Data>]) -> Result<WorkbookImport, IngestError> {
    let mut iter = rows.iter().enumerate();
    let header_cells = iter.next().map(|(_, r)| r).ok_or(IngestError::EmptyFile)?;
    let header_text: Vec<String> = header_cells
        .iter()
        .map(|c| cell_text(c).unwrap_or_default())
        .collect();
    let index = HeaderIndex::new(header_text.iter().map(String::as_str));
    let reg_column = index
        .find(headers::REGISTRATION_NUMBER)
        .ok_or(IngestError::MissingColumn("registration number"))?;
    let columns: Vec<Option<Column>> = index.headers().iter().map(|h| classify(h)).collect();

    let mut out = WorkbookImport::default();
    for (i, cells) in iter {
        let row = i + 1;
        if cells.iter().all(|c| cell_text(c).is_none()) {
            continue;
        }
        let Some(registration_number) = normalize_optional_registration_number(
            cells.get(reg_column).and_then(cell_text).as_deref(),
        ) else {
            out.errors.push(format!("Row {row}: missing registration number"));
            continue;
        };

        let mut changes = KeyFinancialChanges::default();
        let mut series: [Map<String, Value>; 4] = Default::default();
        let mut arrangements: [Arrangement; IMPORT_SLOTS] = Default::default();
        for (cell, column) in cells.iter().zip(&columns) {
            match column {
                Some(Column::Series { series: s, label }) => {
                    if let Some(amount) = cell_amount(cell) {
                        series[*s].insert(label.clone(), Value::from(amount));
                    }
                }
                Some(Column::Scalar(scalar)) => apply_scalar(&mut changes, *scalar, cell),
                Some(Column::Arrangement { slot, field }) => {
                    arrangements[*slot].set(*field, cell_text(cell))
                }
                None => {}
            }
        }
        changes.defined_benefit_arrangements = arrangements_to_json(&arrangements);

        let [turnover, profit, fair_value_assets, surplus] = series;
        out.rows.push(KeyFinancialRow {
            row,
            registration_number,
            changes,
            series: SeriesInput {
                turnover: series_value(turnover),
                profit: series_value(profit),
                fair_value_assets: series_value(fair_value_assets),
                surplus: series_value(surplus),
            },
        });
    }
    Ok(out)
}

/// `Main Data` in any case, otherwise the first sheet.
pub fn pick_import_sheet(sheet_names: &[String]) -> Option<&str> {
    sheet_names
        .iter()
        .find(|name| name.trim().eq_ignore_ascii_case(IMPORT_SHEET))
        .or_else(|| sheet_names.first())
        .map(String::as_str)
}

/// Read the import worksheet of an `.xlsx`/`.xls` upload.
pub fn read_import_sheet(bytes: Vec<u8>) -> Result<Vec<Vec<Data>>, IngestError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| IngestError::Workbook(e.to_string()))?;
    let sheet_names = workbook.sheet_names().to_vec();
    let sheet = pick_import_sheet(&sheet_names).ok_or(IngestError::EmptyFile)?;
    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| IngestError::Workbook(format!("Failed to read sheet: {e}")))?;
    Ok(range.rows().map(<[Data]>::to_vec).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    #[test]
    fn test_classify_headers() {
        assert_eq!(
            classify("fair_value_assets_2023"),
            Some(Column::Series { series: 2, label: "2023".into() })
        );
        assert_eq!(
            classify("turnover_fy22_23"),
            Some(Column::Series { series: 0, label: "fy22_23".into() })
        );
        assert_eq!(classify("assets_cash"), Some(Column::Scalar(Scalar::Decimal(10))));
        assert_eq!(classify("turnover_"), None);
        assert_eq!(classify("notes"), None);
    }

    #[test]
    fn test_parse_rows() {
        let rows = vec![
            vec![
                s("Registration Number"),
                s("Latest Accounts Date"),
                s("Turnover 2023"),
                s("Turnover 2022/23"),
                s("Profit Latest"),
                s("Assets Cash"),
                s("Comment"),
            ],
            vec![
                Data::Float(1234567.0),
                s("2023-12-31"),
                Data::Float(1500.25),
                Data::Empty,
                s("(12.5)"),
                Data::Int(40),
                s("ignored"),
            ],
            vec![Data::Empty; 7],
            vec![Data::Empty, s("2022-01-01"), Data::Float(1.0)],
        ];

        let import = parse_key_financial_rows(&rows).unwrap();
        assert_eq!(import.rows.len(), 1);
        assert_eq!(import.errors, vec!["Row 4: missing registration number".to_string()]);

        let row = &import.rows[0];
        assert_eq!(row.row, 2);
        assert_eq!(row.registration_number, "01234567");
        assert_eq!(row.changes.latest_accounts_date, NaiveDate::from_ymd_opt(2023, 12, 31));
        assert_eq!(row.changes.assets_cash.as_ref().map(|d| d.to_string()).as_deref(), Some("40.0"));
        assert_eq!(row.series.turnover, Some(serde_json::json!({"2023": 1500.3})));
        assert_eq!(row.series.profit, Some(serde_json::json!({"latest": -12.5})));
        assert_eq!(row.series.surplus, None);
    }

    #[test]
    fn test_requires_registration_column() {
        let rows = vec![vec![s("Company Name")], vec![s("Acme")]];
        assert!(matches!(
            parse_key_financial_rows(&rows),
            Err(IngestError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_garbage_workbook() {
        assert!(matches!(
            read_import_sheet(b"not a workbook".to_vec()),
            Err(IngestError::Workbook(_))
        ));
    }

    #[test]
    fn test_prefers_main_data_sheet() {
        let names: Vec<String> = ["Cover", "MAIN DATA ", "Notes"].map(String::from).to_vec();
        assert_eq!(pick_import_sheet(&names), Some("MAIN DATA "));

        let names: Vec<String> = ["Cover", "Notes"].map(String::from).to_vec();
        assert_eq!(pick_import_sheet(&names), Some("Cover"));
        assert_eq!(pick_import_sheet(&[]), None);
    }

    #[test]
    fn test_arrangement_columns() {
        let rows = vec![
            vec![
                s("Registration Number"),
                s("Name_of_Defined_Benefit_Arrangement_1"),
                s("scheme_actuary_1"),
                s("scheme_actuary_firm_1"),
                s("Status_of_Defined_Benefit_Arrangement_1"),
                s("Name_of_Defined_Benefit_Arrangement_2"),
                s("Status_of_Defined_Benefit_Arrangement_3"),
            ],
            vec![
                s("01234567"),
                s("Main Scheme"),
                s("J. Smith"),
                s("Actuaries LLP"),
                s("Closed"),
                Data::Empty,
                s("Open"),
            ],
            vec![s("07654321"), Data::Empty, Data::Empty],
        ];

        let import = parse_key_financial_rows(&rows).unwrap();
        assert_eq!(
            import.rows[0].changes.defined_benefit_arrangements,
            Some(serde_json::json!([
                {
                    "name": "Main Scheme",
                    "scheme_actuary": "J. Smith",
                    "scheme_actuary_firm": "Actuaries LLP",
                    "status": "Closed"
                },
                {"status": "Open"}
            ]))
        );
        assert_eq!(import.rows[1].changes.defined_benefit_arrangements, None);
    }
}
