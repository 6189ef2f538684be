use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

use super::amounts::decimal_to_amount;
use super::arrangements::{arrangements_from_json, Arrangement, ArrangementField};
use super::overview::{aggregate_companies, index_key_data, NormalizedSeries};
use super::registration::normalize_optional_registration_number;
use super::years::FinancialSeries;
use crate::core::shared::models::{
    Company, CompanyCharges, CompanyPdfs, KeyFinancialData, Person, SummaryNote,
};

pub const COMPANIES_SHEET: &str = "Companies";
pub const KEY_FINANCIAL_SHEET: &str = "Key Financial Data";
pub const PEOPLE_SHEET: &str = "People Data";
pub const SUMMARY_NOTES_SHEET: &str = "Summary Notes";
pub const CHARGES_SHEET: &str = "Company Charges";

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }

    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(Self::Empty, Self::text)
    }

    pub fn opt_number(value: Option<f64>) -> Self {
        value.map_or(Self::Empty, Self::Number)
    }

    pub fn opt_decimal(value: Option<&BigDecimal>) -> Self {
        Self::opt_number(value.and_then(decimal_to_amount))
    }

    pub fn opt_date(value: Option<NaiveDate>) -> Self {
        value.map_or(Self::Empty, |d| Self::Text(d.format("%Y-%m-%d").to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ExportSheet {
    fn new(name: &str, headers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportBundle {
    pub sheets: Vec<ExportSheet>,
}

impl ExportBundle {
    pub fn sheet(&self, name: &str) -> Option<&ExportSheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

/// Optional sheets requested alongside `Companies`.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExportOptions {
    pub key_financial: bool,
    pub people_data: bool,
    pub summary_notes: bool,
    pub company_charges: bool,
}

/// Rows loaded for the selected companies.
#[derive(Debug, Clone, Default)]
pub struct ExportSources {
    pub companies: Vec<Company>,
    pub key_data: Vec<KeyFinancialData>,
    pub pdfs: Vec<CompanyPdfs>,
    pub notes: Vec<SummaryNote>,
    pub people: Vec<Person>,
    pub charges: Vec<CompanyCharges>,
}

const SERIES_LABELS: [&str; 4] = ["Turnover", "Profit", "Fair Value of Assets", "Surplus"];

fn series_of(series: &NormalizedSeries, index: usize) -> &FinancialSeries {
    match index {
        0 => &series.turnover,
        1 => &series.profit,
        2 => &series.fair_value_assets,
        _ => &series.surplus,
    }
}

const DECIMAL_HEADERS: [&str; 15] = [
    "Employer Contributions Latest Year",
    "Employer Contributions Previous Year",
    "Benefits Paid",
    "Expenses Paid Latest Year",
    "Expenses Paid Previous Year",
    "Defined Contributions Paid",
    "Assets Equities",
    "Assets Bonds",
    "Assets Real Estate",
    "Assets LDI",
    "Assets Cash",
    "Assets Other",
    "Assets Diversified Growth",
    "Assets Alternatives",
    "Assets Insurance Contracts",
];

/// Values in `DECIMAL_HEADERS` order.
fn decimal_values(record: &KeyFinancialData) -> [Option<&BigDecimal>; 15] {
    [
        record.employer_contrib_latest_year.as_ref(),
        record.employer_contrib_previous_year.as_ref(),
        record.benefits_paid.as_ref(),
        record.expenses_paid_latest_year.as_ref(),
        record.expenses_paid_previous_year.as_ref(),
        record.defined_contrib_paid.as_ref(),
        record.assets_equities.as_ref(),
        record.assets_bonds.as_ref(),
        record.assets_real_estate.as_ref(),
        record.assets_ldi.as_ref(),
        record.assets_cash.as_ref(),
        record.assets_other.as_ref(),
        record.assets_diversified_growth.as_ref(),
        record.assets_alternatives.as_ref(),
        record.assets_insurance_contracts.as_ref(),
    ]
}

fn companies_sheet(sources: &ExportSources) -> ExportSheet {
    let mut sheet = ExportSheet::new(
        COMPANIES_SHEET,
        &[
            "ID",
            "Company Name",
            "Registration Number",
            "Company Status",
            "Approval Stage",
            "Status",
            "Latest Turnover Year",
            "Latest Turnover",
            "Latest Fair Value Year",
            "Latest Fair Value of Assets",
            "Type of Scheme",
            "PDF Links",
        ],
    );
    let aggregation =
        aggregate_companies(&sources.companies, &sources.key_data, &sources.pdfs, &sources.notes);
    for row in aggregation.rows {
        sheet.rows.push(vec![
            Cell::Number(f64::from(row.id)),
            Cell::text(row.company_name),
            Cell::opt_text(row.registration_number.as_deref()),
            Cell::text(row.company_status.as_str()),
            Cell::text(row.approval_stage.label()),
            Cell::text(row.status.as_str()),
            Cell::opt_number(row.latest_turnover_year.map(f64::from)),
            Cell::opt_number(row.latest_turnover),
            Cell::opt_number(row.latest_fair_value_year.map(f64::from)),
            Cell::opt_number(row.latest_fair_value_assets),
            Cell::opt_text(row.type_of_scheme.as_deref()),
            Cell::text(row.pdf_links.join("\n")),
        ]);
    }
    sheet
}

fn key_financial_sheet(sources: &ExportSources) -> ExportSheet {
    let index = index_key_data(&sources.key_data);
    let records: Vec<(&Company, &KeyFinancialData, NormalizedSeries, Vec<Arrangement>)> = sources
        .companies
        .iter()
        .filter_map(|c| {
            let reg = normalize_optional_registration_number(c.registration_number.as_deref())?;
            let record = *index.get(&reg)?;
            Some((
                c,
                record,
                NormalizedSeries::from_record(record),
                arrangements_from_json(&record.defined_benefit_arrangements),
            ))
        })
        .collect();
    let arrangement_groups = records.iter().map(|r| r.3.len()).max().unwrap_or(0);

    // Union of years per series, newest first.
    let years: Vec<Vec<i32>> = (0..SERIES_LABELS.len())
        .map(|i| {
            let set: BTreeSet<i32> = records
                .iter()
                .flat_map(|(_, _, s, _)| series_of(s, i).years())
                .collect();
            set.into_iter().rev().collect()
        })
        .collect();

    let mut headers: Vec<String> = [
        "Registration Number",
        "Company Name",
        "Company Status",
        "Incorporation Date",
        "Latest Accounts Date",
        "Parent Company",
        "Nationality of Parent",
        "Auditor Name",
        "Auditor Firm",
        "Number of UK DB Arrangements",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    for (i, label) in SERIES_LABELS.iter().enumerate() {
        headers.extend(years[i].iter().map(|y| format!("{label} {y}")));
    }
    headers.extend(DECIMAL_HEADERS.iter().map(|h| h.to_string()));
    for slot in 1..=arrangement_groups {
        headers.extend(ArrangementField::ALL.iter().map(|f| f.export_header(slot)));
    }

    let mut sheet = ExportSheet {
        name: KEY_FINANCIAL_SHEET.to_string(),
        headers,
        rows: Vec::new(),
    };

    for (company, record, series, arrangements) in &records {
        let mut row = vec![
            Cell::text(record.registration_number.clone()),
            Cell::text(
                record
                    .company_name
                    .clone()
                    .unwrap_or_else(|| company.company_name.clone()),
            ),
            Cell::opt_text(record.company_status.as_deref()),
            Cell::opt_date(record.incorporation_date),
            Cell::opt_date(record.latest_accounts_date),
            Cell::opt_text(record.parent_company.as_deref()),
            Cell::opt_text(record.nationality_of_parent.as_deref()),
            Cell::opt_text(record.auditor_name_latest.as_deref()),
            Cell::opt_text(record.auditor_firm_latest.as_deref()),
            Cell::opt_number(record.number_of_uk_defined_benefit_arrangements.map(f64::from)),
        ];
        for (i, series_years) in years.iter().enumerate() {
            let s = series_of(series, i);
            row.extend(series_years.iter().map(|y| Cell::opt_number(s.get(*y))));
        }
        row.extend(decimal_values(record).into_iter().map(Cell::opt_decimal));
        for slot in 0..arrangement_groups {
            let arrangement = arrangements.get(slot);
            row.extend(
                ArrangementField::ALL
                    .iter()
                    .map(|f| Cell::opt_text(arrangement.and_then(|a| a.get(*f)))),
            );
        }
        sheet.rows.push(row);
    }
    sheet
}

/// Company name for each normalized registration number, first wins.
fn names_by_reg(companies: &[Company]) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for c in companies {
        if let Some(reg) = normalize_optional_registration_number(c.registration_number.as_deref()) {
            names.entry(reg).or_insert_with(|| c.company_name.clone());
        }
    }
    names
}

fn company_order(companies: &[Company]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    companies
        .iter()
        .filter_map(|c| normalize_optional_registration_number(c.registration_number.as_deref()))
        .filter(|r| seen.insert(r.clone()))
        .collect()
}

fn people_sheet(sources: &ExportSources) -> ExportSheet {
    let mut sheet = ExportSheet::new(
        PEOPLE_SHEET,
        &[
            "Registration Number",
            "Company Name",
            "Name",
            "Role",
            "Appointment Date",
            "Date of Birth",
        ],
    );
    let names = names_by_reg(&sources.companies);
    for reg in company_order(&sources.companies) {
        let mut people: Vec<&Person> = sources
            .people
            .iter()
            .filter(|p| {
                normalize_optional_registration_number(Some(&p.registration_number)).as_ref()
                    == Some(&reg)
            })
            .collect();
        people.sort_by(|a, b| a.role.cmp(&b.role).then_with(|| a.name.cmp(&b.name)));
        for person in people {
            sheet.rows.push(vec![
                Cell::text(reg.clone()),
                Cell::opt_text(names.get(&reg).map(String::as_str)),
                Cell::text(person.name.clone()),
                Cell::opt_text(person.role.as_deref()),
                Cell::opt_date(person.appointment_date),
                Cell::opt_date(person.date_of_birth),
            ]);
        }
    }
    sheet
}

fn summary_notes_sheet(sources: &ExportSources) -> ExportSheet {
    let mut sheet = ExportSheet::new(
        SUMMARY_NOTES_SHEET,
        &["Registration Number", "Company Name", "Summary"],
    );
    let names = names_by_reg(&sources.companies);
    for reg in company_order(&sources.companies) {
        let note = sources.notes.iter().find(|n| {
            normalize_optional_registration_number(Some(&n.registration_number)).as_ref()
                == Some(&reg)
        });
        if let Some(note) = note {
            sheet.rows.push(vec![
                Cell::text(reg.clone()),
                Cell::opt_text(names.get(&reg).map(String::as_str)),
                Cell::opt_text(note.summary.as_deref()),
            ]);
        }
    }
    sheet
}

fn charges_sheet(sources: &ExportSources) -> ExportSheet {
    let mut sheet = ExportSheet::new(
        CHARGES_SHEET,
        &[
            "Registration Number",
            "Company Name",
            "Total Charges",
            "Charges",
        ],
    );
    let names = names_by_reg(&sources.companies);
    for reg in company_order(&sources.companies) {
        let charges = sources.charges.iter().find(|c| {
            normalize_optional_registration_number(Some(&c.registration_number)).as_ref()
                == Some(&reg)
        });
        if let Some(charges) = charges {
            sheet.rows.push(vec![
                Cell::text(reg.clone()),
                Cell::opt_text(names.get(&reg).map(String::as_str)),
                Cell::Number(f64::from(charges.total_charges)),
                Cell::text(charges.charges.to_string()),
            ]);
        }
    }
    sheet
}

/// Per-sheet rows for the export workbook. `Companies` is always present.
pub fn build_export_bundle(sources: &ExportSources, options: ExportOptions) -> ExportBundle {
    let mut bundle = ExportBundle {
        sheets: vec![companies_sheet(sources)],
    };
    if options.key_financial {
        bundle.sheets.push(key_financial_sheet(sources));
    }
    if options.people_data {
        bundle.sheets.push(people_sheet(sources));
    }
    if options.summary_notes {
        bundle.sheets.push(summary_notes_sheet(sources));
    }
    if options.company_charges {
        bundle.sheets.push(charges_sheet(sources));
    }
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::testing::{charges, company, key_data, note, person};
    use serde_json::json;

    fn sources() -> ExportSources {
        let mut first = key_data(1, "01234567", json!({"2022": 10.0, "2023": 20.0}));
        first.assets_cash = "12.5".parse().ok();
        let second = key_data(2, "SC000002", json!({"2021": 5.0}));
        ExportSources {
            companies: vec![
                company(1, "Acme Pensions", Some("1234567")),
                company(2, "Scot Trust", Some("SC000002")),
                company(3, "Dormant", None),
            ],
            key_data: vec![first, second],
            pdfs: Vec::new(),
            notes: vec![note("01234567", Some("Stable sponsor"))],
            people: vec![
                person("01234567", "Zed", Some("Director")),
                person("01234567", "Amy", Some("Director")),
                person("01234567", "Bob", Some("Auditor")),
            ],
            charges: vec![charges("SC000002", 2, json!([{"id": 1}, {"id": 2}]))],
        }
    }

    #[test]
    fn test_companies_sheet_always_present() {
        let bundle = build_export_bundle(&sources(), ExportOptions::default());
        assert_eq!(bundle.sheets.len(), 1);
        let companies = bundle.sheet(COMPANIES_SHEET).expect("companies sheet");
        assert_eq!(companies.headers.len(), 12);
        assert_eq!(companies.rows.len(), 3);
        assert_eq!(companies.rows[0][2], Cell::Text("01234567".into()));
        assert_eq!(companies.rows[0][4], Cell::Text("Unapproved".into()));
        assert_eq!(companies.rows[0][6], Cell::Number(2023.0));
        assert_eq!(companies.rows[2][2], Cell::Empty);
        assert_eq!(companies.rows[2][3], Cell::Text("Inactive".into()));
    }

    #[test]
    fn test_key_financial_year_columns_newest_first() {
        let options = ExportOptions {
            key_financial: true,
            ..ExportOptions::default()
        };
        let bundle = build_export_bundle(&sources(), options);
        let sheet = bundle.sheet(KEY_FINANCIAL_SHEET).expect("key sheet");
        let turnover: Vec<&str> = sheet
            .headers
            .iter()
            .filter(|h| h.starts_with("Turnover "))
            .map(String::as_str)
            .collect();
        assert_eq!(turnover, vec!["Turnover 2023", "Turnover 2022", "Turnover 2021"]);
        assert_eq!(sheet.rows.len(), 2);
        assert!(sheet.rows.iter().all(|r| r.len() == sheet.headers.len()));

        let col = sheet.headers.iter().position(|h| h == "Turnover 2021").unwrap();
        assert_eq!(sheet.rows[0][col], Cell::Empty);
        assert_eq!(sheet.rows[1][col], Cell::Number(5.0));

        let cash = sheet.headers.iter().position(|h| h == "Assets Cash").unwrap();
        assert_eq!(sheet.rows[0][cash], Cell::Number(12.5));
    }

    #[test]
    fn test_people_sorted_by_role_then_name() {
        let options = ExportOptions {
            people_data: true,
            ..ExportOptions::default()
        };
        let bundle = build_export_bundle(&sources(), options);
        let sheet = bundle.sheet(PEOPLE_SHEET).expect("people sheet");
        let names: Vec<Cell> = sheet.rows.iter().map(|r| r[2].clone()).collect();
        assert_eq!(
            names,
            vec![
                Cell::Text("Bob".into()),
                Cell::Text("Amy".into()),
                Cell::Text("Zed".into())
            ]
        );
        assert_eq!(sheet.rows[0][1], Cell::Text("Acme Pensions".into()));
    }

    #[test]
    fn test_notes_and_charges_only_for_companies_with_rows() {
        let options = ExportOptions {
            summary_notes: true,
            company_charges: true,
            ..ExportOptions::default()
        };
        let bundle = build_export_bundle(&sources(), options);
        let notes = bundle.sheet(SUMMARY_NOTES_SHEET).expect("notes");
        assert_eq!(notes.rows.len(), 1);
        assert_eq!(notes.rows[0][2], Cell::Text("Stable sponsor".into()));

        let charges = bundle.sheet(CHARGES_SHEET).expect("charges");
        assert_eq!(charges.rows.len(), 1);
        assert_eq!(charges.rows[0][2], Cell::Number(2.0));
        assert_eq!(charges.rows[0][3], Cell::Text(r#"[{"id":1},{"id":2}]"#.into()));
    }

    #[test]
    fn test_arrangement_column_groups() {
        let mut sources = sources();
        sources.key_data[0].defined_benefit_arrangements = json!([
            {"name": "Main Scheme", "scheme_actuary": "J. Smith"},
            {"name": "Executive Plan", "status": "Closed"}
        ]);
        let options = ExportOptions {
            key_financial: true,
            ..ExportOptions::default()
        };
        let bundle = build_export_bundle(&sources, options);
        let sheet = bundle.sheet(KEY_FINANCIAL_SHEET).expect("key sheet");

        let groups: Vec<&str> = sheet
            .headers
            .iter()
            .filter(|h| h.starts_with("DB Arrangement "))
            .map(String::as_str)
            .collect();
        assert_eq!(groups.len(), 8);
        assert_eq!(groups[0], "DB Arrangement 1 Name");
        assert_eq!(groups[7], "DB Arrangement 2 Status");
        assert!(sheet.rows.iter().all(|r| r.len() == sheet.headers.len()));

        let col = |h: &str| sheet.headers.iter().position(|x| x == h).unwrap();
        assert_eq!(sheet.rows[0][col("DB Arrangement 1 Scheme Actuary")], Cell::Text("J. Smith".into()));
        assert_eq!(sheet.rows[0][col("DB Arrangement 2 Status")], Cell::Text("Closed".into()));
        assert_eq!(sheet.rows[1][col("DB Arrangement 1 Name")], Cell::Empty);
    }

    #[test]
    fn test_no_arrangement_columns_without_arrangements() {
        let options = ExportOptions {
            key_financial: true,
            ..ExportOptions::default()
        };
        let bundle = build_export_bundle(&sources(), options);
        let sheet = bundle.sheet(KEY_FINANCIAL_SHEET).expect("key sheet");
        assert!(!sheet.headers.iter().any(|h| h.starts_with("DB Arrangement ")));
    }
}
