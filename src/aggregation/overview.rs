use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::amounts::decimal_to_amount;
use super::registration::{derive_company_status, normalize_optional_registration_number};
use super::years::{normalize_series, FinancialSeries};
use crate::core::shared::enums::{ApprovalStage, CompanyStatus, ProcessingStatus};
use crate::core::shared::models::{Company, CompanyPdfs, KeyFinancialData, SummaryNote};

/// `Processing` turns into `Done` once key financial figures exist.
pub fn derive_processing_status(stored: ProcessingStatus, has_key_data: bool) -> ProcessingStatus {
    match stored {
        ProcessingStatus::Processing if has_key_data => ProcessingStatus::Done,
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRepair {
    pub company_id: i32,
    pub current: Option<i32>,
    pub resolved: Option<i32>,
}

impl LinkRepair {
    pub fn needs_write_back(&self) -> bool {
        self.current != self.resolved
    }
}

/// Key financial rows indexed by normalized registration number.
pub fn index_key_data(key_data: &[KeyFinancialData]) -> HashMap<String, &KeyFinancialData> {
    key_data
        .iter()
        .filter_map(|k| {
            normalize_optional_registration_number(Some(&k.registration_number)).map(|r| (r, k))
        })
        .collect()
}

pub fn resolve_key_financial_link(
    company: &Company,
    key_data_by_reg: &HashMap<String, &KeyFinancialData>,
) -> LinkRepair {
    let resolved = normalize_optional_registration_number(company.registration_number.as_deref())
        .and_then(|reg| key_data_by_reg.get(&reg))
        .map(|k| k.id);
    LinkRepair {
        company_id: company.id,
        current: company.key_financial_data_id,
        resolved,
    }
}

/// Year used to resolve relative series labels for a record.
pub fn reference_year(record: &KeyFinancialData) -> Option<i32> {
    record.latest_accounts_date.map(|d| d.year())
}

/// `pdf_links` is stored either as an array of URLs or of `{url}` objects.
pub fn pdf_links_from_json(value: &Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => ["url", "link", "href"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        })
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// The four year-keyed series of a key financial record, normalized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedSeries {
    pub turnover: FinancialSeries,
    pub profit: FinancialSeries,
    pub fair_value_assets: FinancialSeries,
    pub surplus: FinancialSeries,
}

impl NormalizedSeries {
    pub fn from_record(record: &KeyFinancialData) -> Self {
        let year = reference_year(record);
        Self {
            turnover: normalize_series(&record.turnover, year).series,
            profit: normalize_series(&record.profit, year).series,
            fair_value_assets: normalize_series(&record.fair_value_assets, year).series,
            surplus: normalize_series(&record.surplus, year).series,
        }
    }

    pub fn has_values(&self) -> bool {
        !(self.turnover.is_empty()
            && self.profit.is_empty()
            && self.fair_value_assets.is_empty()
            && self.surplus.is_empty())
    }
}

/// One row of the company listing.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompanyOverview {
    pub id: i32,
    pub company_name: String,
    pub registration_number: Option<String>,
    pub company_status: CompanyStatus,
    pub approval_stage: ApprovalStage,
    pub status: ProcessingStatus,
    pub turnover_data: FinancialSeries,
    pub fair_value_assets: FinancialSeries,
    pub latest_turnover_year: Option<i32>,
    pub latest_turnover: Option<f64>,
    pub latest_fair_value_year: Option<i32>,
    pub latest_fair_value_assets: Option<f64>,
    pub pdf_links: Vec<String>,
    pub has_summary_notes: bool,
    pub type_of_scheme: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub key_financial_data_id: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub rows: Vec<CompanyOverview>,
    /// Links whose stored id differs from the resolved one.
    pub link_repairs: Vec<LinkRepair>,
    /// Companies promoted from `Processing` to `Done`.
    pub promotions: Vec<i32>,
}

/// Join companies with their key data, PDFs and notes by registration number.
pub fn aggregate_companies(
    companies: &[Company],
    key_data: &[KeyFinancialData],
    pdfs: &[CompanyPdfs],
    notes: &[SummaryNote],
) -> Aggregation {
    let key_by_reg = index_key_data(key_data);
    let pdfs_by_reg: HashMap<String, &CompanyPdfs> = pdfs
        .iter()
        .filter_map(|p| {
            normalize_optional_registration_number(Some(&p.registration_number)).map(|r| (r, p))
        })
        .collect();
    let noted: HashSet<String> = notes
        .iter()
        .filter(|n| n.summary.as_deref().is_some_and(|s| !s.trim().is_empty()))
        .filter_map(|n| normalize_optional_registration_number(Some(&n.registration_number)))
        .collect();

    let mut out = Aggregation::default();

    for company in companies {
        let reg = normalize_optional_registration_number(company.registration_number.as_deref());
        let link = resolve_key_financial_link(company, &key_by_reg);
        if link.needs_write_back() {
            out.link_repairs.push(link);
        }

        let series = reg
            .as_ref()
            .and_then(|r| key_by_reg.get(r))
            .map(|k| NormalizedSeries::from_record(k))
            .unwrap_or_default();

        let status = derive_processing_status(company.status, series.has_values());
        if status != company.status {
            out.promotions.push(company.id);
        }

        let latest_turnover = series.turnover.latest();
        let latest_fair_value = series.fair_value_assets.latest();

        out.rows.push(CompanyOverview {
            id: company.id,
            company_name: company.company_name.clone(),
            registration_number: reg.clone(),
            company_status: derive_company_status(reg.as_deref()),
            approval_stage: company.approval_stage,
            status,
            latest_turnover_year: latest_turnover.map(|(y, _)| y),
            latest_turnover: latest_turnover.map(|(_, v)| v),
            latest_fair_value_year: latest_fair_value.map(|(y, _)| y),
            latest_fair_value_assets: latest_fair_value.map(|(_, v)| v),
            turnover_data: series.turnover,
            fair_value_assets: series.fair_value_assets,
            pdf_links: reg
                .as_ref()
                .and_then(|r| pdfs_by_reg.get(r))
                .map(|p| pdf_links_from_json(&p.pdf_links))
                .unwrap_or_default(),
            has_summary_notes: reg.as_ref().is_some_and(|r| noted.contains(r)),
            type_of_scheme: company.type_of_scheme.clone(),
            last_modified: company.updated_at,
            key_financial_data_id: link.resolved,
        });
    }

    out
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct LatestValue {
    pub year: i32,
    pub value: f64,
}

impl LatestValue {
    fn of(series: &FinancialSeries) -> Option<Self> {
        series.latest().map(|(year, value)| Self { year, value })
    }
}

/// Key financial record as returned by the detail endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KeyFinancialView {
    pub id: i32,
    pub company_id: i32,
    pub registration_number: String,
    pub company_name: Option<String>,
    pub company_status: Option<String>,
    pub incorporation_date: Option<NaiveDate>,
    pub latest_accounts_date: Option<NaiveDate>,
    pub turnover: FinancialSeries,
    pub profit: FinancialSeries,
    pub fair_value_assets: FinancialSeries,
    pub surplus: FinancialSeries,
    pub latest_turnover: Option<LatestValue>,
    pub latest_profit: Option<LatestValue>,
    pub latest_fair_value_assets: Option<LatestValue>,
    pub latest_surplus: Option<LatestValue>,
    pub parent_company: Option<String>,
    pub nationality_of_parent: Option<String>,
    pub auditor_name_latest: Option<String>,
    pub auditor_firm_latest: Option<String>,
    pub number_of_uk_defined_benefit_arrangements: Option<i32>,
    pub defined_benefit_arrangements: Value,
    pub employer_contrib_latest_year: Option<f64>,
    pub employer_contrib_previous_year: Option<f64>,
    pub benefits_paid: Option<f64>,
    pub expenses_paid_latest_year: Option<f64>,
    pub expenses_paid_previous_year: Option<f64>,
    pub defined_contrib_paid: Option<f64>,
    pub assets_equities: Option<f64>,
    pub assets_bonds: Option<f64>,
    pub assets_real_estate: Option<f64>,
    pub assets_ldi: Option<f64>,
    pub assets_cash: Option<f64>,
    pub assets_other: Option<f64>,
    pub assets_diversified_growth: Option<f64>,
    pub assets_alternatives: Option<f64>,
    pub assets_insurance_contracts: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl KeyFinancialView {
    pub fn new(company_id: i32, record: &KeyFinancialData) -> Self {
        let series = NormalizedSeries::from_record(record);
        let amount = |v: &Option<bigdecimal::BigDecimal>| v.as_ref().and_then(decimal_to_amount);
        Self {
            id: record.id,
            company_id,
            registration_number: record.registration_number.clone(),
            company_name: record.company_name.clone(),
            company_status: record.company_status.clone(),
            incorporation_date: record.incorporation_date,
            latest_accounts_date: record.latest_accounts_date,
            latest_turnover: LatestValue::of(&series.turnover),
            latest_profit: LatestValue::of(&series.profit),
            latest_fair_value_assets: LatestValue::of(&series.fair_value_assets),
            latest_surplus: LatestValue::of(&series.surplus),
            turnover: series.turnover,
            profit: series.profit,
            fair_value_assets: series.fair_value_assets,
            surplus: series.surplus,
            parent_company: record.parent_company.clone(),
            nationality_of_parent: record.nationality_of_parent.clone(),
            auditor_name_latest: record.auditor_name_latest.clone(),
            auditor_firm_latest: record.auditor_firm_latest.clone(),
            number_of_uk_defined_benefit_arrangements: record
                .number_of_uk_defined_benefit_arrangements,
            defined_benefit_arrangements: record.defined_benefit_arrangements.clone(),
            employer_contrib_latest_year: amount(&record.employer_contrib_latest_year),
            employer_contrib_previous_year: amount(&record.employer_contrib_previous_year),
            benefits_paid: amount(&record.benefits_paid),
            expenses_paid_latest_year: amount(&record.expenses_paid_latest_year),
            expenses_paid_previous_year: amount(&record.expenses_paid_previous_year),
            defined_contrib_paid: amount(&record.defined_contrib_paid),
            assets_equities: amount(&record.assets_equities),
            assets_bonds: amount(&record.assets_bonds),
            assets_real_estate: amount(&record.assets_real_estate),
            assets_ldi: amount(&record.assets_ldi),
            assets_cash: amount(&record.assets_cash),
            assets_other: amount(&record.assets_other),
            assets_diversified_growth: amount(&record.assets_diversified_growth),
            assets_alternatives: amount(&record.assets_alternatives),
            assets_insurance_contracts: amount(&record.assets_insurance_contracts),
            updated_at: record.updated_at,
        }
    }
}
