//! Row builders shared by the aggregation tests.

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use crate::core::shared::enums::{ApprovalStage, ProcessingStatus};
use crate::core::shared::models::{
    Company, CompanyCharges, CompanyPdfs, KeyFinancialData, Person, SummaryNote,
};

pub fn company(id: i32, name: &str, registration_number: Option<&str>) -> Company {
    let stamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Company {
        id,
        company_name: name.to_string(),
        registration_number: registration_number.map(str::to_string),
        approval_stage: ApprovalStage::Unapproved,
        status: ProcessingStatus::NotStarted,
        key_financial_data_id: None,
        type_of_scheme: None,
        created_at: stamp,
        updated_at: stamp,
    }
}

pub fn key_data(id: i32, registration_number: &str, turnover: Value) -> KeyFinancialData {
    KeyFinancialData {
        id,
        registration_number: registration_number.to_string(),
        company_name: None,
        company_status: None,
        incorporation_date: None,
        latest_accounts_date: None,
        turnover,
        profit: json!({}),
        fair_value_assets: json!({}),
        surplus: json!({}),
        parent_company: None,
        nationality_of_parent: None,
        auditor_name_latest: None,
        auditor_firm_latest: None,
        number_of_uk_defined_benefit_arrangements: None,
        defined_benefit_arrangements: json!([]),
        employer_contrib_latest_year: None,
        employer_contrib_previous_year: None,
        benefits_paid: None,
        expenses_paid_latest_year: None,
        expenses_paid_previous_year: None,
        defined_contrib_paid: None,
        assets_equities: None,
        assets_bonds: None,
        assets_real_estate: None,
        assets_ldi: None,
        assets_cash: None,
        assets_other: None,
        assets_diversified_growth: None,
        assets_alternatives: None,
        assets_insurance_contracts: None,
        updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub fn note(registration_number: &str, summary: Option<&str>) -> SummaryNote {
    SummaryNote {
        id: 1,
        registration_number: registration_number.to_string(),
        summary: summary.map(str::to_string),
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        updated_at: None,
    }
}

pub fn pdfs(registration_number: &str, links: Value) -> CompanyPdfs {
    CompanyPdfs {
        registration_number: registration_number.to_string(),
        pdf_links: links,
    }
}

pub fn person(registration_number: &str, name: &str, role: Option<&str>) -> Person {
    Person {
        id: 0,
        registration_number: registration_number.to_string(),
        name: name.to_string(),
        role: role.map(str::to_string),
        appointment_date: None,
        date_of_birth: None,
    }
}

pub fn charges(registration_number: &str, total: i32, items: Value) -> CompanyCharges {
    CompanyCharges {
        id: 0,
        registration_number: registration_number.to_string(),
        total_charges: total,
        charges: items,
    }
}
