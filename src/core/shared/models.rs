use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

pub use super::schema;

pub use super::schema::{
    company_charges, company_data, company_pdfs, csv_file_data, key_financial_data, people_data,
    summary_notes, users,
};

use super::enums::{ApprovalStage, ProcessingStatus};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub terms_accepted: bool,
    pub created_at: DateTime<Utc>,
    /// Set by every password reset; older reset tokens are spent.
    pub password_updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub terms_accepted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = company_data)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Company {
    pub id: i32,
    pub company_name: String,
    pub registration_number: Option<String>,
    pub approval_stage: ApprovalStage,
    pub status: ProcessingStatus,
    pub key_financial_data_id: Option<i32>,
    pub type_of_scheme: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = company_data)]
pub struct NewCompany {
    pub company_name: String,
    pub registration_number: Option<String>,
    pub approval_stage: ApprovalStage,
    pub status: ProcessingStatus,
    pub key_financial_data_id: Option<i32>,
    pub type_of_scheme: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = key_financial_data)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct KeyFinancialData {
    pub id: i32,
    pub registration_number: String,
    pub company_name: Option<String>,
    pub company_status: Option<String>,
    pub incorporation_date: Option<NaiveDate>,
    pub latest_accounts_date: Option<NaiveDate>,
    pub turnover: serde_json::Value,
    pub profit: serde_json::Value,
    pub fair_value_assets: serde_json::Value,
    pub surplus: serde_json::Value,
    pub parent_company: Option<String>,
    pub nationality_of_parent: Option<String>,
    pub auditor_name_latest: Option<String>,
    pub auditor_firm_latest: Option<String>,
    pub number_of_uk_defined_benefit_arrangements: Option<i32>,
    pub defined_benefit_arrangements: serde_json::Value,
    pub employer_contrib_latest_year: Option<BigDecimal>,
    pub employer_contrib_previous_year: Option<BigDecimal>,
    pub benefits_paid: Option<BigDecimal>,
    pub expenses_paid_latest_year: Option<BigDecimal>,
    pub expenses_paid_previous_year: Option<BigDecimal>,
    pub defined_contrib_paid: Option<BigDecimal>,
    pub assets_equities: Option<BigDecimal>,
    pub assets_bonds: Option<BigDecimal>,
    pub assets_real_estate: Option<BigDecimal>,
    pub assets_ldi: Option<BigDecimal>,
    pub assets_cash: Option<BigDecimal>,
    pub assets_other: Option<BigDecimal>,
    pub assets_diversified_growth: Option<BigDecimal>,
    pub assets_alternatives: Option<BigDecimal>,
    pub assets_insurance_contracts: Option<BigDecimal>,
    pub updated_at: DateTime<Utc>,
}

/// Minimal row created when a registration number is first seen.
#[derive(Debug, Insertable)]
#[diesel(table_name = key_financial_data)]
pub struct NewKeyFinancialStub {
    pub registration_number: String,
    pub company_name: Option<String>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Default, Clone, AsChangeset)]
#[diesel(table_name = key_financial_data)]
pub struct KeyFinancialChanges {
    pub company_name: Option<String>,
    pub company_status: Option<String>,
    pub incorporation_date: Option<NaiveDate>,
    pub latest_accounts_date: Option<NaiveDate>,
    pub turnover: Option<serde_json::Value>,
    pub profit: Option<serde_json::Value>,
    pub fair_value_assets: Option<serde_json::Value>,
    pub surplus: Option<serde_json::Value>,
    pub parent_company: Option<String>,
    pub nationality_of_parent: Option<String>,
    pub auditor_name_latest: Option<String>,
    pub auditor_firm_latest: Option<String>,
    pub number_of_uk_defined_benefit_arrangements: Option<i32>,
    pub defined_benefit_arrangements: Option<serde_json::Value>,
    pub employer_contrib_latest_year: Option<BigDecimal>,
    pub employer_contrib_previous_year: Option<BigDecimal>,
    pub benefits_paid: Option<BigDecimal>,
    pub expenses_paid_latest_year: Option<BigDecimal>,
    pub expenses_paid_previous_year: Option<BigDecimal>,
    pub defined_contrib_paid: Option<BigDecimal>,
    pub assets_equities: Option<BigDecimal>,
    pub assets_bonds: Option<BigDecimal>,
    pub assets_real_estate: Option<BigDecimal>,
    pub assets_ldi: Option<BigDecimal>,
    pub assets_cash: Option<BigDecimal>,
    pub assets_other: Option<BigDecimal>,
    pub assets_diversified_growth: Option<BigDecimal>,
    pub assets_alternatives: Option<BigDecimal>,
    pub assets_insurance_contracts: Option<BigDecimal>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = people_data)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Person {
    pub id: i32,
    pub registration_number: String,
    pub name: String,
    pub role: Option<String>,
    pub appointment_date: Option<NaiveDate>,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Insertable)]
#[diesel(table_name = people_data)]
pub struct NewPerson {
    pub registration_number: String,
    pub name: String,
    pub role: Option<String>,
    pub appointment_date: Option<NaiveDate>,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = summary_notes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SummaryNote {
    pub id: i32,
    pub registration_number: String,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = summary_notes)]
pub struct NewSummaryNote {
    pub registration_number: String,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = company_pdfs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CompanyPdfs {
    pub registration_number: String,
    pub pdf_links: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = company_charges)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CompanyCharges {
    pub id: i32,
    pub registration_number: String,
    pub total_charges: i32,
    pub charges: serde_json::Value,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = company_charges)]
pub struct NewCompanyCharges {
    pub registration_number: String,
    pub total_charges: i32,
    pub charges: serde_json::Value,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = csv_file_data)]
pub struct NewCsvFileRow {
    pub company_name: Option<String>,
    pub registration_number: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub address3: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub postcode: Option<String>,
    pub source_file: String,
}
