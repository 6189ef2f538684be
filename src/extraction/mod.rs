//! Client for the external company data-extraction service.
//!
//! The service is called once per company, either on CSV ingestion
//! (`PROCESS_COMPANY_API`) or on demand (`REPROCESS_COMPANY_API`). Any 2xx
//! answer counts as accepted; the JSON body is optional and may already carry
//! extracted data.

use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::aggregation::{amount_from_json, date_from_json};
use crate::core::config::AppConfig;
use crate::core::shared::models::KeyFinancialChanges;

pub mod persist;

pub use persist::{apply_extraction_response, ExtractionOutcome};

/// Response bodies longer than this are cut in error messages.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(String),
}

#[derive(Debug, Serialize)]
struct ProcessRequest<'a> {
    registration_number: &'a str,
    company_name: &'a str,
}

#[derive(Debug, Serialize)]
struct ReprocessRequest<'a> {
    registration_number: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PersonPayload {
    pub name: String,
    #[serde(alias = "officer_role")]
    pub role: Option<String>,
    #[serde(alias = "appointed_on")]
    pub appointment_date: Option<Value>,
    pub date_of_birth: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct KeyFinancialPayload {
    pub company_name: Option<String>,
    pub company_status: Option<String>,
    pub incorporation_date: Option<Value>,
    pub latest_accounts_date: Option<Value>,
    pub turnover: Option<Value>,
    pub profit: Option<Value>,
    pub fair_value_assets: Option<Value>,
    pub surplus: Option<Value>,
    pub parent_company: Option<String>,
    pub nationality_of_parent: Option<String>,
    pub auditor_name_latest: Option<String>,
    pub auditor_firm_latest: Option<String>,
    pub number_of_uk_defined_benefit_arrangements: Option<Value>,
    pub defined_benefit_arrangements: Option<Value>,
    pub employer_contrib_latest_year: Option<Value>,
    pub employer_contrib_previous_year: Option<Value>,
    pub benefits_paid: Option<Value>,
    pub expenses_paid_latest_year: Option<Value>,
    pub expenses_paid_previous_year: Option<Value>,
    pub defined_contrib_paid: Option<Value>,
    pub assets_equities: Option<Value>,
    pub assets_bonds: Option<Value>,
    pub assets_real_estate: Option<Value>,
    pub assets_ldi: Option<Value>,
    pub assets_cash: Option<Value>,
    pub assets_other: Option<Value>,
    pub assets_diversified_growth: Option<Value>,
    pub assets_alternatives: Option<Value>,
    pub assets_insurance_contracts: Option<Value>,
}

/// Raw year-labelled series, re-keyed when they are stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesInput {
    pub turnover: Option<Value>,
    pub profit: Option<Value>,
    pub fair_value_assets: Option<Value>,
    pub surplus: Option<Value>,
}

fn decimal(value: &Option<Value>) -> Option<bigdecimal::BigDecimal> {
    value
        .as_ref()
        .and_then(amount_from_json)
        .and_then(crate::aggregation::amount_to_decimal)
}

impl KeyFinancialPayload {
    /// Scalar columns as a changeset plus the raw series.
    pub fn into_update(self) -> (KeyFinancialChanges, SeriesInput) {
        let changes = KeyFinancialChanges {
            company_name: self.company_name.filter(|s| !s.trim().is_empty()),
            company_status: self.company_status.filter(|s| !s.trim().is_empty()),
            incorporation_date: self.incorporation_date.as_ref().and_then(date_from_json),
            latest_accounts_date: self.latest_accounts_date.as_ref().and_then(date_from_json),
            parent_company: self.parent_company,
            nationality_of_parent: self.nationality_of_parent,
            auditor_name_latest: self.auditor_name_latest,
            auditor_firm_latest: self.auditor_firm_latest,
            number_of_uk_defined_benefit_arrangements: self
                .number_of_uk_defined_benefit_arrangements
                .as_ref()
                .and_then(amount_from_json)
                .map(|v| v.round() as i32),
            defined_benefit_arrangements: self
                .defined_benefit_arrangements
                .filter(|v| v.is_array()),
            employer_contrib_latest_year: decimal(&self.employer_contrib_latest_year),
            employer_contrib_previous_year: decimal(&self.employer_contrib_previous_year),
            benefits_paid: decimal(&self.benefits_paid),
            expenses_paid_latest_year: decimal(&self.expenses_paid_latest_year),
            expenses_paid_previous_year: decimal(&self.expenses_paid_previous_year),
            defined_contrib_paid: decimal(&self.defined_contrib_paid),
            assets_equities: decimal(&self.assets_equities),
            assets_bonds: decimal(&self.assets_bonds),
            assets_real_estate: decimal(&self.assets_real_estate),
            assets_ldi: decimal(&self.assets_ldi),
            assets_cash: decimal(&self.assets_cash),
            assets_other: decimal(&self.assets_other),
            assets_diversified_growth: decimal(&self.assets_diversified_growth),
            assets_alternatives: decimal(&self.assets_alternatives),
            assets_insurance_contracts: decimal(&self.assets_insurance_contracts),
            ..KeyFinancialChanges::default()
        };
        let series = SeriesInput {
            turnover: self.turnover.filter(Value::is_object),
            profit: self.profit.filter(Value::is_object),
            fair_value_assets: self.fair_value_assets.filter(Value::is_object),
            surplus: self.surplus.filter(Value::is_object),
        };
        (changes, series)
    }
}

/// Optional body of a successful extraction call. Other fields are ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionResponse {
    pub key_financial_data: Option<KeyFinancialPayload>,
    pub people: Option<Vec<PersonPayload>>,
    pub pdf_links: Option<Value>,
    pub charges: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ExtractionClient {
    http: Client,
    process_url: Option<String>,
    reprocess_url: Option<String>,
}

impl ExtractionClient {
    pub fn new(
        process_url: Option<String>,
        reprocess_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ExtractionError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pensionserver/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            process_url: process_url.filter(|u| !u.trim().is_empty()),
            reprocess_url: reprocess_url.filter(|u| !u.trim().is_empty()),
        })
    }

    /// `None` when neither endpoint is configured.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, ExtractionError> {
        if !config.extraction_configured() {
            return Ok(None);
        }
        Self::new(
            config.process_company_api.clone(),
            config.reprocess_company_api.clone(),
            config.extraction_timeout(),
        )
        .map(Some)
    }

    pub fn can_process(&self) -> bool {
        self.process_url.is_some()
    }

    pub fn can_reprocess(&self) -> bool {
        self.reprocess_url.is_some()
    }

    pub async fn process_company(
        &self,
        registration_number: &str,
        company_name: &str,
    ) -> Result<ExtractionResponse, ExtractionError> {
        let url = self
            .process_url
            .as_deref()
            .ok_or(ExtractionError::NotConfigured("PROCESS_COMPANY_API"))?;
        debug!("Requesting extraction for {}", registration_number);
        self.post(
            url,
            &ProcessRequest {
                registration_number,
                company_name,
            },
        )
        .await
    }

    pub async fn reprocess_company(
        &self,
        registration_number: &str,
    ) -> Result<ExtractionResponse, ExtractionError> {
        let url = self
            .reprocess_url
            .as_deref()
            .ok_or(ExtractionError::NotConfigured("REPROCESS_COMPANY_API"))?;
        debug!("Requesting re-extraction for {}", registration_number);
        self.post(url, &ReprocessRequest { registration_number })
            .await
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<ExtractionResponse, ExtractionError> {
        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let mut body: String = text.chars().take(MAX_ERROR_BODY).collect();
            if body.is_empty() {
                body = status.canonical_reason().unwrap_or_default().to_string();
            }
            return Err(ExtractionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!("Extraction service accepted request ({})", status.as_u16());
        parse_response_body(&text)
    }
}

/// Empty or non-object bodies are treated as a bare acknowledgement.
pub fn parse_response_body(text: &str) -> Result<ExtractionResponse, ExtractionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(ExtractionResponse::default());
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ Value::Object(_)) => {
            serde_json::from_value(value).map_err(|e| ExtractionError::Decode(e.to_string()))
        }
        Ok(_) | Err(_) => Ok(ExtractionResponse::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_and_plain_bodies_are_acknowledgements() {
        assert_eq!(parse_response_body("").unwrap(), ExtractionResponse::default());
        assert_eq!(parse_response_body("OK").unwrap(), ExtractionResponse::default());
        assert_eq!(parse_response_body("[1,2]").unwrap(), ExtractionResponse::default());
    }

    #[test]
    fn test_full_body() {
        let body = json!({
            "status": "done",
            "key_financial_data": {
                "company_name": "Acme Pensions Ltd",
                "latest_accounts_date": "2023-12-31",
                "turnover": {"2023": "1,200", "2022": 900},
                "assets_cash": "(10.25)",
                "number_of_uk_defined_benefit_arrangements": 2
            },
            "people": [{"name": "Jane Doe", "role": "director", "date_of_birth": {"year": 1970, "month": 5}}],
            "pdf_links": ["https://files.test/a.pdf"],
            "charges": {"total_charges": 1, "charges": [{"status": "outstanding"}]}
        })
        .to_string();

        let response = parse_response_body(&body).expect("parse");
        assert_eq!(response.people.as_ref().map(Vec::len), Some(1));

        let (changes, series) = response.key_financial_data.unwrap().into_update();
        assert_eq!(changes.company_name.as_deref(), Some("Acme Pensions Ltd"));
        assert_eq!(
            changes.latest_accounts_date,
            chrono::NaiveDate::from_ymd_opt(2023, 12, 31)
        );
        assert_eq!(changes.assets_cash.map(|d| d.to_string()).as_deref(), Some("-10.3"));
        assert_eq!(changes.number_of_uk_defined_benefit_arrangements, Some(2));
        assert!(series.turnover.is_some());
        assert!(series.profit.is_none());
    }

    #[test]
    fn test_key_data_without_series() {
        let response = parse_response_body(r#"{"key_financial_data": {"company_name": "X"}}"#)
            .expect("parse");
        let (changes, series) = response.key_financial_data.expect("payload").into_update();
        assert_eq!(changes.company_name.as_deref(), Some("X"));
        assert_eq!(series, SeriesInput::default());
    }

    #[tokio::test]
    async fn test_unconfigured_endpoint() {
        let client = ExtractionClient::new(None, None, Duration::from_secs(1)).unwrap();
        assert!(!client.can_process());
        let err = client.process_company("01234567", "Acme").await.unwrap_err();
        assert!(matches!(err, ExtractionError::NotConfigured("PROCESS_COMPANY_API")));
    }
}
