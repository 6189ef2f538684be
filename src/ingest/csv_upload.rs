use csv::{ReaderBuilder, StringRecord, Trim};

use super::headers::{self, HeaderIndex};
use super::IngestError;
use crate::aggregation::normalize_optional_registration_number;

/// One non-blank data row of an uploaded company CSV.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvCompanyRow {
    /// 1-based line in the file, header included.
    pub line: u64,
    pub company_name: Option<String>,
    /// Normalized; `None` when absent or blank.
    pub registration_number: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub address3: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub postcode: Option<String>,
    pub type_of_scheme: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    company_name: usize,
    registration_number: Option<usize>,
    address1: Option<usize>,
    address2: Option<usize>,
    address3: Option<usize>,
    city: Option<usize>,
    county: Option<usize>,
    postcode: Option<usize>,
    type_of_scheme: Option<usize>,
}

impl Columns {
    fn resolve(index: &HeaderIndex) -> Result<Self, IngestError> {
        Ok(Self {
            company_name: index
                .find(headers::COMPANY_NAME)
                .ok_or(IngestError::MissingColumn("company name"))?,
            registration_number: index.find(headers::REGISTRATION_NUMBER),
            address1: index.find(headers::ADDRESS1),
            address2: index.find(headers::ADDRESS2),
            address3: index.find(headers::ADDRESS3),
            city: index.find(headers::CITY),
            county: index.find(headers::COUNTY),
            postcode: index.find(headers::POSTCODE),
            type_of_scheme: index.find(headers::TYPE_OF_SCHEME),
        })
    }
}

fn field(record: &StringRecord, column: Option<usize>) -> Option<String> {
    column
        .and_then(|c| record.get(c))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse an uploaded CSV. Blank rows are dropped.
pub fn parse_company_csv(bytes: &[u8]) -> Result<Vec<CsvCompanyRow>, IngestError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let header_record = reader.headers()?.clone();
    if header_record.iter().all(|h| h.trim().is_empty()) {
        return Err(IngestError::EmptyFile);
    }
    let columns = Columns::resolve(&HeaderIndex::new(header_record.iter()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        let line = record.position().map_or(0, |p| p.line());
        rows.push(CsvCompanyRow {
            line,
            company_name: field(&record, Some(columns.company_name)),
            registration_number: normalize_optional_registration_number(
                field(&record, columns.registration_number).as_deref(),
            ),
            address1: field(&record, columns.address1),
            address2: field(&record, columns.address2),
            address3: field(&record, columns.address3),
            city: field(&record, columns.city),
            county: field(&record, columns.county),
            postcode: field(&record, columns.postcode),
            type_of_scheme: field(&record, columns.type_of_scheme),
        });
    }
    Ok(rows)
}
