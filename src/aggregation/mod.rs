//! Company aggregation: the database-free core shared by the listing,
//! detail and export endpoints.
//!
//! Every table is joined on the normalized registration number, and the
//! year-keyed financial series are re-keyed to calendar years before they are
//! compared or displayed.

pub mod amounts;
pub mod arrangements;
pub mod bundle;
pub mod dates;
pub mod overview;
pub mod registration;
pub mod years;

#[cfg(test)]
pub(crate) mod testing;

pub use amounts::{amount_from_json, amount_to_decimal, parse_amount, round_amount};
pub use arrangements::{
    arrangements_from_json, arrangements_to_json, classify_arrangement_header, Arrangement,
    ArrangementField,
};
pub use dates::{date_from_json, parse_date};
pub use bundle::{
    build_export_bundle, Cell, ExportBundle, ExportOptions, ExportSheet, ExportSources,
};
pub use overview::{
    aggregate_companies, derive_processing_status, index_key_data, pdf_links_from_json,
    resolve_key_financial_link, Aggregation, CompanyOverview, KeyFinancialView, LinkRepair,
    NormalizedSeries,
};
pub use registration::{
    derive_company_status, normalize_optional_registration_number, normalize_registration_number,
};
pub use years::{normalize_series, normalize_year_key, FinancialSeries, SeriesNormalization};
