// Core (Always available)
pub mod core;
pub use self::core::*;

pub mod registry;
pub use self::registry::*;

diesel::allow_tables_to_appear_in_same_query!(
    users,
    company_data,
    key_financial_data,
    people_data,
    summary_notes,
    company_pdfs,
    company_charges,
    csv_file_data,
);
