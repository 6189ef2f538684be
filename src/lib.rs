pub mod aggregation;
pub mod auth;
pub mod companies;
pub mod core;
pub mod email;
pub mod export;
pub mod extraction;
pub mod ingest;
pub mod main_module;
pub mod notes;
pub mod people;
pub mod security;
#[cfg(test)]
pub mod tests;
