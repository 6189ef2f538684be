#[derive(Debug)]
pub struct ApiUrls;

impl ApiUrls {
    // Health
    pub const HEALTH: &'static str = "/health";
    pub const API_HEALTH: &'static str = "/api/health";

    // Auth - anonymous JSON APIs
    pub const SIGNUP: &'static str = "/api/signup";
    pub const SIGNIN: &'static str = "/api/signin";
    pub const LOGIN: &'static str = "/api/login";
    pub const FORGOT_PASSWORD: &'static str = "/api/forgot-password";
    pub const RESET_PASSWORD: &'static str = "/api/reset-password";

    // Ingestion - multipart uploads
    pub const UPLOAD_FILE: &'static str = "/api/upload-file";
    pub const IMPORT_KEY_FINANCIAL_DATA: &'static str = "/api/import-key-financial-data";

    // Companies
    pub const COMPANY_DATA: &'static str = "/api/company-data";
    pub const UPDATE_REGISTRATION_NUMBER: &'static str = "/api/update-registration-number/:id";
    pub const UPDATE_APPROVAL_STAGE: &'static str = "/api/update-approval-stage/:id";
    pub const DELETE_COMPANIES: &'static str = "/api/delete-companies";
    pub const KEY_FINANCIAL_DATA: &'static str = "/api/key-financial-data/:id";
    pub const REPROCESS_COMPANY: &'static str = "/api/reprocess-company/:id";

    // People and notes
    pub const PEOPLE: &'static str = "/api/people/:registration_number";
    pub const SUMMARY_NOTES: &'static str = "/api/summary-notes/:company_id";

    // Export
    pub const EXPORT_COMPANY_DATA: &'static str = "/api/export-company-data";
}
