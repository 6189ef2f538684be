pub mod enums;
pub mod error;
pub mod models;
pub mod schema;
pub mod state;
pub mod utils;

pub use enums::{ApprovalStage, CompanyStatus, ProcessingStatus};
pub use error::{ApiError, ApiJson, ApiResult};
pub use utils::{create_conn, DbPool};
