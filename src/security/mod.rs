pub mod auth;
pub mod cors;
pub mod jwt;
pub mod password;
pub mod validation;

pub use auth::AuthenticatedUser;
pub use cors::create_cors_layer;
pub use jwt::{Claims, JwtManager};
pub use password::PasswordHasher2;
pub use validation::ValidationError;
