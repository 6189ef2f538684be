use crate::core::config::AppConfig;
use crate::core::shared::utils::DbPool;
use crate::email::Mailer;
use crate::extraction::ExtractionClient;
use crate::security::jwt::JwtManager;
use crate::security::password::PasswordHasher2;
use std::sync::Arc;

pub struct AppState {
    pub config: AppConfig,
    pub conn: DbPool,
    pub jwt_manager: Arc<JwtManager>,
    pub password_hasher: Arc<PasswordHasher2>,
    /// `None` when neither extraction endpoint is configured.
    pub extraction: Option<Arc<ExtractionClient>>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        conn: DbPool,
        jwt_manager: JwtManager,
        password_hasher: PasswordHasher2,
        extraction: Option<ExtractionClient>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            config,
            conn,
            jwt_manager: Arc::new(jwt_manager),
            password_hasher: Arc::new(password_hasher),
            extraction: extraction.map(Arc::new),
            mailer,
        }
    }
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            conn: self.conn.clone(),
            jwt_manager: Arc::clone(&self.jwt_manager),
            password_hasher: Arc::clone(&self.password_hasher),
            extraction: self.extraction.clone(),
            mailer: Arc::clone(&self.mailer),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("server", &self.config.bind_address())
            .field("conn", &"DbPool")
            .field("jwt_manager", &self.jwt_manager)
            .field("extraction", &self.extraction.is_some())
            .field("mailer", &self.mailer.name())
            .finish()
    }
}
