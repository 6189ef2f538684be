use axum::http::{header, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use crate::core::config::AppConfig;

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Which browser origins may call the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPolicy {
    Any,
    List(Vec<HeaderValue>),
    None,
}

impl OriginPolicy {
    pub fn from_origins(origins: &[String]) -> Self {
        if origins.iter().any(|o| o == "*") {
            return Self::Any;
        }
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter(|o| is_http_origin(o))
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        if parsed.is_empty() {
            Self::None
        } else {
            Self::List(parsed)
        }
    }
}

fn is_http_origin(origin: &str) -> bool {
    let rest = origin
        .strip_prefix("https://")
        .or_else(|| origin.strip_prefix("http://"));
    match rest {
        Some(host) => !host.is_empty() && !host.contains('/') && !host.contains(char::is_whitespace),
        None => false,
    }
}

pub fn create_cors_layer(config: &AppConfig) -> CorsLayer {
    let policy = OriginPolicy::from_origins(&config.allowed_origins());

    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        // The export download reads its file name from this header.
        .expose_headers([header::CONTENT_DISPOSITION])
        .max_age(PREFLIGHT_MAX_AGE);

    match policy {
        // Credentials cannot be combined with a wildcard origin.
        OriginPolicy::Any => {
            info!("CORS allows any origin");
            base.allow_origin(AllowOrigin::any())
        }
        OriginPolicy::List(origins) => {
            info!("CORS configured with {} allowed origins", origins.len());
            base.allow_origin(origins).allow_credentials(true)
        }
        OriginPolicy::None => {
            warn!("No valid CORS origins configured; cross-origin requests are refused");
            base.allow_origin(AllowOrigin::predicate(|_, _| false))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_wins() {
        let policy = OriginPolicy::from_origins(&["http://a.test".into(), "*".into()]);
        assert_eq!(policy, OriginPolicy::Any);
    }

    #[test]
    fn test_invalid_origins_dropped() {
        let policy = OriginPolicy::from_origins(&[
            "http://localhost:3000".into(),
            "ftp://example.com".into(),
            "https://".into(),
            "javascript:alert(1)".into(),
        ]);
        assert_eq!(
            policy,
            OriginPolicy::List(vec![HeaderValue::from_static("http://localhost:3000")])
        );
    }

    #[test]
    fn test_nothing_usable() {
        assert_eq!(OriginPolicy::from_origins(&[]), OriginPolicy::None);
    }

    #[test]
    fn test_layer_from_config() {
        let config = AppConfig {
            cors_allowed_origins: "http://localhost:3000, https://pensions.example.com".into(),
            ..AppConfig::default()
        };
        assert_eq!(config.allowed_origins().len(), 2);
        let _layer = create_cors_layer(&config);
    }
}
