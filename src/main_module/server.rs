//! HTTP server initialization and routing

use axum::extract::DefaultBodyLimit;
use axum::{routing::get, Router};
use log::{error, info};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::configure_auth_routes;
use crate::companies::configure_companies_routes;
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::export::configure_export_routes;
use crate::ingest::configure_ingest_routes;
use crate::notes::configure_notes_routes;
use crate::people::configure_people_routes;
use crate::security::cors::create_cors_layer;

use super::{health_check, health_check_simple};

/// Every route of the service with its middleware stack.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let body_limit = app_state.config.max_upload_bytes;
    let cors = create_cors_layer(&app_state.config);

    Router::new()
        .route(ApiUrls::HEALTH, get(health_check_simple))
        .route(ApiUrls::API_HEALTH, get(health_check))
        .merge(configure_auth_routes())
        .merge(configure_ingest_routes())
        .merge(configure_companies_routes())
        .merge(configure_people_routes())
        .merge(configure_notes_routes())
        .merge(configure_export_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let addr = app_state.config.bind_address();
    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(
                "Failed to bind to {}: {} - is another instance running?",
                addr, e
            );
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::MemoryMailer;
    use crate::tests::test_util::{setup, test_state};
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    fn json_request(method: Method, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_simple_health() {
        setup();
        let app = build_router(test_state(MemoryMailer::new()));
        let request = Request::get(ApiUrls::HEALTH).body(Body::empty()).unwrap();
        let (status, _, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "pensionserver");
    }

    #[tokio::test]
    async fn test_health_reports_unreachable_database() {
        setup();
        let app = build_router(test_state(MemoryMailer::new()));
        let request = Request::get(ApiUrls::API_HEALTH).body(Body::empty()).unwrap();
        let (status, _, body) = send(app, request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["database"], false);
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        setup();
        let app = build_router(test_state(MemoryMailer::new()));
        let request = Request::get(ApiUrls::COMPANY_DATA).body(Body::empty()).unwrap();
        let (status, headers, body) = send(app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer");
        assert_eq!(body["detail"], "Not authenticated");
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        setup();
        let app = build_router(test_state(MemoryMailer::new()));
        let request = json_request(
            Method::POST,
            ApiUrls::EXPORT_COMPANY_DATA,
            json!({"ids": [1]}),
            Some("not-a-jwt"),
        );
        let (status, _, body) = send(app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Could not validate credentials");
    }

    #[tokio::test]
    async fn test_reset_token_cannot_authenticate() {
        setup();
        let state = test_state(MemoryMailer::new());
        let token = state.jwt_manager.generate_reset_token("a@example.com").unwrap();
        let app = build_router(state);
        let request = Request::get(ApiUrls::COMPANY_DATA)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signup_validation_runs_before_database() {
        setup();
        let app = build_router(test_state(MemoryMailer::new()));
        let request = json_request(
            Method::POST,
            ApiUrls::SIGNUP,
            json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": "not-an-email",
                "password": "Sup3r-secret!",
                "terms_accepted": true
            }),
            None,
        );
        let (status, _, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("email"));
    }

    #[tokio::test]
    async fn test_list_rejects_bad_paging() {
        setup();
        let state = test_state(MemoryMailer::new());
        let token = state.jwt_manager.generate_access_token("a@example.com").unwrap();
        let app = build_router(state);
        let request = Request::get(format!("{}?page=0", ApiUrls::COMPANY_DATA))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_export_requires_ids() {
        setup();
        let state = test_state(MemoryMailer::new());
        let token = state.jwt_manager.generate_access_token("a@example.com").unwrap();
        let app = build_router(state);
        let request = json_request(
            Method::POST,
            ApiUrls::EXPORT_COMPANY_DATA,
            json!({"ids": []}),
            Some(&token),
        );
        let (status, _, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "No company ids given");
    }

    #[tokio::test]
    async fn test_mistyped_approval_stage_is_bad_request() {
        setup();
        let state = test_state(MemoryMailer::new());
        let token = state.jwt_manager.generate_access_token("a@example.com").unwrap();
        for stage in [json!("1"), json!(5_000_000_000_i64), json!(7)] {
            let request = json_request(
                Method::PUT,
                "/api/update-approval-stage/1",
                json!({ "approval_stage": stage }),
                Some(&token),
            );
            let (status, _, body) = send(build_router(state.clone()), request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{stage}");
            assert!(body["detail"].is_string(), "{stage}");
        }
    }

    #[tokio::test]
    async fn test_signup_missing_field_is_bad_request() {
        setup();
        let app = build_router(test_state(MemoryMailer::new()));
        let request = json_request(
            Method::POST,
            ApiUrls::SIGNUP,
            json!({
                "last_name": "Lovelace",
                "email": "ada@example.com",
                "password": "Sup3r-secret!",
                "terms_accepted": true
            }),
            None,
        );
        let (status, _, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("first_name"));
    }

    #[tokio::test]
    async fn test_reprocess_unavailable_without_service() {
        setup();
        let state = test_state(MemoryMailer::new());
        let token = state.jwt_manager.generate_access_token("a@example.com").unwrap();
        let app = build_router(state);
        let request = json_request(
            Method::POST,
            "/api/reprocess-company/1",
            Value::Null,
            Some(&token),
        );
        let (status, _, body) = send(app, request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["detail"], "Reprocessing service is not configured");
    }

    #[tokio::test]
    async fn test_database_failure_is_masked() {
        setup();
        let state = test_state(MemoryMailer::new());
        let token = state.jwt_manager.generate_access_token("a@example.com").unwrap();
        let app = build_router(state);
        let request = Request::get(ApiUrls::COMPANY_DATA)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(app, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Internal server error");
    }
}
