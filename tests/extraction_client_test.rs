use std::time::Duration;

use mockito::Matcher;
use pensionserver::extraction::{ExtractionClient, ExtractionError, ExtractionResponse};
use serde_json::json;

fn client(server: &mockito::Server) -> ExtractionClient {
    ExtractionClient::new(
        Some(format!("{}/process", server.url())),
        Some(format!("{}/reprocess", server.url())),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_process_sends_registration_and_name() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/process")
        .match_body(Matcher::Json(json!({
            "registration_number": "01234567",
            "company_name": "Acme Pensions Ltd"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "status": "done",
                "key_financial_data": {
                    "latest_accounts_date": "2023-12-31",
                    "turnover": {"2023": 1500.0, "2022": 1200.0}
                },
                "people": [
                    {"name": "Jane Doe", "officer_role": "director", "appointed_on": "2019-04-01"}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let response = client(&server)
        .process_company("01234567", "Acme Pensions Ltd")
        .await
        .unwrap();

    mock.assert_async().await;
    let key_data = response.key_financial_data.expect("key financial data");
    assert_eq!(key_data.turnover, Some(json!({"2023": 1500.0, "2022": 1200.0})));
    let people = response.people.unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].role.as_deref(), Some("director"));
}

#[tokio::test]
async fn test_empty_body_is_acknowledgement() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/reprocess")
        .match_body(Matcher::Json(json!({"registration_number": "SC123456"})))
        .with_status(202)
        .create_async()
        .await;

    let response = client(&server).reprocess_company("SC123456").await.unwrap();

    mock.assert_async().await;
    assert_eq!(response, ExtractionResponse::default());
}

#[tokio::test]
async fn test_non_object_body_is_acknowledgement() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/process")
        .with_status(200)
        .with_body("\"queued\"")
        .create_async()
        .await;

    let response = client(&server)
        .process_company("01234567", "Acme")
        .await
        .unwrap();
    assert_eq!(response, ExtractionResponse::default());
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/process")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let err = client(&server)
        .process_company("01234567", "Acme")
        .await
        .unwrap_err();
    match err {
        ExtractionError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_endpoint_is_not_configured() {
    let client = ExtractionClient::new(None, Some("http://127.0.0.1:1/r".into()), Duration::from_secs(1))
        .unwrap();
    assert!(!client.can_process());
    let err = client.process_company("01234567", "Acme").await.unwrap_err();
    assert!(matches!(err, ExtractionError::NotConfigured("PROCESS_COMPANY_API")));
}
