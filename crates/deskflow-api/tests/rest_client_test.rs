// Integration tests for `RestClient` using wiremock.
#![allow(clippy::unwrap_used)]

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use deskflow_api::{Error, RestClient, Row};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RestClient) {
    let server = MockServer::start().await;
    let client = RestClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, client)
}

fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().unwrap()
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_select_rows() {
    let (server, client) = setup().await;

    let body = json!([
        { "id": "c2", "name": "Globex", "created_at": "2026-03-02T09:00:00Z" },
        { "id": "c1", "name": "Acme", "created_at": "2026-03-01T09:00:00Z" },
    ]);

    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .and(query_param("select", "*"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let rows = client.select("clients", Some("created_at.desc")).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], "Globex");
    assert_eq!(rows[1]["id"], "c1");
}

#[tokio::test]
async fn test_select_without_order_sends_no_order_param() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/categories"))
        .and(query_param("select", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "Billing" },
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = client.select("categories", None).await.unwrap();
    assert_eq!(rows.len(), 1);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(
        requests[0].url.query_pairs().all(|(name, _)| name != "order"),
        "unexpected order param in {}",
        requests[0].url
    );
}

#[tokio::test]
async fn test_insert_returns_stored_row() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/tickets"))
        .and(header("prefer", "return=representation"))
        .and(body_json(json!({ "title": "VPN down" })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([{ "id": "t9", "title": "VPN down", "status": "open" }])),
        )
        .mount(&server)
        .await;

    let stored = client
        .insert("tickets", &row(json!({ "title": "VPN down" })))
        .await
        .unwrap();

    assert_eq!(stored["id"], "t9");
    assert_eq!(stored["status"], "open");
}

#[tokio::test]
async fn test_update_filters_by_id() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/clients"))
        .and(query_param("id", "eq.c1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": "c1", "name": "X" }])),
        )
        .mount(&server)
        .await;

    let stored = client
        .update("clients", "c1", &row(json!({ "name": "X" })))
        .await
        .unwrap();

    assert_eq!(stored["name"], "X");
}

#[tokio::test]
async fn test_delete_row() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/articles"))
        .and(query_param("id", "eq.a3"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.delete("articles", "a3").await.unwrap();
}

// ── Error-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_structured_error_is_parsed() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/clients"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&server)
        .await;

    let err = client
        .insert("clients", &row(json!({ "email": "a@b.c" })))
        .await
        .unwrap_err();

    match &err {
        Error::Remote {
            status,
            code,
            message,
        } => {
            assert_eq!(*status, 409);
            assert_eq!(code.as_deref(), Some("23505"));
            assert!(message.contains("duplicate key"));
        }
        other => panic!("expected Remote error, got {other:?}"),
    }
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_plain_text_error_keeps_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/tickets"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client.select("tickets", None).await.unwrap_err();

    assert_eq!(err.status(), Some(502));
    assert!(err.is_transient());
    assert!(err.to_string().contains("bad gateway"));
}

#[tokio::test]
async fn test_update_with_no_matching_row() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/tickets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let err = client
        .update("tickets", "missing", &row(json!({ "status": "closed" })))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::EmptyResult { ref id, .. } if id == "missing"));
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{ not json"))
        .mount(&server)
        .await;

    let err = client.select("categories", None).await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }));
}
