//! Black-box HTTP tests: drive the real router over a socket with `reqwest`,
//! the same way the teacher's API crate tests its routes end to end.

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use uuid::Uuid;

const JWT_SECRET: &str = "test-secret";

async fn spawn_app() -> String {
    let app = ledgerflow_api::app::build_app(JWT_SECRET.to_string()).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

fn mint_token(capabilities: &[&str]) -> String {
    let now = Utc::now();
    let claims = json!({
        "sub": Uuid::new_v4().to_string(),
        "actor_type": "human",
        "name": "ap-clerk",
        "tenant_id": Uuid::new_v4().to_string(),
        "legal_entity": Uuid::new_v4().to_string(),
        "capabilities": capabilities,
        "iat": now.timestamp(),
        "exp": (now + Duration::hours(1)).timestamp(),
    });

    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}

#[tokio::test]
async fn health_check_requires_no_auth() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_route_without_token_is_unauthorized() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/intents"))
        .json(&json!({"type": "ap.vendor.create", "data": {"name": "Acme"}}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn vendor_create_without_required_capability_is_forbidden() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();
    let token = mint_token(&["ap.item.create"]);

    let response = client
        .post(format!("{base}/intents"))
        .bearer_auth(token)
        .json(&json!({"type": "ap.vendor.create", "data": {"name": "Acme"}}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn vendor_create_succeeds_and_appears_in_projection() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();
    let token = mint_token(&["ap.vendor.create"]);

    let response = client
        .post(format!("{base}/intents"))
        .bearer_auth(token)
        .json(&json!({"type": "ap.vendor.create", "data": {"name": "Acme Corp", "credit_limit": 50000}}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert!(body["event_id"].is_string());

    let projection = client
        .get(format!("{base}/projections/vendor_list"))
        .bearer_auth(mint_token(&["ap.vendor.create"]))
        .send()
        .await
        .unwrap();
    assert_eq!(projection.status(), 200);
    let rows: Value = projection.json().await.unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["name"], "Acme Corp");
}

#[tokio::test]
async fn vendor_create_missing_name_is_rejected() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();
    let token = mint_token(&["ap.vendor.create"]);

    let response = client
        .post(format!("{base}/intents"))
        .bearer_auth(&token)
        .json(&json!({"type": "ap.vendor.create", "data": {}}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn unknown_projection_name_is_not_found() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();
    let token = mint_token(&["ap.vendor.create"]);

    let response = client
        .get(format!("{base}/projections/does_not_exist"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn audit_log_lists_appended_events() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();
    let token = mint_token(&["ap.vendor.create"]);

    client
        .post(format!("{base}/intents"))
        .bearer_auth(&token)
        .json(&json!({"type": "ap.vendor.create", "data": {"name": "Audit Test Co"}}))
        .send()
        .await
        .unwrap();

    let response = client
        .get(format!("{base}/audit/events"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(!body["events"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn event_type_registration_round_trips() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();
    let token = mint_token(&["ap.vendor.create"]);

    let register = client
        .post(format!("{base}/event-types"))
        .bearer_auth(&token)
        .json(&json!({
            "type_name": "ap.vendor.created",
            "schema_version": 1,
            "json_schema": {"type": "object"},
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(register.status(), 201);

    let schema = client
        .get(format!("{base}/event-types/ap.vendor.created/1"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(schema.status(), 200);
}
