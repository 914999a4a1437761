#![allow(dead_code)]

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use fedlens_match::alias::MatchConfig;
use fedlens_server::app;
use fedlens_server::config::ServerConfig;
use fedlens_server::state::AppState;
use fedlens_storage::store::{IncidentRow, ProductRow, UseCaseRow};
use fedlens_storage::RecordStore;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
}

pub async fn build_test_context() -> Result<TestContext> {
    fedlens_common::id::init(1, 1);

    let temp_dir = tempfile::tempdir()?;
    let db_path = temp_dir.path().join("fedlens.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let store = Arc::new(RecordStore::new(&db_url).await?);

    let config: ServerConfig = toml::from_str("")?;
    let state = AppState {
        store,
        match_config: Arc::new(MatchConfig::default()),
        start_time: Utc::now(),
        config: Arc::new(config),
    };

    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
    })
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    builder = builder.header("Content-Type", "application/json");

    let req_body = body.unwrap_or(Value::Null).to_string();
    let req = builder
        .body(Body::from(req_body))
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub fn assert_ok_envelope(json: &Value) {
    assert_eq!(json["err_code"], 0);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
}

pub fn assert_err_envelope(json: &Value, err_code: i32) {
    assert_eq!(json["err_code"], err_code);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
    assert!(json.get("data").is_some());
    assert!(json["data"].is_null());
}

pub fn sample_use_case(name: &str, agency: &str, abbr: &str, has_llm: bool) -> UseCaseRow {
    let now = Utc::now();
    let slug = fedlens_common::types::slugify(&format!("{abbr} {name}"), 80);
    UseCaseRow {
        id: fedlens_common::id::next_id(),
        use_case_name: name.to_string(),
        agency: agency.to_string(),
        agency_abbreviation: Some(abbr.to_string()),
        bureau: None,
        topic_area: None,
        intended_purpose: Some(format!("{name} purpose")),
        outputs: None,
        stage_of_development: Some("Operation and Maintenance".to_string()),
        rights_safety_impacting: None,
        domain_category: Some("Mission-Enabling".to_string()),
        date_initiated: None,
        date_implemented: None,
        date_retired: None,
        has_llm,
        has_genai: has_llm,
        has_chatbot: false,
        has_coding_assistant: false,
        has_coding_agent: false,
        has_classic_ml: !has_llm,
        has_rpa: false,
        has_rules: false,
        providers_detected: vec!["OpenAI".to_string()],
        commercial_product: None,
        slug,
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_product(fedramp_id: &str, provider: &str, offering: &str) -> ProductRow {
    let now = Utc::now();
    ProductRow {
        id: fedlens_common::id::next_id(),
        fedramp_id: fedramp_id.to_string(),
        provider_name: provider.to_string(),
        offering_name: offering.to_string(),
        service_model: Some("SaaS".to_string()),
        status: "authorized".to_string(),
        authorization_date: Some("2023-05-01".to_string()),
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_incident(title: &str, deployers: &[&str]) -> IncidentRow {
    let now = Utc::now();
    IncidentRow {
        id: fedlens_common::id::next_id(),
        title: title.to_string(),
        description: Some(format!("{title} description")),
        occurred_on: Some("2024-03-15".to_string()),
        deployers: deployers.iter().map(|s| s.to_string()).collect(),
        developers: vec![],
        harmed_parties: vec!["users".to_string()],
        source_url: None,
        created_at: now,
        updated_at: now,
    }
}
