//! Integration tests for the MCP Streamable HTTP endpoint.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{body_bytes, body_json, test_app, RecordingMailer};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

const SESSION_HEADER: &str = "mcp-session-id";

fn mcp_post(session: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .uri("/mcp")
        .method("POST")
        .header("content-type", "application/json")
        .header("accept", "application/json, text/event-stream");
    if let Some(id) = session {
        builder = builder.header(SESSION_HEADER, id);
    }
    builder
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn mcp_delete(session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/mcp").method("DELETE");
    if let Some(id) = session {
        builder = builder.header(SESSION_HEADER, id);
    }
    builder.body(Body::empty()).unwrap()
}

fn initialize_request(id: i64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": {"name": "integration-test", "version": "1.0"}
        }
    })
}

fn rpc(id: i64, method: &str, params: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
}

/// Run the handshake and return the new session ID.
async fn open_session(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(mcp_post(None, &initialize_request(1)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let id = response
        .headers()
        .get(SESSION_HEADER)
        .expect("session header")
        .to_str()
        .unwrap()
        .to_string();

    let ack = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    let response = app
        .clone()
        .oneshot(mcp_post(Some(&id), &ack))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    id
}

async fn call(app: &Router, session: &str, body: Value) -> Value {
    let response = app
        .clone()
        .oneshot(mcp_post(Some(session), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SESSION_HEADER).is_none());
    body_json(response).await
}

#[tokio::test]
async fn test_initialize_creates_session() {
    let app = test_app(Arc::default());

    let response = app
        .oneshot(mcp_post(None, &initialize_request(1)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let session = response.headers().get(SESSION_HEADER).unwrap();
    assert!(uuid::Uuid::parse_str(session.to_str().unwrap()).is_ok());
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_EXPOSE_HEADERS)
            .unwrap(),
        SESSION_HEADER
    );

    let body = body_json(response).await;
    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["protocolVersion"], "2025-06-18");
    assert_eq!(body["result"]["serverInfo"]["name"], "cv-email-mcp");
    assert!(body["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn test_concurrent_initializations_get_distinct_sessions() {
    let app = test_app(Arc::default());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { open_session(&app).await })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }
    assert_eq!(ids.len(), 8);
}

#[tokio::test]
async fn test_session_lifecycle() {
    let app = test_app(Arc::default());
    let session = open_session(&app).await;

    let tools = call(&app, &session, rpc(2, "tools/list", json!({}))).await;
    let names: Vec<&str> = tools["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["answer-question", "send-email"]);

    let response = app
        .clone()
        .oneshot(mcp_delete(Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(response).await.is_empty());

    let response = app
        .clone()
        .oneshot(mcp_post(Some(&session), &rpc(3, "tools/list", json!({}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["jsonrpc"], "2.0");
    assert!(body["error"]["code"].is_i64());
}

#[tokio::test]
async fn test_teardown_is_idempotent() {
    let app = test_app(Arc::default());
    let session = open_session(&app).await;

    for request in [
        mcp_delete(Some(&session)),
        mcp_delete(Some(&session)),
        mcp_delete(Some("unknown")),
        mcp_delete(None),
    ] {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}

#[tokio::test]
async fn test_message_without_session_is_rejected() {
    let app = test_app(Arc::default());

    let response = app
        .oneshot(mcp_post(None, &rpc(1, "tools/list", json!({}))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(SESSION_HEADER).is_none());
    let body = body_json(response).await;
    assert_eq!(body["id"], 1);
    assert_eq!(body["error"]["code"], -32000);
}

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let app = test_app(Arc::default());

    // Even initialize may not create a session under a stale ID
    let response = app
        .oneshot(mcp_post(Some("stale-id"), &initialize_request(1)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get(SESSION_HEADER).is_none());
}

#[tokio::test]
async fn test_repeated_initialize_on_session() {
    let app = test_app(Arc::default());
    let session = open_session(&app).await;

    let body = call(&app, &session, initialize_request(5)).await;
    assert_eq!(body["error"]["code"], -32600);

    // The session keeps working
    let body = call(&app, &session, rpc(6, "ping", json!({}))).await;
    assert_eq!(body["result"], json!({}));
}

#[tokio::test]
async fn test_malformed_bodies() {
    let app = test_app(Arc::default());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/mcp")
                .method("POST")
                .header("content-type", "application/json")
                .body(Body::from("{\"jsonrpc\": "))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], -32700);

    for body in [
        json!([initialize_request(1)]),
        json!("initialize"),
        json!({"jsonrpc": "2.0", "id": 1}),
        json!({"jsonrpc": "1.0", "id": 1, "method": "initialize"}),
    ] {
        let response = app.clone().oneshot(mcp_post(None, &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], -32600);
    }
}

#[tokio::test]
async fn test_get_is_not_allowed() {
    let app = test_app(Arc::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/mcp")
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_answer_question_tool() {
    let app = test_app(Arc::default());
    let session = open_session(&app).await;

    let body = call(
        &app,
        &session,
        rpc(
            2,
            "tools/call",
            json!({"name": "answer-question", "arguments": {"question": "Tell me about my work history"}}),
        ),
    )
    .await;

    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Senior Software Engineer @ Northwind Labs (2022 - present) | "));
    assert_eq!(body["result"]["isError"], false);
}

#[tokio::test]
async fn test_answer_question_tool_with_empty_question() {
    let app = test_app(Arc::default());
    let session = open_session(&app).await;

    let body = call(
        &app,
        &session,
        rpc(
            2,
            "tools/call",
            json!({"name": "answer-question", "arguments": {"question": ""}}),
        ),
    )
    .await;

    assert!(body["error"].is_null());
    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("I can answer about your last position"));
    assert_eq!(body["result"]["isError"], false);
}

#[tokio::test]
async fn test_send_email_tool() {
    let mailer = Arc::new(RecordingMailer::default());
    let app = test_app(mailer.clone());
    let session = open_session(&app).await;

    let invalid = call(
        &app,
        &session,
        rpc(
            2,
            "tools/call",
            json!({"name": "send-email", "arguments": {"recipient": "nope", "subject": "Hi", "body": "Hello"}}),
        ),
    )
    .await;
    assert_eq!(invalid["error"]["code"], -32602);
    assert_eq!(mailer.sent_count(), 0);

    let sent = call(
        &app,
        &session,
        rpc(
            3,
            "tools/call",
            json!({"name": "send-email", "arguments": {"recipient": "hiring@example.com", "subject": "Hi", "body": "Hello"}}),
        ),
    )
    .await;
    assert_eq!(
        sent["result"]["content"][0]["text"],
        "Sent email <test-1@example.com>: 250 2.0.0 OK queued"
    );
    assert_eq!(mailer.sent_count(), 1);
}

#[tokio::test]
async fn test_send_email_delivery_failure_keeps_session() {
    let app = test_app(Arc::new(RecordingMailer::failing("smtp.example.com")));
    let session = open_session(&app).await;

    let body = call(
        &app,
        &session,
        rpc(
            2,
            "tools/call",
            json!({"name": "send-email", "arguments": {"recipient": "hiring@example.com", "subject": "Hi", "body": "Hello"}}),
        ),
    )
    .await;
    assert_eq!(body["result"]["isError"], true);
    assert!(body["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("smtp.example.com"));

    let body = call(&app, &session, rpc(3, "ping", json!({}))).await;
    assert!(body["error"].is_null());
}

#[tokio::test]
async fn test_profile_resource_and_prompt() {
    let app = test_app(Arc::default());
    let session = open_session(&app).await;

    let resources = call(&app, &session, rpc(2, "resources/list", json!({}))).await;
    assert_eq!(resources["result"]["resources"][0]["uri"], "profile://me");

    let read = call(
        &app,
        &session,
        rpc(3, "resources/read", json!({"uri": "profile://me"})),
    )
    .await;
    let contents = &read["result"]["contents"][0];
    assert_eq!(contents["mimeType"], "application/json");
    let doc: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
    assert_eq!(doc["name"], "Alex Morgan");

    let prompt = call(
        &app,
        &session,
        rpc(4, "prompts/get", json!({"name": "ask-about-last-role"})),
    )
    .await;
    assert_eq!(
        prompt["result"]["messages"][0]["content"]["text"],
        "What role did I have at my last position?"
    );
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let app = test_app(Arc::default());
    let first = open_session(&app).await;
    let second = open_session(&app).await;

    let response = app
        .clone()
        .oneshot(mcp_delete(Some(&first)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let body = call(&app, &second, rpc(2, "tools/list", json!({}))).await;
    assert!(body["result"]["tools"].is_array());
}

#[tokio::test]
async fn test_cors_preflight_allows_session_header() {
    let app = test_app(Arc::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/mcp")
                .method("OPTIONS")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "mcp-session-id")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_success());
    let allowed = response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
        .unwrap()
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(allowed.contains(SESSION_HEADER));
}
