//! Integration tests for the relay HTTP server.

#![cfg(unix)]

mod common;

use std::path::Path;
use std::time::Duration;

use claude_relay::config::ServerSettings;
use claude_relay::messenger::Messenger;
use claude_relay::server::{RelayServer, ServerError};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use common::{config_for, scripts};

struct TestServer {
    base: String,
    shutdown: CancellationToken,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    async fn start(binary: &Path) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: addr.port(),
            allowed_origins: vec!["https://chat.example.com".to_string()],
        };
        let server = RelayServer::new(Messenger::new(&config_for(binary)), settings);

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server.serve(listener, shutdown.clone()));

        Self {
            base: format!("http://{addr}"),
            shutdown,
            handle,
        }
    }

    async fn with_script(name: &str) -> Self {
        Self::start(&scripts().path(name)).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn chat(&self, body: Value) -> (StatusCode, Value) {
        let response = reqwest::Client::new()
            .post(self.url("/api/chat"))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn stop(self) {
        self.shutdown.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::with_script("success").await;

    let response = reqwest::get(server.url("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(timestamp.ends_with('Z'));
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    // Millisecond precision: 2024-01-01T00:00:00.000Z
    assert_eq!(timestamp.len(), 24);

    server.stop().await;
}

#[tokio::test]
async fn test_chat_success() {
    let server = TestServer::with_script("success").await;

    let (status, body) = server
        .chat(json!({"message": "Hello", "options": {"sessionId": "s-1"}}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Hello from fake claude");
    assert_eq!(body["session_id"], "s-1");
    assert_eq!(body["metadata"]["model"], "fake");

    server.stop().await;
}

#[tokio::test]
async fn test_chat_invalid_message() {
    let server = TestServer::with_script("success").await;

    let (status, body) = server.chat(json!({"message": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_argument");
    assert_eq!(body["error"]["message"], "Message cannot be empty");

    let (status, body) = server.chat(json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Message is required");

    let (status, _) = server.chat(json!({"message": 42})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    server.stop().await;
}

#[tokio::test]
async fn test_chat_body_not_json() {
    let server = TestServer::with_script("success").await;

    let response = reqwest::Client::new()
        .post(server.url("/api/chat"))
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "invalid_argument");

    server.stop().await;
}

#[tokio::test]
async fn test_chat_error_statuses() {
    let cases = [
        ("fails", StatusCode::BAD_GATEWAY, "process_failure"),
        ("not_json", StatusCode::BAD_GATEWAY, "malformed_response"),
        ("missing_field", StatusCode::BAD_GATEWAY, "malformed_response"),
    ];

    for (script, expected_status, expected_kind) in cases {
        let server = TestServer::with_script(script).await;
        let (status, body) = server.chat(json!({"message": "Hello"})).await;

        assert_eq!(status, expected_status, "script {script}");
        assert_eq!(body["error"]["kind"], expected_kind, "script {script}");
        server.stop().await;
    }
}

#[tokio::test]
async fn test_chat_spawn_failure() {
    let server = TestServer::start(&scripts().missing()).await;

    let (status, body) = server.chat(json!({"message": "Hello"})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["kind"], "spawn_failure");

    server.stop().await;
}

#[tokio::test]
async fn test_chat_timeout() {
    let server = TestServer::with_script("slow").await;

    let (status, body) = server
        .chat(json!({"message": "Hello", "options": {"timeoutMs": 150}}))
        .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"]["kind"], "timeout");

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_route() {
    let server = TestServer::with_script("success").await;

    let response = reqwest::get(server.url("/api/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"error": {"kind": "not_found", "message": "Not Found"}})
    );

    server.stop().await;
}

#[tokio::test]
async fn test_cors_allowed_origins() {
    let server = TestServer::with_script("success").await;
    let client = reqwest::Client::new();

    for origin in ["http://localhost:5173", "https://chat.example.com"] {
        let response = client
            .request(reqwest::Method::OPTIONS, server.url("/api/chat"))
            .header("origin", origin)
            .header("access-control-request-method", "POST")
            .send()
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some(origin)
        );
    }

    let response = client
        .get(server.url("/api/health"))
        .header("origin", "https://evil.example.com")
        .send()
        .await
        .unwrap();
    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_chat() {
    let server = TestServer::with_script("slow").await;

    let request = {
        let url = server.url("/api/chat");
        tokio::spawn(async move {
            reqwest::Client::new()
                .post(url)
                .json(&json!({"message": "Hello"}))
                .send()
                .await
        })
    };

    // Let the request reach the messenger
    tokio::time::sleep(Duration::from_millis(300)).await;
    server.shutdown.cancel();

    let response = tokio::time::timeout(Duration::from_secs(5), request)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "cancelled");

    let result = tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
