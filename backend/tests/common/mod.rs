//! Shared helpers for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use cv_mcp::email::{EmailError, EmailReceipt, EmailSender};
use cv_mcp::{create_app, profile, state::AppState};
use cv_mcp_types::SendEmailRequest;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Mailer that records what it is asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SendEmailRequest>>,
    /// When set, every send fails with this SMTP-style message
    pub fail_with: Option<String>,
}

impl RecordingMailer {
    pub fn failing(message: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, email: &SendEmailRequest) -> Result<EmailReceipt, EmailError> {
        self.sent.lock().push(email.clone());
        match &self.fail_with {
            Some(message) => Err(EmailError::ConnectionRejected(message.clone())),
            None => Ok(EmailReceipt {
                message_id: "<test-1@example.com>".to_string(),
                response: "250 2.0.0 OK queued".to_string(),
            }),
        }
    }
}

/// App backed by the bundled profile and the given mailer.
pub fn test_app(mailer: Arc<RecordingMailer>) -> Router {
    let profile = profile::load(None).unwrap();
    create_app(AppState::new(profile, mailer))
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}
