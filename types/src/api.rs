//! REST API request and response types.

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

#[cfg(feature = "validation")]
use garde::Validate;

// ============================================================================
// Health
// ============================================================================

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct HealthResponse {
    pub ok: bool,
}

// ============================================================================
// Chat API Types
// ============================================================================

/// A free-text question about the profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct ChatRequest {
    #[serde(default)]
    #[cfg_attr(feature = "validation", garde(skip))]
    pub question: String,
}

/// Generated answer to a [`ChatRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ChatResponse {
    pub answer: String,
}

// ============================================================================
// Email API Types
// ============================================================================

/// Request to send a plain-text email.
///
/// Missing fields deserialize as empty strings so that they are reported by
/// validation rather than as a malformed body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct SendEmailRequest {
    /// Recipient address
    #[serde(default)]
    #[cfg_attr(feature = "validation", garde(email))]
    pub recipient: String,
    #[serde(default)]
    #[cfg_attr(feature = "validation", garde(length(min = 1)))]
    pub subject: String,
    /// Plain-text body
    #[serde(default)]
    #[cfg_attr(feature = "validation", garde(length(min = 1)))]
    pub body: String,
}

/// Successful delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SendEmailResponse {
    pub ok: bool,
    /// Message-ID assigned to the sent email
    pub message_id: String,
    /// Final response line from the mail server
    pub response: String,
}

/// Failed delivery or rejected request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SendEmailFailure {
    pub ok: bool,
    pub error: String,
}

impl SendEmailFailure {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Generic error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
