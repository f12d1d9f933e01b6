//! Shared types for the cv-mcp server.
//!
//! This crate contains the profile document model and the REST API
//! request/response types shared by the server and its clients.

/// Default port for the cv-mcp server.
pub const DEFAULT_PORT: u16 = 8787;

pub mod api;
pub mod profile;

// Re-export commonly used types
pub use api::{
    ChatRequest, ChatResponse, ErrorResponse, HealthResponse, SendEmailFailure, SendEmailRequest,
    SendEmailResponse,
};
pub use profile::{Experience, Profile};
