//! OpenAPI documentation configuration.

use cv_mcp_types::api::{
    ChatRequest, ChatResponse, ErrorResponse, HealthResponse, SendEmailFailure,
    SendEmailRequest, SendEmailResponse,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::health,
        crate::api::rest::chat,
        crate::api::rest::send_email,
    ),
    components(
        schemas(
            HealthResponse,
            ChatRequest,
            ChatResponse,
            SendEmailRequest,
            SendEmailResponse,
            SendEmailFailure,
            ErrorResponse,
        )
    ),
    tags(
        (name = "profile", description = "Questions about the loaded CV"),
        (name = "email", description = "Outbound email"),
        (name = "System", description = "System information endpoints")
    ),
    info(
        title = "cv-mcp API",
        version = "0.1.0",
        description = "REST companion to the MCP endpoint: CV Q&A and email delivery",
        license(
            name = "MIT OR Apache-2.0"
        )
    )
)]
pub struct ApiDoc;
