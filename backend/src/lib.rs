//! cv-mcp backend library.
//!
//! This module exposes the application builder for use in tests.

use axum::http::HeaderValue;
use axum::http::{header, HeaderName, Method};
use axum::{routing::get, routing::post, Json, Router};
use cv_mcp_types::HealthResponse;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod answer;
pub mod api;
pub mod config;
pub mod email;
pub mod mcp;
pub mod openapi;
pub mod profile;
pub mod state;

use state::AppState;

/// Create the Axum application router, allowing any CORS origin.
///
/// This function is used both by the main server binary and by integration tests.
pub fn create_app(state: AppState) -> Router {
    create_app_with_config(state, Vec::new())
}

/// Create the Axum application router with the given CORS origins.
///
/// If `cors_allowed_origins` is empty, any origin is allowed.
/// Otherwise, only the specified origins are allowed.
pub fn create_app_with_config(state: AppState, cors_allowed_origins: Vec<String>) -> Router {
    let session_header = HeaderName::from_static(mcp::SESSION_ID_HEADER);

    // MCP Streamable HTTP endpoint (sessions keyed by Mcp-Session-Id)
    let mcp_router = Router::new().route(
        "/mcp",
        post(api::mcp::mcp_post)
            .get(api::mcp::mcp_get)
            .delete(api::mcp::mcp_delete),
    );

    let rest_router = Router::new()
        .route("/chat", post(api::rest::chat))
        .route("/send-email", post(api::rest::send_email));

    let cors = {
        let cors = CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT, session_header.clone()])
            .expose_headers([session_header]);

        if cors_allowed_origins.is_empty() {
            cors.allow_origin(Any)
        } else {
            let origins: Vec<HeaderValue> = cors_allowed_origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok())
                .collect();
            cors.allow_origin(origins)
        }
    };

    Router::new()
        .route("/health", get(health))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
        .merge(mcp_router)
        .nest("/rest", rest_router)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}
