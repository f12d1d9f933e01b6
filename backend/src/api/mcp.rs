//! MCP Streamable HTTP endpoint handlers.
//!
//! ## Endpoints
//!
//! - `POST /mcp` - Send a JSON-RPC message (JSON response, or 202 for notifications)
//! - `GET /mcp` - 405, server-initiated streams are not offered
//! - `DELETE /mcp` - Terminate a session

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::mcp::protocol::{error_codes, JsonRpcRequest, JsonRpcResponse};
use crate::mcp::{RoutingError, SESSION_ID_HEADER};
use crate::state::AppState;

/// Extract session ID from headers.
fn get_session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_ID_HEADER)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

fn rpc_error(status: StatusCode, id: Option<Value>, code: i32, message: impl Into<String>) -> Response {
    (status, Json(JsonRpcResponse::error(id, code, message))).into_response()
}

/// Decode a single JSON-RPC message, or build the 400 response explaining why not.
#[allow(clippy::result_large_err)]
fn decode_message(body: &[u8]) -> Result<JsonRpcRequest, Response> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        rpc_error(
            StatusCode::BAD_REQUEST,
            None,
            error_codes::PARSE_ERROR,
            format!("Parse error: {}", e),
        )
    })?;

    let id = match &value {
        Value::Object(map) => map.get("id").cloned(),
        Value::Array(_) => {
            return Err(rpc_error(
                StatusCode::BAD_REQUEST,
                None,
                error_codes::INVALID_REQUEST,
                "Batch requests are not supported",
            ))
        }
        _ => {
            return Err(rpc_error(
                StatusCode::BAD_REQUEST,
                None,
                error_codes::INVALID_REQUEST,
                "Invalid Request: expected a JSON-RPC object",
            ))
        }
    };

    let request: JsonRpcRequest = serde_json::from_value(value).map_err(|e| {
        rpc_error(
            StatusCode::BAD_REQUEST,
            id.clone(),
            error_codes::INVALID_REQUEST,
            format!("Invalid Request: {}", e),
        )
    })?;

    if request.jsonrpc != "2.0" {
        return Err(rpc_error(
            StatusCode::BAD_REQUEST,
            id,
            error_codes::INVALID_REQUEST,
            "Invalid Request: jsonrpc must be \"2.0\"",
        ));
    }
    Ok(request)
}

/// POST /mcp - Handle one JSON-RPC message.
///
/// A header-less `initialize` opens a session whose ID is returned in the
/// `Mcp-Session-Id` header; every other message must carry that header.
pub async fn mcp_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request = match decode_message(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let session_id = get_session_id(&headers);
    debug!(
        "MCP POST: method={}, session={:?}",
        request.method, session_id
    );

    let id = request.id.clone();
    match state.sessions().route(session_id.as_deref(), request).await {
        Ok(routed) => {
            let Some(response) = routed.response else {
                return StatusCode::ACCEPTED.into_response();
            };
            let mut resp = (StatusCode::OK, Json(response)).into_response();
            if let Some(sid) = routed.created_session {
                if let Ok(hv) = HeaderValue::from_str(&sid) {
                    resp.headers_mut()
                        .insert(HeaderName::from_static(SESSION_ID_HEADER), hv);
                    resp.headers_mut().insert(
                        header::ACCESS_CONTROL_EXPOSE_HEADERS,
                        HeaderValue::from_static(SESSION_ID_HEADER),
                    );
                }
            }
            resp
        }
        Err(e @ RoutingError::UnknownSession(_)) => {
            warn!("MCP: {}", e);
            rpc_error(
                StatusCode::NOT_FOUND,
                id,
                error_codes::SESSION_NOT_FOUND,
                e.to_string(),
            )
        }
        Err(e @ RoutingError::SessionRequired) => rpc_error(
            StatusCode::BAD_REQUEST,
            id,
            error_codes::SESSION_REQUIRED,
            e.to_string(),
        ),
        Err(e @ RoutingError::Store(_)) => {
            error!("MCP: {}", e);
            rpc_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                id,
                error_codes::INTERNAL_ERROR,
                e.to_string(),
            )
        }
    }
}

/// GET /mcp - Server-initiated streams are not supported.
pub async fn mcp_get() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST, DELETE")],
    )
        .into_response()
}

/// DELETE /mcp - Terminate a session.
///
/// Always answers 204, whether or not the session existed.
pub async fn mcp_delete(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    let session_id = get_session_id(&headers);
    state.sessions().teardown(session_id.as_deref()).await;
    StatusCode::NO_CONTENT
}
