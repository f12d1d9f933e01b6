//! Plain REST handlers for the profile Q&A and email features.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use cv_mcp_types::api::{
    ChatRequest, ChatResponse, ErrorResponse, SendEmailFailure, SendEmailRequest,
    SendEmailResponse,
};
use garde::Validate;
use tracing::{error, info};
use utoipa;

use crate::answer;
use crate::state::AppState;

/// Answer a question about the profile.
#[utoipa::path(
    post,
    path = "/rest/chat",
    tag = "profile",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Answer to the question", body = ChatResponse),
        (status = 400, description = "Missing question", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    let question = match payload {
        Ok(Json(req)) if !req.question.trim().is_empty() => req.question,
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Missing question")),
            ))
        }
    };

    let answer = answer::answer(state.profile(), &question);
    info!("Answered chat question as {:?}", answer.topic);
    Ok(Json(ChatResponse {
        answer: answer.text,
    }))
}

/// Send an email through the configured SMTP server.
#[utoipa::path(
    post,
    path = "/rest/send-email",
    tag = "email",
    request_body = SendEmailRequest,
    responses(
        (status = 200, description = "Email sent", body = SendEmailResponse),
        (status = 400, description = "Invalid email request", body = SendEmailFailure),
        (status = 500, description = "Delivery failed", body = SendEmailFailure)
    )
)]
pub async fn send_email(
    State(state): State<AppState>,
    payload: Result<Json<SendEmailRequest>, JsonRejection>,
) -> Result<Json<SendEmailResponse>, (StatusCode, Json<SendEmailFailure>)> {
    let email = match payload {
        Ok(Json(email)) => email,
        Err(rejection) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(SendEmailFailure::new(rejection.body_text())),
            ))
        }
    };

    if let Err(report) = email.validate() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(SendEmailFailure::new(report.to_string().trim())),
        ));
    }

    info!("Sending email to {}", email.recipient);
    match state.mailer().send(&email).await {
        Ok(receipt) => Ok(Json(SendEmailResponse {
            ok: true,
            message_id: receipt.message_id,
            response: receipt.response,
        })),
        Err(e) => {
            error!("Failed to send email to {}: {}", email.recipient, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SendEmailFailure::new(e.to_string())),
            ))
        }
    }
}
