//! The capabilities this server registers: the profile resource, the
//! question-answering and email tools, and the last-role prompt.

use async_trait::async_trait;
use cv_mcp_types::{ChatRequest, Profile, SendEmailRequest};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::registry::{
    parse_arguments, CapabilityError, CapabilityRegistry, PromptEntry, PromptMessage,
    ResourceEntry, ServerInfo, ToolEntry, ToolHandler, ToolOutput,
};
use crate::answer;
use crate::email::EmailSender;
use crate::profile;

pub const SERVER_NAME: &str = "cv-email-mcp";
pub const PROFILE_RESOURCE_URI: &str = "profile://me";
pub const ANSWER_QUESTION_TOOL: &str = "answer-question";
pub const SEND_EMAIL_TOOL: &str = "send-email";
pub const LAST_ROLE_PROMPT: &str = "ask-about-last-role";
pub const LAST_ROLE_QUESTION: &str = "What role did I have at my last position?";

/// Build the registry served to every MCP session.
pub fn build_registry(profile: Arc<Profile>, mailer: Arc<dyn EmailSender>) -> CapabilityRegistry {
    let instructions = match &profile.name {
        Some(name) => format!(
            "Answers questions about {}'s CV and sends email on their behalf.",
            name
        ),
        None => "Answers questions about the CV and sends email.".to_string(),
    };

    let reader_profile = profile.clone();
    CapabilityRegistry::new(ServerInfo {
        name: SERVER_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        instructions: Some(instructions),
    })
    .with_resource(ResourceEntry::new(
        PROFILE_RESOURCE_URI,
        "profile",
        "Candidate CV",
        "Parsed CV data for Q&A",
        "application/json",
        Arc::new(move || -> Result<String, CapabilityError> {
            Ok(profile::to_document(&reader_profile)?)
        }),
    ))
    .with_tool(ToolEntry::new(
        ANSWER_QUESTION_TOOL,
        "Chat About CV",
        "Answer a question about the CV",
        json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "User question about the CV"
                }
            },
            "required": ["question"]
        }),
        AnswerQuestion { profile },
    ))
    .with_tool(ToolEntry::new(
        SEND_EMAIL_TOOL,
        "Send Email",
        "Send an email using SMTP",
        json!({
            "type": "object",
            "properties": {
                "recipient": {
                    "type": "string",
                    "format": "email",
                    "description": "Email recipient"
                },
                "subject": { "type": "string", "minLength": 1 },
                "body": { "type": "string", "minLength": 1 }
            },
            "required": ["recipient", "subject", "body"]
        }),
        SendEmail { mailer },
    ))
    .with_prompt(PromptEntry::new(
        LAST_ROLE_PROMPT,
        "Ask About Last Role",
        "Prompt template to ask about last position",
        || {
            vec![PromptMessage {
                role: "user",
                text: LAST_ROLE_QUESTION.to_string(),
            }]
        },
    ))
}

struct AnswerQuestion {
    profile: Arc<Profile>,
}

#[async_trait]
impl ToolHandler for AnswerQuestion {
    async fn call(&self, arguments: Option<Value>) -> Result<ToolOutput, CapabilityError> {
        let args: ChatRequest = parse_arguments(arguments)?;
        let answer = answer::answer(&self.profile, &args.question);
        info!("MCP: Answered question as {:?}", answer.topic);
        Ok(ToolOutput::text(answer.text))
    }
}

struct SendEmail {
    mailer: Arc<dyn EmailSender>,
}

#[async_trait]
impl ToolHandler for SendEmail {
    async fn call(&self, arguments: Option<Value>) -> Result<ToolOutput, CapabilityError> {
        let email: SendEmailRequest = parse_arguments(arguments)?;
        info!("MCP: Sending email to {}", email.recipient);
        match self.mailer.send(&email).await {
            Ok(receipt) => Ok(ToolOutput::text(format!(
                "Sent email {}: {}",
                receipt.message_id, receipt.response
            ))),
            Err(e) => {
                warn!("MCP: send-email failed: {}", e);
                Err(CapabilityError::Delegate(e.to_string()))
            }
        }
    }
}
