//! Per-request reply surface handed to intent handlers.

use covid_shared::{FulfillmentError, WebhookRequest, WebhookResponse};
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Exposes the extracted parameters of one webhook event and collects the
/// messages that make up the reply.
#[derive(Debug)]
pub struct WebhookAgent {
    request: WebhookRequest,
    messages: Vec<String>,
}

impl WebhookAgent {
    pub fn new(request: WebhookRequest) -> Self {
        Self {
            request,
            messages: Vec::new(),
        }
    }

    /// Intent display name
    pub fn intent(&self) -> &str {
        self.request.intent_name()
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.request.query_result.parameters
    }

    /// Non-empty string parameter
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.request.query_result.parameter_str(name)
    }

    /// Fulfillment messages configured on the intent, exactly as received
    pub fn console_messages(&self) -> &[Value] {
        self.request
            .query_result
            .fulfillment_messages
            .as_deref()
            .unwrap_or(&[])
    }

    pub fn session(&self) -> Option<&str> {
        self.request.session.as_deref()
    }

    pub fn add(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn into_response(self) -> WebhookResponse {
        WebhookResponse::from_messages(self.messages)
    }
}

/// What an intent handler produced.
#[derive(Debug)]
pub enum IntentOutcome {
    /// A reply for the user
    Reply(String),
    /// Handled, but nothing to say
    Silent,
    /// Failed; the apology is shown, the reason only logged
    Apology {
        message: String,
        reason: FulfillmentError,
    },
}

impl IntentOutcome {
    pub fn apology(message: String, reason: FulfillmentError) -> Self {
        IntentOutcome::Apology { message, reason }
    }

    /// Add the outcome to the reply
    pub fn apply(self, agent: &mut WebhookAgent) {
        match self {
            IntentOutcome::Reply(message) => {
                info!("response: {}", message);
                agent.add(message);
            }
            IntentOutcome::Silent => {
                info!("No reply for intent {}", agent.intent());
            }
            IntentOutcome::Apology { message, reason } => {
                if reason.is_no_data() {
                    info!("[{}] {}: {}", reason.code(), agent.intent(), reason);
                } else {
                    warn!("[{}] {}: {}", reason.code(), agent.intent(), reason);
                }
                agent.add(message);
            }
        }
    }
}
