//! Webhook wire types for the conversational agent (Dialogflow v2 format).
//!
//! Only the fields this service reads are modeled; unknown fields are ignored
//! on input and omitted on output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound webhook event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    pub query_result: QueryResult,
}

/// The recognized intent and its extracted parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub intent: Intent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfillment_messages: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

impl WebhookRequest {
    pub fn intent_name(&self) -> &str {
        &self.query_result.intent.display_name
    }
}

impl QueryResult {
    /// Non-empty string value of a parameter.
    ///
    /// The agent sends unfilled optional parameters as `""`, which is treated
    /// the same as an absent key.
    pub fn parameter_str(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Outbound webhook response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfillment_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fulfillment_messages: Vec<TextMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// `{"text": {"text": ["..."]}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessage {
    pub text: TextBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBody {
    pub text: Vec<String>,
}

impl TextMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            text: TextBody {
                text: vec![message.into()],
            },
        }
    }
}

impl WebhookResponse {
    /// Build a response from the messages added while handling an intent.
    /// The first message doubles as `fulfillmentText`.
    pub fn from_messages(messages: Vec<String>) -> Self {
        Self {
            fulfillment_text: messages.first().cloned(),
            fulfillment_messages: messages.into_iter().map(TextMessage::new).collect(),
            source: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fulfillment_text.is_none() && self.fulfillment_messages.is_empty()
    }

    /// All text lines in order.
    pub fn texts(&self) -> Vec<&str> {
        self.fulfillment_messages
            .iter()
            .flat_map(|m| m.text.text.iter().map(String::as_str))
            .collect()
    }
}
