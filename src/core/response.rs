//! Response shapes a chat model may hand back, and how to get plain text out
//! of each of them.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistantMessage {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Generation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<AssistantMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatResponse {
    /// A message object with a direct text field.
    Message(AssistantMessage),
    /// A JSON object, usually the raw message of a completion.
    Mapping(Map<String, Value>),
    /// One list of generations per submitted message list.
    Generations(Vec<Vec<Generation>>),
    /// Anything else.
    Raw(Value),
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        ChatResponse::Message(AssistantMessage {
            content: content.into(),
        })
    }

    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => ChatResponse::Mapping(map),
            other => ChatResponse::Raw(other),
        }
    }
}

impl fmt::Display for ChatResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatResponse::Message(message) => {
                write!(f, "{}", serde_json::json!({ "content": message.content }))
            }
            ChatResponse::Mapping(map) => write!(f, "{}", Value::Object(map.clone())),
            ChatResponse::Generations(batches) => {
                write!(f, "{}", serde_json::json!({ "generations": batches }))
            }
            ChatResponse::Raw(value) => write!(f, "{value}"),
        }
    }
}

/// Plain text of a response. Shapes are checked in order: direct text field,
/// `"content"` key of a mapping, first generation of the first batch
/// (message content, then text). Anything unrecognised comes back as the
/// response's string form.
pub fn extract_text(response: &ChatResponse) -> String {
    let extracted = match response {
        ChatResponse::Message(message) => Some(message.content.clone()),
        ChatResponse::Mapping(map) => map
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string),
        ChatResponse::Generations(batches) => batches
            .first()
            .and_then(|batch| batch.first())
            .and_then(|generation| {
                generation
                    .message
                    .as_ref()
                    .map(|message| message.content.clone())
                    .or_else(|| generation.text.clone())
            }),
        ChatResponse::Raw(_) => None,
    };

    extracted.unwrap_or_else(|| response.to_string())
}
