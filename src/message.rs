//! Canonical conversation message model consumed by the placement engine.
//!
//! This is the already-normalized representation the engine reads. Turning
//! it into a concrete provider wire format is the transport layer's job;
//! the engine only inspects roles and estimates content size.

use serde::{Deserialize, Serialize};

/// Role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single piece of message content.
///
/// Text is the common case; the other variants cover the structured parts
/// that show up in tool-using conversations and contribute to the token
/// estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ToolUse { name: String, input: serde_json::Value },
    ToolResult { content: String },
    Image { media_type: String },
}

impl ContentPart {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// An ordered unit of conversation history.
///
/// Owned by the caller; the engine consumes its input by value and returns
/// an annotated copy rather than mutating anything in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl Message {
    /// Create a user message with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentPart::text(text)],
        }
    }

    /// Create an assistant message with a single text part.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentPart::text(text)],
        }
    }

    /// Create a message with explicit structured content.
    pub fn with_parts(role: Role, content: Vec<ContentPart>) -> Self {
        Self { role, content }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}
