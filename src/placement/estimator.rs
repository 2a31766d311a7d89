//! Fast token estimation without external dependencies.
//!
//! Uses character-based heuristics with a fixed per-message overhead.
//! Counts are approximate on purpose: the placement engine only compares
//! estimates against thresholds and against each other, so internal
//! consistency matters, not tokenizer accuracy. The same estimator must be
//! used for every number compared within one placement call.

use crate::message::{ContentPart, Message};

/// Characters per token ratio, optimized for code-heavy content.
/// Natural language is typically ~4.0, code is ~3.0-3.5.
const CHARS_PER_TOKEN: f32 = 3.4;

/// Overhead tokens per message for role and formatting.
const MESSAGE_OVERHEAD: u32 = 4;

/// Typical token cost of an image reference.
const IMAGE_TOKENS: u32 = 85;

/// Estimate token count for a text string.
#[inline]
pub fn estimate_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }
    (text.len() as f32 / CHARS_PER_TOKEN).ceil() as u32
}

/// Estimate token count for a single message.
pub fn estimate_message_tokens(message: &Message) -> u32 {
    let content_tokens: u32 = message.content.iter().map(estimate_part_tokens).sum();
    content_tokens + MESSAGE_OVERHEAD
}

/// Estimate token count for a sequence of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> u32 {
    messages.iter().map(estimate_message_tokens).sum()
}

fn estimate_part_tokens(part: &ContentPart) -> u32 {
    match part {
        ContentPart::Text { text } => estimate_tokens(text),
        ContentPart::ToolUse { name, input } => {
            // Tool name + arguments (usually JSON)
            estimate_tokens(name) + estimate_tokens(&input.to_string())
        }
        ContentPart::ToolResult { content } => estimate_tokens(content),
        ContentPart::Image { .. } => IMAGE_TOKENS,
    }
}
