//! Mechanical application of placements to a message sequence.
//!
//! No decision logic lives here: given a final placement list, wrap each
//! message and the system prompt, attaching markers at the chosen
//! positions.

use std::collections::HashSet;

use super::types::{AnnotatedMessage, AnnotatedText, CacheMarker, Placement, PlacementKind};
use crate::message::Message;

/// Insert markers after the messages named by `placements`.
pub fn insert_markers(messages: Vec<Message>, placements: &[Placement]) -> Vec<AnnotatedMessage> {
    let indices: HashSet<usize> = placements
        .iter()
        .filter(|p| p.kind == PlacementKind::Message)
        .map(|p| p.index)
        .collect();

    messages
        .into_iter()
        .enumerate()
        .map(|(index, message)| AnnotatedMessage {
            message,
            marker: indices.contains(&index).then(CacheMarker::ephemeral),
        })
        .collect()
}

/// Wrap the system prompt, marking it when a system placement exists.
pub fn annotate_system(
    system_prompt: Option<String>,
    placements: &[Placement],
) -> Option<AnnotatedText> {
    let placed = placements.iter().any(|p| p.kind == PlacementKind::System);
    system_prompt.map(|text| AnnotatedText {
        text,
        marker: placed.then(CacheMarker::ephemeral),
    })
}
