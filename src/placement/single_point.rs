//! Single-breakpoint placement.
//!
//! Spends at most one breakpoint per request: on the system prompt when it
//! qualifies, otherwise at the last user turn of the conversation. The
//! placement is recomputed on every call, so the breakpoint follows the
//! conversation tail as it grows.

use super::annotator::{annotate_system, insert_markers};
use super::estimator::estimate_tokens;
use super::policy::{PlacementError, PlacementPolicy};
use super::types::{CacheResult, CacheStrategyConfig, Placement, PlacementState};
use crate::message::Message;

/// A policy that marks the single largest stable prefix of the request.
#[derive(Debug, Clone, Default)]
pub struct SinglePointPolicy;

impl SinglePointPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl PlacementPolicy for SinglePointPolicy {
    fn place(&self, config: CacheStrategyConfig) -> Result<CacheResult, PlacementError> {
        if !config.cache_enabled()
            || config.messages.is_empty()
            || config.capabilities.max_breakpoints == 0
        {
            return Ok(CacheResult::unannotated(config));
        }

        let capabilities = &config.capabilities;
        let segments = capabilities.cacheable_segments;
        let mut placements = Vec::with_capacity(1);

        // The system prompt wins the single slot when it qualifies.
        if segments.system {
            if let Some(system) = config.system_prompt.as_deref() {
                let tokens = estimate_tokens(system);
                if !system.is_empty() && self.meets_threshold(tokens, capabilities) {
                    placements.push(Placement::system(tokens));
                }
            }
        }

        if placements.is_empty() && segments.messages {
            if let Some(index) = config.messages.iter().rposition(Message::is_user) {
                let tokens = self.sum_tokens(&config.messages, 0, index + 1);
                if self.meets_threshold(tokens, capabilities) {
                    placements.push(Placement::message(index, tokens));
                }
            }
        }

        let new_state = PlacementState {
            placements: placements.clone(),
        };
        let annotated_system = annotate_system(config.system_prompt, &placements);
        let annotated_messages = insert_markers(config.messages, &placements);

        Ok(CacheResult {
            annotated_system,
            annotated_messages,
            new_state,
        })
    }
}
