//! Core contract shared by placement policies.

use thiserror::Error;

use super::estimator::estimate_messages_tokens;
use super::types::{CacheResult, CacheStrategyConfig, ModelCapabilities};
use crate::message::Message;

#[derive(Error, Debug)]
pub enum PlacementError {
    #[error("token estimation failed: {0}")]
    EstimationFailed(String),
    #[error("invalid placement state: {0}")]
    InvalidState(String),
}

/// Trait for pluggable cache breakpoint placement policies.
///
/// Implementations decide where breakpoints go within the configured
/// budget. Disabled caching, degenerate input and candidate ranges with no
/// usable boundary are ordinary results, not errors; a conforming policy
/// should never be the reason a request fails.
pub trait PlacementPolicy: Send + Sync {
    /// Compute breakpoint placements and the annotated output for one call.
    ///
    /// Returns the original content unannotated, with an empty state, when
    /// the model cannot cache, the request disables caching, or there is
    /// nothing to place breakpoints on.
    fn place(&self, config: CacheStrategyConfig) -> Result<CacheResult, PlacementError>;

    /// Check whether a segment is large enough to spend a breakpoint on.
    ///
    /// A zero threshold makes every segment eligible.
    fn meets_threshold(&self, tokens: u32, capabilities: &ModelCapabilities) -> bool {
        tokens >= capabilities.min_tokens_per_breakpoint
    }

    /// Estimated tokens covered by `messages[from..to]`.
    fn sum_tokens(&self, messages: &[Message], from: usize, to: usize) -> u32 {
        let to = to.min(messages.len());
        if from >= to {
            return 0;
        }
        estimate_messages_tokens(&messages[from..to])
    }
}
