//! Multi-breakpoint placement across a growing conversation.
//!
//! This is the primary policy. On a fresh conversation it scans message
//! boundaries greedily from the start; on later turns it chooses between
//! preserving the existing breakpoints, extending with a spare budget
//! slot, and reallocating the least valuable pair once the new tail has
//! outgrown the hysteresis margin.

use tracing::{debug, warn};

use super::annotator::{annotate_system, insert_markers};
use super::estimator::{estimate_message_tokens, estimate_tokens};
use super::policy::{PlacementError, PlacementPolicy};
use super::types::{
    CacheResult, CacheStrategyConfig, ModelCapabilities, Placement, PlacementState,
};
use crate::message::Message;

/// Multiplier the new tail must reach, relative to the smallest combined
/// span, before an existing pair of breakpoints is sacrificed. Keeps small
/// turn-to-turn fluctuations from thrashing breakpoints that still produce
/// cache hits.
pub const DEFAULT_REALLOCATION_MARGIN: f32 = 1.2;

/// A policy that spreads up to `max_breakpoints` markers over the
/// conversation and revises them conservatively as it grows.
///
/// Breakpoints only ever land on user turns, the stable boundary the
/// provider recognizes across requests. Previous placements are kept
/// unchanged whenever possible so that already-cached history keeps
/// producing hits.
///
/// # Example
/// ```ignore
/// use cachepoint::{CacheStrategyConfig, MultiPointPolicy, PlacementPolicy};
///
/// let policy = MultiPointPolicy::new();
/// let result = policy.place(config)?;
/// // persist result.new_state for the next turn of this conversation
/// ```
#[derive(Debug, Clone)]
pub struct MultiPointPolicy {
    /// Growth factor gating reallocation of a saturated budget.
    reallocation_margin: f32,
}

impl MultiPointPolicy {
    pub fn new() -> Self {
        Self {
            reallocation_margin: DEFAULT_REALLOCATION_MARGIN,
        }
    }

    /// Override the reallocation margin.
    ///
    /// Values below 1.0 are clamped: reallocating for a tail smaller than
    /// the span it destroys can never pay for the lost cache hits.
    pub fn with_reallocation_margin(mut self, margin: f32) -> Self {
        self.reallocation_margin = margin.max(1.0);
        self
    }

    /// Greedy left-to-right scan for a conversation with no placement
    /// history. Emits a breakpoint at each user turn where the tokens
    /// accumulated since the previous breakpoint meet the threshold.
    fn place_fresh(
        &self,
        messages: &[Message],
        capabilities: &ModelCapabilities,
        budget: u32,
    ) -> Vec<Placement> {
        let mut placements = Vec::new();
        let mut accumulated = 0u32;

        for (index, message) in messages.iter().enumerate() {
            if placements.len() as u32 >= budget {
                break;
            }
            accumulated += estimate_message_tokens(message);
            if message.is_user() && self.meets_threshold(accumulated, capabilities) {
                placements.push(Placement::message(index, accumulated));
                accumulated = 0;
            }
        }

        placements
    }

    /// One breakpoint covering `messages[start..]`, placed at the last user
    /// turn of the range. `None` when the range has no user turn or the
    /// segment up to it falls below the threshold.
    fn place_tail(
        &self,
        messages: &[Message],
        capabilities: &ModelCapabilities,
        start: usize,
    ) -> Option<Placement> {
        if start >= messages.len() {
            return None;
        }
        let offset = messages[start..].iter().rposition(Message::is_user)?;
        let index = start + offset;
        let tokens = self.sum_tokens(messages, start, index + 1);
        self.meets_threshold(tokens, capabilities)
            .then(|| Placement::message(index, tokens))
    }

    /// Revise existing placements for a conversation that has grown.
    fn place_growing(
        &self,
        messages: &[Message],
        capabilities: &ModelCapabilities,
        budget: u32,
        previous: &[Placement],
    ) -> Vec<Placement> {
        let last_index = previous.last().map(|p| p.index).unwrap_or(0);
        let new_tokens = self.sum_tokens(messages, last_index + 1, messages.len());

        if !self.meets_threshold(new_tokens, capabilities) {
            debug!(new_tokens, "tail below threshold, preserving placements");
            return previous.to_vec();
        }

        if budget as usize > previous.len() {
            // Spare budget: keep history intact and spend one new slot.
            let mut placements = previous.to_vec();
            if let Some(placement) = self.place_tail(messages, capabilities, last_index + 1) {
                debug!(
                    index = placement.index,
                    tokens = placement.tokens_covered,
                    "extending with spare budget"
                );
                placements.push(placement);
            }
            return placements;
        }

        // Budget saturated: reallocate only when the new tail outweighs the
        // least valuable adjacent pair by the hysteresis margin.
        let Some((gap_index, gap_tokens)) = smallest_gap(previous) else {
            debug!("no adjacent pair to combine, preserving placements");
            return previous.to_vec();
        };

        if (new_tokens as f32) < (gap_tokens as f32) * self.reallocation_margin {
            debug!(
                new_tokens,
                gap_tokens, "tail within hysteresis margin, preserving placements"
            );
            return previous.to_vec();
        }

        let Some(tail) = self.place_tail(messages, capabilities, last_index + 1) else {
            debug!("no user boundary in tail, preserving placements");
            return previous.to_vec();
        };

        debug!(new_tokens, gap_tokens, "reallocating smallest pair to the tail");
        let mut placements = Vec::with_capacity(previous.len());
        for (i, placement) in previous.iter().enumerate() {
            if i == gap_index {
                continue;
            }
            if i == gap_index + 1 {
                // The merged placement ends where the second of the pair
                // ended and covers both spans.
                placements.push(Placement::message(placement.index, gap_tokens));
                continue;
            }
            placements.push(*placement);
        }
        placements.push(tail);
        placements
    }
}

impl Default for MultiPointPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl PlacementPolicy for MultiPointPolicy {
    fn place(&self, config: CacheStrategyConfig) -> Result<CacheResult, PlacementError> {
        if !config.cache_enabled()
            || config.messages.is_empty()
            || config.capabilities.max_breakpoints == 0
        {
            return Ok(CacheResult::unannotated(config));
        }

        let capabilities = &config.capabilities;
        let segments = capabilities.cacheable_segments;
        let mut budget = capabilities.max_breakpoints;
        let mut placements: Vec<Placement> = Vec::new();

        // System segment first: one slot when the prompt is worth caching.
        if segments.system && budget > 0 {
            if let Some(system) = config.system_prompt.as_deref() {
                let tokens = estimate_tokens(system);
                if !system.is_empty() && self.meets_threshold(tokens, capabilities) {
                    placements.push(Placement::system(tokens));
                    budget -= 1;
                }
            }
        }

        if segments.messages {
            let previous: Vec<Placement> = config
                .previous_state
                .message_placements()
                .copied()
                .collect();

            let message_placements = if previous.is_empty() {
                self.place_fresh(&config.messages, capabilities, budget)
            } else if previous.len() > budget as usize {
                // Capabilities changed between turns; the stored plan no
                // longer fits and preserving it would overrun the budget.
                warn!(
                    previous = previous.len(),
                    budget, "placement history exceeds current budget, replanning from scratch"
                );
                self.place_fresh(&config.messages, capabilities, budget)
            } else {
                self.place_growing(&config.messages, capabilities, budget, &previous)
            };
            placements.extend(message_placements);
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

/// Index and combined token span of the smallest adjacent placement pair.
fn smallest_gap(placements: &[Placement]) -> Option<(usize, u32)> {
    if placements.len() < 2 {
        return None;
    }
    placements
        .windows(2)
        .map(|pair| pair[0].tokens_covered + pair[1].tokens_covered)
        .enumerate()
        .min_by_key(|&(_, tokens)| tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::estimator::estimate_messages_tokens;
    use super::super::types::PlacementKind;

    fn user(chars: usize) -> Message {
        Message::user("u".repeat(chars))
    }

    fn assistant(chars: usize) -> Message {
        Message::assistant("a".repeat(chars))
    }

    fn config(messages: Vec<Message>, max_breakpoints: u32) -> CacheStrategyConfig {
        CacheStrategyConfig::new(ModelCapabilities::new(max_breakpoints, 100), messages)
    }

    #[test]
    fn test_fresh_small_conversation_places_nothing() {
        // Three messages well under the 100-token threshold.
        let result = MultiPointPolicy::new()
            .place(config(
                vec![user(60), assistant(60), user(50)],
                3,
            ))
            .unwrap();
        assert!(result.new_state.is_empty());
        assert!(result.annotated_messages.iter().all(|m| m.marker.is_none()));
    }

    #[test]
    fn test_fresh_spreads_breakpoints_over_user_turns() {
        // Six ~150-token messages; each assistant/user pair crosses the
        // threshold at the user turn.
        let messages = vec![
            assistant(500),
            user(500),
            assistant(500),
            user(500),
            assistant(500),
            user(500),
        ];
        let pair = estimate_messages_tokens(&messages[0..2]);

        let result = MultiPointPolicy::new().place(config(messages, 3)).unwrap();

        let placements = &result.new_state.placements;
        assert_eq!(placements.len(), 3);
        assert_eq!(
            placements.iter().map(|p| p.index).collect::<Vec<_>>(),
            vec![1, 3, 5]
        );
        assert!(placements.iter().all(|p| p.tokens_covered == pair));
    }

    #[test]
    fn test_fresh_never_places_on_assistant_turns() {
        let result = MultiPointPolicy::new()
            .place(config(vec![assistant(2000), assistant(2000)], 3))
            .unwrap();
        assert!(result.new_state.is_empty());
    }

    #[test]
    fn test_fresh_respects_budget() {
        let messages: Vec<Message> = (0..10)
            .flat_map(|_| vec![assistant(500), user(500)])
            .collect();
        let result = MultiPointPolicy::new().place(config(messages, 2)).unwrap();
        assert_eq!(result.new_state.placements.len(), 2);
    }

    #[test]
    fn test_system_prompt_reserves_a_slot() {
        let result = MultiPointPolicy::new()
            .place(
                config(vec![assistant(500), user(500)], 1)
                    .with_system_prompt("s".repeat(2000)),
            )
            .unwrap();

        // The only slot went to the system segment.
        let placements = &result.new_state.placements;
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].kind, PlacementKind::System);
        assert!(result.annotated_system.unwrap().marker.is_some());
        assert!(result.annotated_messages.iter().all(|m| m.marker.is_none()));
    }

    #[test]
    fn test_small_system_prompt_not_placed() {
        let result = MultiPointPolicy::new()
            .place(config(vec![assistant(500), user(500)], 3).with_system_prompt("be brief"))
            .unwrap();

        assert!(result
            .new_state
            .placements
            .iter()
            .all(|p| p.kind == PlacementKind::Message));
        assert!(result.annotated_system.unwrap().marker.is_none());
    }

    #[test]
    fn test_growth_below_threshold_preserves() {
        let messages = vec![assistant(500), user(500), assistant(100), user(50)];
        let previous = PlacementState {
            placements: vec![Placement::message(1, 304)],
        };

        let result = MultiPointPolicy::new()
            .place(config(messages, 3).with_previous_state(previous.clone()))
            .unwrap();

        assert_eq!(result.new_state, previous);
    }

    #[test]
    fn test_growth_with_spare_budget_extends() {
        let mut messages = vec![assistant(1000), user(1000)];
        let first = MultiPointPolicy::new()
            .place(config(messages.clone(), 3))
            .unwrap();
        let first_placement = first.new_state.placements[0];

        messages.push(assistant(600));
        messages.push(user(700));
        let tail = estimate_messages_tokens(&messages[2..4]);

        let result = MultiPointPolicy::new()
            .place(config(messages, 3).with_previous_state(first.new_state))
            .unwrap();

        let placements = &result.new_state.placements;
        assert_eq!(placements.len(), 2);
        // History untouched, one new breakpoint at the last user turn.
        assert_eq!(placements[0], first_placement);
        assert_eq!(placements[1], Placement::message(3, tail));
    }

    #[test]
    fn test_saturated_within_margin_preserves() {
        // Smallest adjacent pair spans 500 tokens; the ~390-token tail is
        // under the 600-token reallocation bar.
        let messages = vec![
            assistant(10),
            user(10),
            assistant(10),
            user(10),
            assistant(10),
            user(10),
            assistant(600),
            user(700),
        ];
        let previous = PlacementState {
            placements: vec![
                Placement::message(1, 300),
                Placement::message(3, 200),
                Placement::message(5, 300),
            ],
        };

        let result = MultiPointPolicy::new()
            .place(config(messages, 3).with_previous_state(previous.clone()))
            .unwrap();

        assert_eq!(result.new_state, previous);
    }

    #[test]
    fn test_saturated_past_margin_reallocates() {
        // Same layout, but the tail (~650 tokens) clears 500 * 1.2.
        let messages = vec![
            assistant(10),
            user(10),
            assistant(10),
            user(10),
            assistant(10),
            user(10),
            assistant(1000),
            user(1200),
        ];
        let tail = estimate_messages_tokens(&messages[6..8]);
        let previous = PlacementState {
            placements: vec![
                Placement::message(1, 300),
                Placement::message(3, 200),
                Placement::message(5, 300),
            ],
        };

        let result = MultiPointPolicy::new()
            .place(config(messages, 3).with_previous_state(previous))
            .unwrap();

        let placements = &result.new_state.placements;
        assert_eq!(placements.len(), 3);
        // The (1, 300)/(3, 200) pair collapsed into one combined placement.
        assert_eq!(placements[0], Placement::message(3, 500));
        assert_eq!(placements[1], Placement::message(5, 300));
        assert_eq!(placements[2], Placement::message(7, tail));
    }

    #[test]
    fn test_stale_state_larger_than_budget_replans() {
        let messages: Vec<Message> = (0..4)
            .flat_map(|_| vec![assistant(500), user(500)])
            .collect();
        let previous = PlacementState {
            placements: vec![
                Placement::message(1, 300),
                Placement::message(3, 300),
                Placement::message(5, 300),
            ],
        };

        let result = MultiPointPolicy::new()
            .place(config(messages, 2).with_previous_state(previous))
            .unwrap();

        assert_eq!(result.new_state.placements.len(), 2);
        assert_eq!(
            result
                .new_state
                .placements
                .iter()
                .map(|p| p.index)
                .collect::<Vec<_>>(),
            vec![1, 3]
        );
    }

    #[test]
    fn test_zero_threshold_is_always_eligible() {
        let messages = vec![user(10), assistant(10)];
        let result = MultiPointPolicy::new()
            .place(CacheStrategyConfig::new(
                ModelCapabilities::new(3, 0),
                messages,
            ))
            .unwrap();
        assert_eq!(result.new_state.placements, vec![Placement::message(
            0,
            estimate_message_tokens(&user(10)),
        )]);
    }

    #[test]
    fn test_raised_margin_defers_reallocation() {
        let messages = vec![user(10), user(10), assistant(1000), user(1200)];
        let previous = PlacementState {
            placements: vec![Placement::message(0, 200), Placement::message(1, 200)],
        };

        // The ~650-token tail clears the default bar (400 * 1.2) but not a
        // 2.0 margin (800).
        let strict = MultiPointPolicy::new()
            .with_reallocation_margin(2.0)
            .place(
                config(messages.clone(), 2).with_previous_state(previous.clone()),
            )
            .unwrap();
        assert_eq!(strict.new_state, previous);

        let default = MultiPointPolicy::new()
            .place(config(messages, 2).with_previous_state(previous.clone()))
            .unwrap();
        assert_ne!(default.new_state, previous);
    }

    #[test]
    fn test_margin_clamped_to_one() {
        let policy = MultiPointPolicy::new().with_reallocation_margin(0.2);
        assert!(policy.reallocation_margin >= 1.0);
    }

    #[test]
    fn test_smallest_gap_picks_first_minimum() {
        let placements = vec![
            Placement::message(1, 200),
            Placement::message(3, 100),
            Placement::message(5, 200),
        ];
        assert_eq!(smallest_gap(&placements), Some((0, 300)));
        assert_eq!(smallest_gap(&placements[..1]), None);
    }
}
