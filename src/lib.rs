//! Cache breakpoint placement engine for LLM prompt caching.
//!
//! Providers with explicit prompt caching let a request mark a handful of
//! positions up to which previously computed state may be reused. Spending
//! that budget well means maximizing reuse across turns while disturbing
//! already-cached history as rarely as possible. This crate makes that
//! decision; sending the annotated request and storing conversation
//! history stay with the caller.
//!
//! The engine is a pure function of its inputs. The only state that
//! crosses calls is [`PlacementState`], which the caller threads through
//! per conversation and replaces wholesale with each result.
//!
//! # Example
//! ```ignore
//! use cachepoint::{
//!     CacheStrategyConfig, ModelCapabilities, MultiPointPolicy, PlacementPolicy,
//! };
//!
//! let policy = MultiPointPolicy::new();
//! let config = CacheStrategyConfig::new(ModelCapabilities::default(), messages)
//!     .with_system_prompt(system_prompt)
//!     .with_previous_state(stored_state);
//!
//! let result = policy.place(config)?;
//! // serialize result.annotated_messages into the provider request,
//! // persist result.new_state for the next turn of this conversation
//! ```

pub mod message;
pub mod placement;

pub use message::{ContentPart, Message, Role};
pub use placement::{
    estimate_message_tokens, estimate_messages_tokens, estimate_tokens, AnnotatedMessage,
    AnnotatedText, CacheMarker, CacheResult, CacheStrategyConfig, CacheableSegments,
    ModelCapabilities, MultiPointPolicy, Placement, PlacementError, PlacementKind,
    PlacementPolicy, PlacementState, SinglePointPolicy,
};
