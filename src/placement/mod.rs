//! Cache breakpoint placement for multi-turn conversations.
//!
//! Providers with explicit prompt caching accept a limited number of cache
//! breakpoints per request. This module decides where those breakpoints go
//! so that previously computed prompt state keeps being reused as the
//! conversation grows, within a hard breakpoint budget and a minimum
//! useful segment size.

mod annotator;
mod estimator;
mod multi_point;
mod policy;
mod single_point;
mod types;

pub use annotator::{annotate_system, insert_markers};
pub use estimator::{estimate_message_tokens, estimate_messages_tokens, estimate_tokens};
pub use multi_point::{MultiPointPolicy, DEFAULT_REALLOCATION_MARGIN};
pub use policy::{PlacementError, PlacementPolicy};
pub use single_point::SinglePointPolicy;
pub use types::{
    AnnotatedMessage, AnnotatedText, CacheMarker, CacheResult, CacheStrategyConfig,
    CacheableSegments, ModelCapabilities, Placement, PlacementKind, PlacementState,
};
