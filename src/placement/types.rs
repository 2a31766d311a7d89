//! Data model for cache breakpoint placement.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Which logical regions of a request may carry cache breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheableSegments {
    pub system: bool,
    pub messages: bool,
}

impl CacheableSegments {
    pub fn all() -> Self {
        Self {
            system: true,
            messages: true,
        }
    }

    pub fn messages_only() -> Self {
        Self {
            system: false,
            messages: true,
        }
    }
}

impl Default for CacheableSegments {
    fn default() -> Self {
        Self::all()
    }
}

/// Caching-related limits of a target model.
///
/// Supplied by a model-capability lookup external to this engine. The
/// engine consumes the flags; it never decides on its own whether a model
/// supports caching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub supports_cache: bool,
    /// Upper bound on breakpoints usable in one request.
    pub max_breakpoints: u32,
    /// Minimum estimated tokens a segment must cover to justify a breakpoint.
    pub min_tokens_per_breakpoint: u32,
    pub cacheable_segments: CacheableSegments,
}

impl ModelCapabilities {
    pub fn new(max_breakpoints: u32, min_tokens_per_breakpoint: u32) -> Self {
        Self {
            supports_cache: true,
            max_breakpoints,
            min_tokens_per_breakpoint,
            cacheable_segments: CacheableSegments::all(),
        }
    }

    pub fn uncached() -> Self {
        Self {
            supports_cache: false,
            ..Default::default()
        }
    }
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        // Anthropic-style limits: four breakpoints, 1024-token minimum.
        Self::new(4, 1024)
    }
}

/// Which region a placement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementKind {
    System,
    Message,
}

/// A single chosen breakpoint.
///
/// For `Message` placements, `index` is the position in the message list
/// after which the marker goes. System placements carry index 0; the kind
/// field is what distinguishes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub index: usize,
    pub kind: PlacementKind,
    /// Estimated tokens in the segment ending at this breakpoint, measured
    /// from the previous breakpoint or from the start.
    pub tokens_covered: u32,
}

impl Placement {
    pub fn system(tokens_covered: u32) -> Self {
        Self {
            index: 0,
            kind: PlacementKind::System,
            tokens_covered,
        }
    }

    pub fn message(index: usize, tokens_covered: u32) -> Self {
        Self {
            index,
            kind: PlacementKind::Message,
            tokens_covered,
        }
    }
}

/// Where breakpoints were placed on the previous turn of a conversation.
///
/// The engine itself is stateless across calls; this record is the only
/// memory that crosses them. Callers keep one per conversation (e.g. in a
/// map keyed by conversation id), pass it in by value and replace it
/// wholesale with the `new_state` of each result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementState {
    pub placements: Vec<Placement>,
}

impl PlacementState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Message-kind placements in index order.
    pub fn message_placements(&self) -> impl Iterator<Item = &Placement> {
        self.placements
            .iter()
            .filter(|p| p.kind == PlacementKind::Message)
    }
}

/// Everything a placement policy needs for one call.
///
/// # Example
/// ```ignore
/// use cachepoint::{CacheStrategyConfig, ModelCapabilities};
///
/// let config = CacheStrategyConfig::new(ModelCapabilities::default(), messages)
///     .with_system_prompt("You are a helpful assistant.")
///     .with_previous_state(stored_state);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStrategyConfig {
    pub capabilities: ModelCapabilities,
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    /// Per-request toggle, independent of what the model supports.
    pub use_cache: bool,
    /// Previous turn's placements for this conversation; empty on the first turn.
    pub previous_state: PlacementState,
}

impl CacheStrategyConfig {
    pub fn new(capabilities: ModelCapabilities, messages: Vec<Message>) -> Self {
        Self {
            capabilities,
            system_prompt: None,
            messages,
            use_cache: true,
            previous_state: PlacementState::new(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_previous_state(mut self, previous_state: PlacementState) -> Self {
        self.previous_state = previous_state;
        self
    }

    /// Whether this call may place breakpoints at all.
    pub fn cache_enabled(&self) -> bool {
        self.use_cache && self.capabilities.supports_cache
    }
}

/// Marker emitted at a breakpoint position.
///
/// How the marker is rendered on the wire is transport-defined; the
/// serialized form here matches the Anthropic-style `cache_control` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheMarker {
    Ephemeral,
}

impl CacheMarker {
    pub fn ephemeral() -> Self {
        Self::Ephemeral
    }
}

/// System prompt text with an optional cache marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedText {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<CacheMarker>,
}

/// A message with an optional cache marker after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedMessage {
    pub message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<CacheMarker>,
}

/// Output of a placement call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheResult {
    pub annotated_system: Option<AnnotatedText>,
    pub annotated_messages: Vec<AnnotatedMessage>,
    /// Replaces the caller's stored state for this conversation.
    pub new_state: PlacementState,
}

impl CacheResult {
    /// The caching-disabled path: original content, no markers, empty state.
    pub fn unannotated(config: CacheStrategyConfig) -> Self {
        Self {
            annotated_system: config.system_prompt.map(|text| AnnotatedText {
                text,
                marker: None,
            }),
            annotated_messages: config
                .messages
                .into_iter()
                .map(|message| AnnotatedMessage {
                    message,
                    marker: None,
                })
                .collect(),
            new_state: PlacementState::new(),
        }
    }
}
