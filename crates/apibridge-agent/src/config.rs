//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Default cap on model round-trips per chat turn.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Default cap on tools offered to the model per turn.
pub const DEFAULT_MAX_TOOLS_PER_TURN: usize = 40;

/// Tunables for the orchestration engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum model round-trips in one chat turn before the engine gives up.
    pub max_iterations: usize,

    /// Maximum tools offered per turn; beyond this, relevance selection
    /// picks a subset.
    pub max_tools_per_turn: usize,

    /// Offer compacted schemas instead of full ones, for backends with
    /// tight request-size limits.
    pub compact_schemas: bool,

    /// Maximum live sessions before oldest-insertion eviction kicks in.
    pub max_sessions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_tools_per_turn: DEFAULT_MAX_TOOLS_PER_TURN,
            compact_schemas: false,
            max_sessions: crate::session::DEFAULT_MAX_SESSIONS,
        }
    }
}
