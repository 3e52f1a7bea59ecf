/// Policy constants for the synchronization engine
/// All wall-clock windows live here rather than as literals so they are
/// independently testable and tunable per deployment
use serde::{Deserialize, Serialize};

use anchor::FuzzyParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Comments younger than this skip text recovery entirely; their stored
    /// offsets are still known-correct editor coordinates. Default 10s.
    pub creation_skip_ms: i64,

    /// Push events with a commit timestamp older than this are dropped as
    /// possible replays. Default 30s.
    pub replay_window_ms: i64,

    /// Characters of slack the fuzzy matcher searches around the original
    /// offset. Default 50.
    pub fuzzy_pad: usize,

    /// Accepted fuzzy edit distance as a fraction of anchor length.
    /// Default 0.2.
    pub fuzzy_max_distance_ratio: f64,

    /// Reconnect attempts before the subscription degrades. Default 3.
    pub max_reconnect_attempts: u32,

    /// Base of the exponential reconnect backoff. Default 1000ms.
    pub backoff_base_ms: u64,

    /// Upper bound of the random jitter added to each backoff. Default 500ms.
    pub backoff_jitter_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            creation_skip_ms: 10_000,
            replay_window_ms: 30_000,
            fuzzy_pad: 50,
            fuzzy_max_distance_ratio: 0.2,
            max_reconnect_attempts: 3,
            backoff_base_ms: 1_000,
            backoff_jitter_ms: 500,
        }
    }
}

impl SyncConfig {
    pub fn fuzzy_params(&self) -> FuzzyParams {
        FuzzyParams {
            pad: self.fuzzy_pad,
            max_distance_ratio: self.fuzzy_max_distance_ratio,
        }
    }
}
