use std::time::Duration;

use serde::Deserialize;

/// Tuning knobs for the retrieval pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Result count used when a caller does not specify one.
    pub default_k: usize,

    /// Candidate over-fetch factor: each ranker is asked for
    /// `candidate_multiplier * k` hits before fusion. A wider net reduces
    /// truncation bias in the fused list. Policy, not invariant.
    pub candidate_multiplier: usize,

    /// The RRF constant K in `1 / (K + rank)`.
    pub rrf_k: f32,

    /// Bound on a single embedding-oracle or similarity-search call. Calls
    /// that exceed it degrade to empty candidate lists instead of blocking
    /// the search.
    pub upstream_timeout: Duration,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            candidate_multiplier: 2,
            rrf_k: 60.0,
            upstream_timeout: Duration::from_secs(2),
        }
    }
}
