// Copyright 2026 Quiver Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Engine configuration
//!
//! All tunables live here and are injected at construction time. There is
//! no ambient global configuration.

use std::time::Duration;

/// Confidence below which a prediction falls back to measured execution
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Engine-wide configuration
///
/// TTL selection buckets queries by predicted execution time: queries
/// predicted faster than `fast_query_cutoff` cache for `fast_query_ttl`,
/// queries under `medium_query_cutoff` for `medium_query_ttl`, everything
/// else for `slow_query_ttl`. Cheap queries are cheap to recompute, so the
/// longest TTL goes to the fastest bucket.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound of the fast bucket
    pub fast_query_cutoff: Duration,
    /// Upper bound of the medium bucket
    pub medium_query_cutoff: Duration,
    /// TTL for the fast bucket
    pub fast_query_ttl: Duration,
    /// TTL for the medium bucket
    pub medium_query_ttl: Duration,
    /// TTL for everything slower
    pub slow_query_ttl: Duration,
    /// Prediction confidence below this triggers measured fallback
    pub confidence_threshold: f64,
    /// Executions at or above this duration are logged as slow queries
    pub slow_query_threshold: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fast_query_cutoff: Duration::from_secs(1),
            medium_query_cutoff: Duration::from_secs(5),
            fast_query_ttl: Duration::from_secs(30 * 60),
            medium_query_ttl: Duration::from_secs(15 * 60),
            slow_query_ttl: Duration::from_secs(5 * 60),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            slow_query_threshold: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    /// Select a TTL bucket for a predicted execution time
    pub fn ttl_for(&self, estimated: Duration) -> Duration {
        if estimated < self.fast_query_cutoff {
            self.fast_query_ttl
        } else if estimated < self.medium_query_cutoff {
            self.medium_query_ttl
        } else {
            self.slow_query_ttl
        }
    }
}
