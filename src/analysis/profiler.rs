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

//! Query execution profiling
//!
//! Aggregates execution timings per canonical query text. Aggregates are
//! observational only: nothing in planning or caching reads them back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tracing::{info, warn};

/// Aggregated statistics for one query
#[derive(Debug, Clone, Default)]
pub struct QueryStats {
    /// Number of recorded executions
    pub execution_count: u64,
    /// Sum of all execution durations
    pub total_time: Duration,
    /// Slowest single execution
    pub max_time: Duration,
    /// Most recent execution
    pub last_time: Duration,
}

impl QueryStats {
    /// Average execution duration
    pub fn average_time(&self) -> Duration {
        if self.execution_count == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.execution_count as u32
        }
    }
}

/// One row of a profiler report
#[derive(Debug, Clone)]
pub struct QueryStatsReport {
    pub query_text: String,
    pub execution_count: u64,
    pub average_time: Duration,
    pub total_time: Duration,
}

/// Aggregate profiler report
#[derive(Debug, Clone)]
pub struct ProfilerReport {
    /// Total recorded executions across all queries
    pub total_executions: u64,
    /// Number of distinct queries seen
    pub distinct_queries: usize,
    /// Average duration across all executions
    pub average_time: Duration,
    /// The query with the slowest single execution, with that duration
    pub slowest_query: Option<(String, Duration)>,
    /// Number of recorded errors
    pub error_count: u64,
}

/// Concurrent execution profiler
pub struct QueryProfiler {
    stats: DashMap<String, QueryStats>,
    slow_threshold: Duration,
    error_count: AtomicU64,
}

impl QueryProfiler {
    /// Create a profiler; executions at or above the threshold log a warning
    pub fn new(slow_threshold: Duration) -> Self {
        Self {
            stats: DashMap::new(),
            slow_threshold,
            error_count: AtomicU64::new(0),
        }
    }

    /// Record one execution of a query
    pub fn record(&self, query_text: &str, elapsed: Duration) {
        if elapsed >= self.slow_threshold {
            warn!(
                query = query_text,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "slow query"
            );
        } else {
            info!(
                query = query_text,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "query executed"
            );
        }

        let mut entry = self.stats.entry(query_text.to_string()).or_default();
        entry.execution_count += 1;
        entry.total_time += elapsed;
        entry.max_time = entry.max_time.max(elapsed);
        entry.last_time = elapsed;
    }

    /// Record an execution failure
    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Per-query statistics snapshot
    pub fn query_stats(&self) -> Vec<QueryStatsReport> {
        self.stats
            .iter()
            .map(|entry| QueryStatsReport {
                query_text: entry.key().clone(),
                execution_count: entry.execution_count,
                average_time: entry.average_time(),
                total_time: entry.total_time,
            })
            .collect()
    }

    /// Aggregate report across all recorded executions
    pub fn report(&self) -> ProfilerReport {
        let mut total_executions = 0u64;
        let mut total_time = Duration::ZERO;
        let mut slowest: Option<(String, Duration)> = None;

        for entry in self.stats.iter() {
            total_executions += entry.execution_count;
            total_time += entry.total_time;
            let is_slower = slowest
                .as_ref()
                .map(|(_, d)| entry.max_time > *d)
                .unwrap_or(true);
            if is_slower {
                slowest = Some((entry.key().clone(), entry.max_time));
            }
        }

        ProfilerReport {
            total_executions,
            distinct_queries: self.stats.len(),
            average_time: if total_executions == 0 {
                Duration::ZERO
            } else {
                total_time / total_executions as u32
            },
            slowest_query: slowest,
            error_count: self.error_count.load(Ordering::Relaxed),
        }
    }
}
