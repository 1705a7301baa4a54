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

//! The distributed query cache facade
//!
//! Get-or-execute-and-set over an external key/value store, with TTLs
//! chosen from predicted execution cost and invalidation driven through
//! the reverse index. Store problems never fail a read: an unreachable
//! store or a corrupt payload is a miss, a failed set still returns the
//! freshly executed rows, and a failed remove leaves the key to expire
//! on its own TTL.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::analysis::QueryProfiler;
use crate::backend::{CacheStore, ChangeSet, ExpirationPolicy, QueryExecutor};
use crate::core::{EngineConfig, ResultSet, Result};
use crate::predictor::PerformancePredictor;
use crate::query::{canonical, Predicate, Query};

use super::key::CacheKeyDeriver;

/// Per-call expiration overrides; an explicit override always wins over
/// the prediction-driven bucket
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// Explicit sliding window
    pub sliding: Option<Duration>,
    /// Explicit absolute expiry
    pub absolute: Option<DateTime<Utc>>,
}

impl CacheOptions {
    /// No overrides: TTL comes from the predictor
    pub fn predicted() -> Self {
        Self::default()
    }

    /// Explicit sliding expiration
    pub fn sliding(window: Duration) -> Self {
        Self {
            sliding: Some(window),
            ..Self::default()
        }
    }

    /// Explicit absolute expiration
    pub fn absolute(at: DateTime<Utc>) -> Self {
        Self {
            absolute: Some(at),
            ..Self::default()
        }
    }
}

/// Counter snapshot for cache observability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub invalidated_keys: u64,
    pub store_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidated_keys: AtomicU64,
    store_failures: AtomicU64,
}

/// Distributed query result cache
pub struct DistributedCache {
    store: Arc<dyn CacheStore>,
    executor: Arc<dyn QueryExecutor>,
    keys: CacheKeyDeriver,
    predictor: Arc<PerformancePredictor>,
    profiler: Arc<QueryProfiler>,
    config: EngineConfig,
    counters: Counters,
}

impl DistributedCache {
    /// Wire the cache to its collaborators
    pub fn new(
        store: Arc<dyn CacheStore>,
        executor: Arc<dyn QueryExecutor>,
        keys: CacheKeyDeriver,
        predictor: Arc<PerformancePredictor>,
        profiler: Arc<QueryProfiler>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            executor,
            keys,
            predictor,
            profiler,
            config,
            counters: Counters::default(),
        }
    }

    /// Return cached rows for the query, executing and caching on a miss
    pub fn get_or_set(&self, query: &Query, options: &CacheOptions) -> Result<ResultSet> {
        let cache_key = self.keys.derive_key(query);

        match self.store.get(&cache_key) {
            Ok(Some(payload)) => match serde_json::from_slice::<ResultSet>(&payload) {
                Ok(rows) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(rows);
                }
                Err(e) => {
                    // Corrupt payload: evict and fall through to a miss
                    warn!(key = %cache_key, "corrupt cache payload, evicting: {}", e);
                    if let Err(remove_err) = self.store.remove(&cache_key) {
                        warn!(key = %cache_key, "evicting corrupt key failed: {}", remove_err);
                    }
                }
            },
            Ok(None) => {}
            Err(e) => {
                self.counters.store_failures.fetch_add(1, Ordering::Relaxed);
                warn!(key = %cache_key, "cache store unavailable, executing directly: {}", e);
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let started = Instant::now();
        let rows = match self.executor.execute(query) {
            Ok(rows) => rows,
            Err(e) => {
                self.profiler.record_error();
                return Err(e);
            }
        };
        self.profiler
            .record(&canonical::query_text(query), started.elapsed());

        let policy = self.expiration_policy(query, options);
        match serde_json::to_vec(&rows) {
            Ok(payload) => match self.store.set(&cache_key, payload, policy) {
                Ok(()) => self.keys.record_dependencies(query, &cache_key),
                Err(e) => {
                    self.counters.store_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %cache_key, "cache store set failed: {}", e);
                }
            },
            Err(e) => warn!(key = %cache_key, "result serialization failed: {}", e),
        }

        Ok(rows)
    }

    /// Remove every cached entry a predicate's tables relate to
    ///
    /// Best-effort: a failed remove is logged and the key stays until
    /// natural TTL expiry. Returns the number of keys removed.
    pub fn invalidate_by_predicate(&self, predicate: &Predicate) -> usize {
        self.remove_keys(self.keys.related_keys_for_predicate(predicate))
    }

    /// Remove every cached entry related to a post-commit change set
    ///
    /// Returns the number of keys removed.
    pub fn invalidate_by_change_set(&self, changes: &ChangeSet) -> usize {
        let mut removed = 0;
        for change in &changes.entries {
            removed += self.remove_keys(self.keys.related_keys_for_entity(change));
        }
        removed
    }

    /// Counter snapshot
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            invalidated_keys: self.counters.invalidated_keys.load(Ordering::Relaxed),
            store_failures: self.counters.store_failures.load(Ordering::Relaxed),
        }
    }

    fn remove_keys(&self, keys: Vec<String>) -> usize {
        let mut removed = 0;
        for key in keys {
            match self.store.remove(&key) {
                Ok(()) => {
                    removed += 1;
                    if let Err(e) = self.keys.prune_key(&key) {
                        warn!(key = %key, "reverse index prune failed: {}", e);
                    }
                }
                Err(e) => {
                    // The key stays cached until its TTL runs out
                    self.counters.store_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %key, "cache invalidation failed: {}", e);
                }
            }
        }
        self.counters
            .invalidated_keys
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed as usize
    }

    /// Pick the entry's expiration policy
    ///
    /// Explicit overrides win; otherwise the predicted execution time
    /// selects a TTL bucket. A prediction failure selects the
    /// conservative (shortest) bucket rather than failing the operation.
    fn expiration_policy(&self, query: &Query, options: &CacheOptions) -> ExpirationPolicy {
        if let Some(window) = options.sliding {
            return ExpirationPolicy::Sliding(window);
        }
        if let Some(at) = options.absolute {
            return ExpirationPolicy::Absolute(at);
        }

        match self.predictor.predict(query, self.executor.as_ref()) {
            Ok(prediction) => {
                ExpirationPolicy::Sliding(self.config.ttl_for(prediction.estimated_execution_time))
            }
            Err(e) => {
                warn!("cost prediction failed, using conservative TTL: {}", e);
                ExpirationPolicy::Sliding(self.config.slow_query_ttl)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    use crate::backend::{MemoryCacheStore, MemoryReverseIndex};
    use crate::core::{Error, Row, SchemaCatalog, Value};
    use crate::predictor::{
        CostModel, PerformancePrediction, QueryFeatures, TrainingSample,
    };
    use crate::query::{FieldRef, QueryBuilder};

    /// Model with a fixed estimate and full confidence
    #[derive(Clone)]
    struct FixedEstimateModel {
        estimate: Duration,
    }

    impl CostModel for FixedEstimateModel {
        fn predict(&self, _f: &QueryFeatures) -> Result<PerformancePrediction> {
            Ok(PerformancePrediction {
                estimated_execution_time: self.estimate,
                confidence: 1.0,
            })
        }

        fn fit(&mut self, _s: &[TrainingSample]) -> Result<()> {
            Ok(())
        }

        fn boxed_clone(&self) -> Box<dyn CostModel> {
            Box::new(self.clone())
        }
    }

    #[derive(Clone)]
    struct FailingModel;

    impl CostModel for FailingModel {
        fn predict(&self, _f: &QueryFeatures) -> Result<PerformancePrediction> {
            Err(Error::model("broken"))
        }

        fn fit(&mut self, _s: &[TrainingSample]) -> Result<()> {
            Err(Error::model("broken"))
        }

        fn boxed_clone(&self) -> Box<dyn CostModel> {
            Box::new(self.clone())
        }
    }

    #[derive(Default)]
    struct CountingExecutor {
        executions: AtomicUsize,
    }

    impl QueryExecutor for CountingExecutor {
        fn execute(&self, _query: &Query) -> Result<ResultSet> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            Ok(ResultSet::new(
                vec!["id".to_string()],
                vec![Row::from_values(vec![Value::Integer(1)])],
            ))
        }
    }

    /// Store wrapper capturing the policy of the last set
    struct RecordingStore {
        inner: MemoryCacheStore,
        last_policy: Mutex<Option<ExpirationPolicy>>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                inner: MemoryCacheStore::new(),
                last_policy: Mutex::new(None),
            }
        }
    }

    impl CacheStore for RecordingStore {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, payload: Vec<u8>, policy: ExpirationPolicy) -> Result<()> {
            *self.last_policy.lock() = Some(policy.clone());
            self.inner.set(key, payload, policy)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    struct BrokenStore;

    impl CacheStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(Error::cache_store("connection refused"))
        }

        fn set(&self, _key: &str, _payload: Vec<u8>, _policy: ExpirationPolicy) -> Result<()> {
            Err(Error::cache_store("connection refused"))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Err(Error::cache_store("connection refused"))
        }
    }

    struct Harness {
        cache: DistributedCache,
        executor: Arc<CountingExecutor>,
        store: Arc<RecordingStore>,
    }

    fn harness_with(model: Box<dyn CostModel>) -> Harness {
        let store = Arc::new(RecordingStore::new());
        let executor = Arc::new(CountingExecutor::default());
        let index = Arc::new(MemoryReverseIndex::new());
        let catalog = Arc::new(SchemaCatalog::new());
        let cache = DistributedCache::new(
            store.clone(),
            executor.clone(),
            CacheKeyDeriver::new(index, catalog),
            Arc::new(PerformancePredictor::with_model(model, 0.7)),
            Arc::new(QueryProfiler::new(Duration::from_secs(1))),
            EngineConfig::default(),
        );
        Harness {
            cache,
            executor,
            store,
        }
    }

    fn harness() -> Harness {
        harness_with(Box::new(FixedEstimateModel {
            estimate: Duration::from_millis(500),
        }))
    }

    fn orders_query() -> Query {
        QueryBuilder::from("orders")
            .filter(Predicate::eq(FieldRef::qualified("orders", "status"), "Open"))
            .build()
    }

    fn sliding_window(h: &Harness) -> Duration {
        match h.store.last_policy.lock().clone() {
            Some(ExpirationPolicy::Sliding(d)) => d,
            other => panic!("expected sliding policy, got {:?}", other),
        }
    }

    #[test]
    fn test_second_call_is_a_hit() {
        let h = harness();
        let query = orders_query();

        let first = h.cache.get_or_set(&query, &CacheOptions::predicted()).unwrap();
        let second = h.cache.get_or_set(&query, &CacheOptions::predicted()).unwrap();

        assert_eq!(first, second);
        assert_eq!(h.executor.executions.load(Ordering::SeqCst), 1);
        let stats = h.cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_ttl_buckets_follow_prediction() {
        for (estimate_ms, expected_minutes) in [(500u64, 30u64), (3000, 15), (8000, 5)] {
            let h = harness_with(Box::new(FixedEstimateModel {
                estimate: Duration::from_millis(estimate_ms),
            }));
            h.cache
                .get_or_set(&orders_query(), &CacheOptions::predicted())
                .unwrap();
            assert_eq!(
                sliding_window(&h),
                Duration::from_secs(expected_minutes * 60),
                "estimate {} ms",
                estimate_ms
            );
        }
    }

    #[test]
    fn test_explicit_override_beats_prediction() {
        let h = harness_with(Box::new(FixedEstimateModel {
            estimate: Duration::from_secs(30),
        }));
        h.cache
            .get_or_set(&orders_query(), &CacheOptions::sliding(Duration::from_secs(42)))
            .unwrap();
        assert_eq!(sliding_window(&h), Duration::from_secs(42));

        let at = Utc::now() + chrono::Duration::hours(1);
        h.cache
            .get_or_set(
                &QueryBuilder::from("customers").build(),
                &CacheOptions::absolute(at),
            )
            .unwrap();
        let last_policy = h.store.last_policy.lock().clone();
        match last_policy {
            Some(ExpirationPolicy::Absolute(stored)) => assert_eq!(stored, at),
            other => panic!("expected absolute policy, got {:?}", other),
        }
    }

    #[test]
    fn test_prediction_failure_uses_conservative_bucket() {
        let h = harness_with(Box::new(FailingModel));
        h.cache
            .get_or_set(&orders_query(), &CacheOptions::predicted())
            .unwrap();
        assert_eq!(sliding_window(&h), Duration::from_secs(5 * 60));
    }

    #[test]
    fn test_corrupt_payload_is_evicted_and_reexecuted() {
        let h = harness();
        let query = orders_query();
        let key = h.cache.keys.derive_key(&query);
        h.store
            .set(
                &key,
                b"{not json".to_vec(),
                ExpirationPolicy::Sliding(Duration::from_secs(60)),
            )
            .unwrap();

        let rows = h.cache.get_or_set(&query, &CacheOptions::predicted()).unwrap();
        assert_eq!(rows.row_count(), 1);
        assert_eq!(h.executor.executions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_store_failure_is_a_miss() {
        let executor = Arc::new(CountingExecutor::default());
        let cache = DistributedCache::new(
            Arc::new(BrokenStore),
            executor.clone(),
            CacheKeyDeriver::new(
                Arc::new(MemoryReverseIndex::new()),
                Arc::new(SchemaCatalog::new()),
            ),
            Arc::new(PerformancePredictor::with_model(
                Box::new(FixedEstimateModel {
                    estimate: Duration::from_millis(100),
                }),
                0.7,
            )),
            Arc::new(QueryProfiler::new(Duration::from_secs(1))),
            EngineConfig::default(),
        );

        let rows = cache
            .get_or_set(&orders_query(), &CacheOptions::predicted())
            .unwrap();
        assert_eq!(rows.row_count(), 1);
        assert_eq!(executor.executions.load(Ordering::SeqCst), 1);
        assert!(cache.stats().store_failures >= 2); // failed get and set
    }

    #[test]
    fn test_invalidate_by_predicate_scope() {
        let h = harness();
        let query = orders_query();
        h.cache.get_or_set(&query, &CacheOptions::predicted()).unwrap();

        // A predicate on an unrelated table must not touch the entry
        let unrelated = Predicate::eq(FieldRef::qualified("shipments", "status"), "Late");
        assert_eq!(h.cache.invalidate_by_predicate(&unrelated), 0);
        h.cache.get_or_set(&query, &CacheOptions::predicted()).unwrap();
        assert_eq!(h.executor.executions.load(Ordering::SeqCst), 1);

        // A predicate on the dependent table removes it
        let related = Predicate::eq(FieldRef::qualified("orders", "status"), "Open");
        assert_eq!(h.cache.invalidate_by_predicate(&related), 1);
        h.cache.get_or_set(&query, &CacheOptions::predicted()).unwrap();
        assert_eq!(h.executor.executions.load(Ordering::SeqCst), 2);
    }
}
