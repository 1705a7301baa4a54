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

//! Integration tests for the full cache lifecycle
//!
//! Covers the miss -> hit -> invalidate -> miss cycle against the
//! in-memory collaborators, plus the optimizer pipeline feeding the
//! cache with a rewritten query.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;

use quiver::analysis::QueryProfiler;
use quiver::backend::{
    ChangeSet, ChangeState, EntityChange, MemoryCacheStore, MemoryReverseIndex, PlanTraceProvider,
    PlanTraceRow, QueryExecutor, StatisticsProvider,
};
use quiver::cache::{CacheKeyDeriver, CacheOptions, DistributedCache};
use quiver::core::{EngineConfig, EntityMeta, Result, ResultSet, Row, SchemaCatalog, Value};
use quiver::predictor::PerformancePredictor;
use quiver::query::{FieldRef, Predicate, QueryBuilder};
use quiver::QueryOptimizer;

/// Executor stub serving fixed rows and counting executions
struct StubExecutor {
    executions: AtomicUsize,
}

impl StubExecutor {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            executions: AtomicUsize::new(0),
        })
    }

    fn count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

impl QueryExecutor for StubExecutor {
    fn execute(&self, _query: &quiver::Query) -> Result<ResultSet> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(ResultSet::new(
            vec!["id".to_string(), "status".to_string()],
            vec![
                Row::from_values(vec![Value::Integer(1), Value::from("Open")]),
                Row::from_values(vec![Value::Integer(2), Value::from("Open")]),
            ],
        ))
    }
}

struct StubStats;

impl StatisticsProvider for StubStats {
    fn row_count(&self, table: &str) -> Result<u64> {
        Ok(match table {
            "orders" => 10_000,
            "customers" => 1_000,
            "items" => 100,
            _ => 1,
        })
    }

    fn distinct_values(&self, _table: &str, _column: &str) -> Result<u64> {
        Ok(100)
    }
}

struct StubTrace;

impl PlanTraceProvider for StubTrace {
    fn explain(&self, _query_text: &str) -> Result<Vec<PlanTraceRow>> {
        Ok(vec![PlanTraceRow::new(
            1,
            0,
            "SCAN TABLE orders WHERE status = ?",
        )])
    }
}

fn orders_catalog() -> Arc<SchemaCatalog> {
    let mut catalog = SchemaCatalog::new();
    catalog.register(EntityMeta {
        entity_type: "Order".to_string(),
        table: "orders".to_string(),
        primary_key: vec!["id".to_string()],
        columns: vec![
            "id".to_string(),
            "customer_id".to_string(),
            "status".to_string(),
        ],
    });
    Arc::new(catalog)
}

fn build_cache(executor: Arc<StubExecutor>) -> DistributedCache {
    let config = EngineConfig::default();
    DistributedCache::new(
        Arc::new(MemoryCacheStore::new()),
        executor,
        CacheKeyDeriver::new(Arc::new(MemoryReverseIndex::new()), orders_catalog()),
        // Threshold 0.0: no measured fallback, so these tests count
        // exactly one execution per cache miss
        Arc::new(PerformancePredictor::new(0.0)),
        Arc::new(QueryProfiler::new(Duration::from_secs(1))),
        config,
    )
}

fn open_orders_query() -> quiver::Query {
    QueryBuilder::from("Orders")
        .filter(Predicate::eq(FieldRef::qualified("Orders", "Status"), "Open"))
        .build()
}

/// The spec scenario: miss, hit, change-set invalidation, miss again
#[test]
fn test_miss_hit_invalidate_miss_cycle() {
    let executor = StubExecutor::new();
    let cache = build_cache(executor.clone());
    let query = open_orders_query();

    // First call executes and stores
    let first = cache
        .get_or_set(&query, &CacheOptions::predicted())
        .expect("first call failed");
    assert_eq!(first.row_count(), 2);
    assert_eq!(executor.count(), 1);

    // Second identical call is a hit; the executor stays untouched
    let second = cache
        .get_or_set(&query, &CacheOptions::predicted())
        .expect("second call failed");
    assert_eq!(first, second);
    assert_eq!(executor.count(), 1);

    // A modified Orders row invalidates the entry
    let mut values = FxHashMap::default();
    values.insert("id".to_string(), Value::Integer(1));
    values.insert("status".to_string(), Value::from("Closed"));
    let removed = cache.invalidate_by_change_set(&ChangeSet::new(vec![EntityChange::new(
        "Order",
        ChangeState::Modified,
        values,
    )]));
    assert_eq!(removed, 1);

    // Third call misses and executes again
    cache
        .get_or_set(&query, &CacheOptions::predicted())
        .expect("third call failed");
    assert_eq!(executor.count(), 2);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.invalidated_keys, 1);
}

/// Structurally identical queries share one cache entry
#[test]
fn test_equivalent_queries_share_entry() {
    let executor = StubExecutor::new();
    let cache = build_cache(executor.clone());

    // Same canonical form, different surface casing
    let shouting = QueryBuilder::from("ORDERS")
        .filter(Predicate::eq(FieldRef::qualified("ORDERS", "STATUS"), "Open"))
        .build();
    let quiet = QueryBuilder::from("orders")
        .filter(Predicate::eq(FieldRef::qualified("orders", "status"), "Open"))
        .build();

    cache
        .get_or_set(&shouting, &CacheOptions::predicted())
        .unwrap();
    cache.get_or_set(&quiet, &CacheOptions::predicted()).unwrap();
    assert_eq!(executor.count(), 1);
}

/// Predicate invalidation respects the dependent-table scope
#[test]
fn test_predicate_invalidation_scope() {
    let executor = StubExecutor::new();
    let cache = build_cache(executor.clone());

    // Entry depends on two tables: orders and customers
    let query = QueryBuilder::from("Orders")
        .join(
            "Customers",
            FieldRef::qualified("Orders", "customer_id"),
            FieldRef::qualified("Customers", "id"),
        )
        .filter(Predicate::eq(FieldRef::qualified("Orders", "Status"), "Open"))
        .build();
    cache.get_or_set(&query, &CacheOptions::predicted()).unwrap();

    // A predicate on neither table: entry survives
    let unrelated = Predicate::eq(FieldRef::qualified("shipments", "state"), "Late");
    assert_eq!(cache.invalidate_by_predicate(&unrelated), 0);
    cache.get_or_set(&query, &CacheOptions::predicted()).unwrap();
    assert_eq!(executor.count(), 1);

    // A predicate on one dependent table: entry removed
    let related = Predicate::eq(FieldRef::qualified("customers", "region"), "EU");
    assert_eq!(cache.invalidate_by_predicate(&related), 1);
    cache.get_or_set(&query, &CacheOptions::predicted()).unwrap();
    assert_eq!(executor.count(), 2);
}

/// The optimized query flows through the cache like any other
#[test]
fn test_optimizer_feeds_cache() {
    let executor = StubExecutor::new();
    let config = EngineConfig::default();
    let predictor = Arc::new(PerformancePredictor::new(config.confidence_threshold));

    let optimizer = QueryOptimizer::new(
        Arc::new(StubStats),
        Arc::new(StubTrace),
        orders_catalog(),
        predictor.clone(),
        executor.clone(),
    );

    let cache = DistributedCache::new(
        Arc::new(MemoryCacheStore::new()),
        executor.clone(),
        CacheKeyDeriver::new(Arc::new(MemoryReverseIndex::new()), orders_catalog()),
        predictor,
        Arc::new(QueryProfiler::new(Duration::from_secs(1))),
        config,
    );

    let raw = QueryBuilder::from("orders")
        .join(
            "customers",
            FieldRef::qualified("orders", "customer_id"),
            FieldRef::qualified("customers", "id"),
        )
        .join(
            "items",
            FieldRef::qualified("orders", "item_id"),
            FieldRef::qualified("items", "id"),
        )
        .filter(Predicate::Membership {
            field: FieldRef::qualified("orders", "status"),
            values: vec![Value::from("Open"), Value::from("Held")],
        })
        .build();

    let (optimized, report) = optimizer.optimize(raw);

    // The cheapest join leads and the membership idiom is gone
    assert!(report.optimized_query.contains("JOIN items"));
    assert!(report.optimized_query.contains("= ANY"));
    assert!(!report.index_suggestions.is_empty());

    // Optimized trees cache and hit like any other query
    let baseline = executor.count();
    cache
        .get_or_set(&optimized, &CacheOptions::predicted())
        .unwrap();
    cache
        .get_or_set(&optimized, &CacheOptions::predicted())
        .unwrap();
    assert_eq!(executor.count(), baseline + 1);
}
