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

//! # Quiver - Adaptive query caching and optimization
//!
//! Quiver is a data-access acceleration layer that sits in front of a
//! relational store. It caches query results with cost-aware TTLs,
//! predicts execution cost with a self-correcting model, and rewrites
//! query trees before execution.
//!
//! ## Key Features
//!
//! - **Result caching** - Get-or-execute-and-set over any key/value store
//!   with TTL support, with table- and row-scoped invalidation through a
//!   persisted reverse index
//! - **Cost prediction** - Regression model over lexical query features,
//!   falling back to measured execution on low confidence and retraining
//!   in the background from the measurements it collects
//! - **Query optimization** - Fixed rewrite pipeline: read-only marking
//!   and predicate pushdown, inefficient-idiom rewriting, cardinality-based
//!   join reordering
//! - **Plan diagnostics** - Execution-plan bottleneck findings, complexity
//!   scoring and index advisory text
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use quiver::analysis::QueryProfiler;
//! use quiver::backend::{MemoryCacheStore, MemoryReverseIndex, QueryExecutor};
//! use quiver::cache::{CacheKeyDeriver, CacheOptions, DistributedCache};
//! use quiver::core::{EngineConfig, SchemaCatalog};
//! use quiver::predictor::PerformancePredictor;
//! use quiver::query::{FieldRef, Predicate, QueryBuilder};
//!
//! fn run(executor: Arc<dyn QueryExecutor>) -> quiver::core::Result<()> {
//!     let config = EngineConfig::default();
//!     let cache = DistributedCache::new(
//!         Arc::new(MemoryCacheStore::new()),
//!         executor,
//!         CacheKeyDeriver::new(
//!             Arc::new(MemoryReverseIndex::new()),
//!             Arc::new(SchemaCatalog::new()),
//!         ),
//!         Arc::new(PerformancePredictor::new(config.confidence_threshold)),
//!         Arc::new(QueryProfiler::new(Duration::from_secs(1))),
//!         config,
//!     );
//!
//!     let query = QueryBuilder::from("orders")
//!         .filter(Predicate::eq(FieldRef::new("status"), "Open"))
//!         .build();
//!     let rows = cache.get_or_set(&query, &CacheOptions::predicted())?;
//!     println!("{} rows", rows.row_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`core`] - Core types ([`Error`], [`Value`], [`Row`], [`SchemaCatalog`],
//!   [`EngineConfig`])
//! - [`query`] - Query AST, canonical rendering and the fluent builder
//! - [`backend`] - External collaborator traits and in-memory reference
//!   implementations
//! - [`optimizer`] - The rewrite pipeline and join reordering
//! - [`predictor`] - Cost prediction with measured fallback
//! - [`analysis`] - Plan analysis, index advisory and profiling
//! - [`cache`] - The distributed cache facade and invalidation

pub mod analysis;
pub mod backend;
pub mod cache;
pub mod core;
pub mod optimizer;
pub mod predictor;
pub mod query;

// Re-export main types for convenience
pub use core::{EngineConfig, EntityMeta, Error, ResultSet, Result, Row, SchemaCatalog, Value};

pub use query::{
    CompareOp, FieldRef, Predicate, Query, QueryBuilder, QueryExpression, SortKey,
};

pub use backend::{
    CacheStore, ChangeSet, ChangeState, EntityChange, ExpirationPolicy, MemoryCacheStore,
    MemoryReverseIndex, PlanTraceProvider, PlanTraceRow, QueryExecutor, ReverseIndexStore,
    StatisticsProvider,
};

pub use optimizer::{JoinReorderer, OptimizationReport, QueryOptimizer};

pub use predictor::{
    CostModel, LinearModel, PerformancePredictor, PerformancePrediction, QueryFeatures,
    TrainingSample,
};

pub use analysis::{
    Bottleneck, BottleneckKind, IndexAdvisor, PlanAnalysis, PlanAnalyzer, PlanStep,
    ProfilerReport, QueryProfiler,
};

pub use cache::{
    BatchExecutor, CacheKeyDeriver, CacheOptions, CacheStatsSnapshot, DistributedCache,
};
