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

//! External collaborator interfaces
//!
//! The engine accelerates a relational store it does not own. Everything
//! it needs from the outside world goes through the traits in this
//! module: the key/value cache store, the query executor, table
//! statistics, execution-plan traces and the persisted cache-key reverse
//! index. In-memory reference implementations live in [`memory`].

pub mod memory;

use std::time::Duration;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;

use crate::core::{ResultSet, Result, Value};
use crate::query::Query;

pub use memory::{MemoryCacheStore, MemoryReverseIndex};

/// Expiration policy for a cache entry
#[derive(Debug, Clone, PartialEq)]
pub enum ExpirationPolicy {
    /// Entry expires this long after its last access
    Sliding(Duration),
    /// Entry expires at a fixed point in time
    Absolute(DateTime<Utc>),
}

/// Key/value cache store with TTL support
///
/// Any store with get/set/remove and expiration satisfies the contract;
/// the engine never enumerates keys.
pub trait CacheStore: Send + Sync {
    /// Fetch a payload; `None` is a miss
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a payload under an expiration policy
    fn set(&self, key: &str, payload: Vec<u8>, policy: ExpirationPolicy) -> Result<()>;

    /// Remove a key; removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Query executor against the backing relational store
pub trait QueryExecutor: Send + Sync {
    /// Execute a query and materialize its rows
    fn execute(&self, query: &Query) -> Result<ResultSet>;

    /// Execute a query streaming rows to nowhere, for timing measurement
    fn load(&self, query: &Query) -> Result<()> {
        self.execute(query).map(|_| ())
    }
}

/// Table statistics used for join cardinality estimation
pub trait StatisticsProvider: Send + Sync {
    /// Row count of a table
    fn row_count(&self, table: &str) -> Result<u64>;

    /// Distinct value count of a column
    fn distinct_values(&self, table: &str, column: &str) -> Result<u64>;
}

/// One row of an execution-plan trace
#[derive(Debug, Clone, PartialEq)]
pub struct PlanTraceRow {
    pub id: i64,
    pub parent: i64,
    pub detail: String,
}

impl PlanTraceRow {
    /// Create a trace row
    pub fn new(id: i64, parent: i64, detail: impl Into<String>) -> Self {
        Self {
            id,
            parent,
            detail: detail.into(),
        }
    }
}

/// Execution-plan trace source
pub trait PlanTraceProvider: Send + Sync {
    /// Explain a query, returning trace rows in plan order
    fn explain(&self, query_text: &str) -> Result<Vec<PlanTraceRow>>;
}

/// Persisted reverse index from tables/entities to cache keys
///
/// Row shape: (table_name, entity_id or null, cache_key). Implementations
/// must upsert per row; a writer for one (table, key) pair must never
/// clobber concurrent writers for other pairs.
pub trait ReverseIndexStore: Send + Sync {
    /// Insert or refresh one mapping row
    fn upsert(&self, table: &str, entity_id: Option<&str>, cache_key: &str) -> Result<()>;

    /// All cache keys mapped under a table, coarse and row-precise alike
    fn keys_for_table(&self, table: &str) -> Result<Vec<String>>;

    /// Cache keys of coarse rows only (entity id null) for a table
    fn coarse_keys_for_table(&self, table: &str) -> Result<Vec<String>>;

    /// Cache keys mapped under a (table, entity id) pair (row-precise)
    fn keys_for_entity(&self, table: &str, entity_id: &str) -> Result<Vec<String>>;

    /// Remove every mapping row for a cache key
    fn remove_key(&self, cache_key: &str) -> Result<()>;
}

/// State of a changed entity in a post-commit change set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeState {
    Added,
    Modified,
    Deleted,
}

/// One changed entity reported by the change-feed collaborator
///
/// The entity arrives as plain column values, already sanitized by the
/// upstream layers; the engine only reads primary-key columns from it.
#[derive(Debug, Clone)]
pub struct EntityChange {
    /// Logical entity type name, resolved through the schema catalog
    pub entity_type: String,
    /// Change state after commit
    pub state: ChangeState,
    /// Column values of the changed entity
    pub values: FxHashMap<String, Value>,
}

impl EntityChange {
    /// Create a change entry
    pub fn new(
        entity_type: impl Into<String>,
        state: ChangeState,
        values: FxHashMap<String, Value>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            state,
            values,
        }
    }
}

/// A post-commit set of entity changes
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub entries: Vec<EntityChange>,
}

impl ChangeSet {
    /// Create a change set from entries
    pub fn new(entries: Vec<EntityChange>) -> Self {
        Self { entries }
    }
}
