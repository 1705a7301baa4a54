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

//! Batch execution through the cache facade
//!
//! Runs a sequence of queries through `get_or_set`, so repeated queries
//! within one batch hit the cache like any other caller. The first error
//! aborts the batch.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::{ResultSet, Result};
use crate::query::Query;

use super::distributed::{CacheOptions, DistributedCache};

/// Executes query batches against the cache
pub struct BatchExecutor {
    cache: Arc<DistributedCache>,
}

impl BatchExecutor {
    /// Create a batch executor over a cache
    pub fn new(cache: Arc<DistributedCache>) -> Self {
        Self { cache }
    }

    /// Execute queries in order, returning their result sets in order
    pub fn execute_all(&self, queries: &[Query]) -> Result<Vec<ResultSet>> {
        let mut results = Vec::with_capacity(queries.len());
        for query in queries {
            results.push(self.cache.get_or_set(query, &CacheOptions::predicted())?);
        }
        Ok(results)
    }

    /// Execute named queries, returning results keyed by name
    pub fn execute_named(&self, queries: &[(String, Query)]) -> Result<FxHashMap<String, ResultSet>> {
        let mut results = FxHashMap::default();
        for (name, query) in queries {
            results.insert(
                name.clone(),
                self.cache.get_or_set(query, &CacheOptions::predicted())?,
            );
        }
        Ok(results)
    }
}
