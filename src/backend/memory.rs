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

//! In-memory reference implementations of the store collaborators
//!
//! `MemoryCacheStore` honors sliding and absolute expiration the same way
//! a networked key/value store would, so the cache facade behaves
//! identically against either. `MemoryReverseIndex` keeps the mapping
//! rows that a production deployment would persist in a table.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::core::Result;

use super::{CacheStore, ExpirationPolicy, ReverseIndexStore};

/// Expiry bookkeeping for one stored entry
#[derive(Debug, Clone)]
enum Expiry {
    Sliding {
        window: Duration,
        last_access: Instant,
    },
    Absolute(DateTime<Utc>),
}

impl Expiry {
    fn from_policy(policy: ExpirationPolicy) -> Self {
        match policy {
            ExpirationPolicy::Sliding(window) => Expiry::Sliding {
                window,
                last_access: Instant::now(),
            },
            ExpirationPolicy::Absolute(at) => Expiry::Absolute(at),
        }
    }

    fn is_expired(&self) -> bool {
        match self {
            Expiry::Sliding {
                window,
                last_access,
            } => last_access.elapsed() > *window,
            Expiry::Absolute(at) => Utc::now() >= *at,
        }
    }

    /// Sliding entries refresh their window on access
    fn touch(&mut self) {
        if let Expiry::Sliding { last_access, .. } = self {
            *last_access = Instant::now();
        }
    }
}

#[derive(Debug)]
struct StoredEntry {
    payload: Vec<u8>,
    expiry: Expiry,
}

/// Thread-safe in-memory cache store with TTL support
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<FxHashMap<String, StoredEntry>>,
}

impl MemoryCacheStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (possibly expired but not yet reaped) entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(entry) if entry.expiry.is_expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => {
                entry.expiry.touch();
                Ok(Some(entry.payload.clone()))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, payload: Vec<u8>, policy: ExpirationPolicy) -> Result<()> {
        self.entries.write().insert(
            key.to_string(),
            StoredEntry {
                payload,
                expiry: Expiry::from_policy(policy),
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// In-memory reverse index over (table, entity id, cache key) rows
#[derive(Default)]
pub struct MemoryReverseIndex {
    /// table -> set of (entity_id, cache_key) rows
    rows: RwLock<FxHashMap<String, FxHashSet<(Option<String>, String)>>>,
}

impl MemoryReverseIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of mapping rows
    pub fn row_count(&self) -> usize {
        self.rows.read().values().map(|set| set.len()).sum()
    }
}

impl ReverseIndexStore for MemoryReverseIndex {
    fn upsert(&self, table: &str, entity_id: Option<&str>, cache_key: &str) -> Result<()> {
        self.rows
            .write()
            .entry(table.to_string())
            .or_default()
            .insert((entity_id.map(str::to_string), cache_key.to_string()));
        Ok(())
    }

    fn keys_for_table(&self, table: &str) -> Result<Vec<String>> {
        let rows = self.rows.read();
        let mut keys: Vec<String> = rows
            .get(table)
            .map(|set| set.iter().map(|(_, key)| key.clone()).collect())
            .unwrap_or_default();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn coarse_keys_for_table(&self, table: &str) -> Result<Vec<String>> {
        let rows = self.rows.read();
        let mut keys: Vec<String> = rows
            .get(table)
            .map(|set| {
                set.iter()
                    .filter(|(id, _)| id.is_none())
                    .map(|(_, key)| key.clone())
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn keys_for_entity(&self, table: &str, entity_id: &str) -> Result<Vec<String>> {
        let rows = self.rows.read();
        let mut keys: Vec<String> = rows
            .get(table)
            .map(|set| {
                set.iter()
                    .filter(|(id, _)| id.as_deref() == Some(entity_id))
                    .map(|(_, key)| key.clone())
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn remove_key(&self, cache_key: &str) -> Result<()> {
        let mut rows = self.rows.write();
        for set in rows.values_mut() {
            set.retain(|(_, key)| key != cache_key);
        }
        rows.retain(|_, set| !set.is_empty());
        Ok(())
    }
}
