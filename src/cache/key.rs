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

//! Cache-key derivation and the invalidation reverse index
//!
//! Keys are a digest of canonical query text under a fixed namespace
//! prefix, so any two trees that canonicalize identically share a key.
//! The deriver also owns the reverse index bookkeeping: which tables and
//! entities each cached key depends on, and the lookups invalidation
//! runs against that index. Index lookups fail softly: an unavailable
//! index yields fewer keys to invalidate, never an error.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::backend::{ChangeState, EntityChange, ReverseIndexStore};
use crate::core::{SchemaCatalog, Value, ENTITY_ID_SEPARATOR};
use crate::query::{canonical, FieldRef, Predicate, Query, QueryExpression};

/// Namespace prefix for every derived cache key
pub const KEY_NAMESPACE: &str = "query_";

/// Derives cache keys and maintains the invalidation reverse index
pub struct CacheKeyDeriver {
    index: Arc<dyn ReverseIndexStore>,
    catalog: Arc<SchemaCatalog>,
}

impl CacheKeyDeriver {
    /// Create a deriver over a reverse index and schema catalog
    pub fn new(index: Arc<dyn ReverseIndexStore>, catalog: Arc<SchemaCatalog>) -> Self {
        Self { index, catalog }
    }

    /// Derive the deterministic cache key for a query
    ///
    /// Canonicalization precedes hashing, so semantically equal trees
    /// (equal after normalization) produce the same key. Pure function,
    /// no index access.
    pub fn derive_key(&self, query: &Query) -> String {
        let canonical = canonical::query_text(query);
        let digest = Sha256::digest(canonical.as_bytes());
        format!("{}{}", KEY_NAMESPACE, BASE64.encode(digest))
    }

    /// Cache keys related to any table the predicate can filter on
    ///
    /// Unqualified fields name no table and resolve to nothing; unmapped
    /// tables and index failures yield an empty contribution.
    pub fn related_keys_for_predicate(&self, predicate: &Predicate) -> Vec<String> {
        let mut tables: Vec<String> = predicate
            .referenced_tables()
            .into_iter()
            .map(|t| t.to_lowercase())
            .collect();
        tables.sort();
        tables.dedup();

        let mut keys = Vec::new();
        for table in tables {
            match self.index.keys_for_table(&table) {
                Ok(found) => keys.extend(found),
                Err(e) => warn!(table = %table, "reverse index lookup failed: {}", e),
            }
        }
        keys.sort();
        keys.dedup();
        keys
    }

    /// Cache keys related to one changed entity
    ///
    /// Coarse table-wide mappings always match: a table-wide cached
    /// result can contain any row of the table. Row-precise mappings
    /// match only when the changed entity's primary key equals the
    /// mapping's entity id, which an added entity never can.
    pub fn related_keys_for_entity(&self, change: &EntityChange) -> Vec<String> {
        let Some(meta) = self.catalog.entity(&change.entity_type) else {
            warn!(
                entity_type = %change.entity_type,
                "entity type not in catalog; no keys resolved"
            );
            return Vec::new();
        };
        let table = meta.table.to_lowercase();

        let mut keys = match self.index.coarse_keys_for_table(&table) {
            Ok(found) => found,
            Err(e) => {
                warn!(table = %table, "reverse index lookup failed: {}", e);
                Vec::new()
            }
        };

        if change.state != ChangeState::Added {
            if let Some(entity_id) = entity_id_of(meta.primary_key.as_slice(), change) {
                match self.index.keys_for_entity(&table, &entity_id) {
                    Ok(found) => keys.extend(found),
                    Err(e) => warn!(table = %table, "reverse index lookup failed: {}", e),
                }
            } else {
                warn!(
                    entity_type = %change.entity_type,
                    "changed entity is missing primary-key values"
                );
            }
        }

        keys.sort();
        keys.dedup();
        keys
    }

    /// Record the reverse-index rows for a freshly cached key
    ///
    /// Each dependent table gets a coarse row, except tables whose
    /// primary key the query pins by equality: those get a row-precise
    /// mapping instead, so unrelated row changes leave the entry alone.
    /// Best-effort: index failures are logged and skipped.
    pub fn record_dependencies(&self, query: &Query, cache_key: &str) {
        let equalities = conjunctive_filter_equalities(&query.expr);
        let base_table = query.expr.base_table().map(str::to_string);

        let mut tables: Vec<String> = query.dependent_tables().into_iter().collect();
        tables.sort();
        for table in tables {
            let entity_id = self
                .primary_key_of(&table)
                .and_then(|pk| pinned_entity_id(pk, &equalities, &table, base_table.as_deref()));

            let row = self
                .index
                .upsert(&table.to_lowercase(), entity_id.as_deref(), cache_key);
            if let Err(e) = row {
                warn!(table = %table, key = %cache_key, "reverse index upsert failed: {}", e);
            }
        }
    }

    /// Drop every mapping row for a removed cache key
    pub fn prune_key(&self, cache_key: &str) -> crate::core::Result<()> {
        self.index.remove_key(cache_key)
    }

    fn primary_key_of(&self, table: &str) -> Option<&[String]> {
        self.catalog
            .primary_key_of(table)
            .or_else(|| self.catalog.primary_key_of(&table.to_lowercase()))
    }
}

/// Conjunctive equalities across every filter node of the tree
fn conjunctive_filter_equalities(expr: &QueryExpression) -> Vec<(FieldRef, Value)> {
    let mut out = Vec::new();
    collect_filter_equalities(expr, &mut out);
    out
}

fn collect_filter_equalities(expr: &QueryExpression, out: &mut Vec<(FieldRef, Value)>) {
    match expr {
        QueryExpression::Filter { input, predicate } => {
            out.extend(
                predicate
                    .conjunctive_equalities()
                    .into_iter()
                    .map(|(f, v)| (f.clone(), v.clone())),
            );
            collect_filter_equalities(input, out);
        }
        QueryExpression::Join { left, right, .. } => {
            collect_filter_equalities(left, out);
            collect_filter_equalities(right, out);
        }
        QueryExpression::Source { .. } => {}
        other => {
            if let Some(input) = other.input() {
                collect_filter_equalities(input, out);
            }
        }
    }
}

/// Entity id when every primary-key column of the table is pinned
///
/// Unqualified equality fields count for the query's base table only.
fn pinned_entity_id(
    primary_key: &[String],
    equalities: &[(FieldRef, Value)],
    table: &str,
    base_table: Option<&str>,
) -> Option<String> {
    if primary_key.is_empty() {
        return None;
    }
    let mut parts = Vec::with_capacity(primary_key.len());
    for pk_column in primary_key {
        let value = equalities.iter().find_map(|(field, value)| {
            let column_matches = field.name.eq_ignore_ascii_case(pk_column);
            let table_matches = match &field.table {
                Some(t) => t.eq_ignore_ascii_case(table),
                None => base_table
                    .map(|b| b.eq_ignore_ascii_case(table))
                    .unwrap_or(false),
            };
            (column_matches && table_matches).then(|| value.to_string())
        })?;
        parts.push(value);
    }
    Some(parts.join(ENTITY_ID_SEPARATOR))
}

/// Entity id of a changed entity from its primary-key values
fn entity_id_of(primary_key: &[String], change: &EntityChange) -> Option<String> {
    if primary_key.is_empty() {
        return None;
    }
    let mut parts = Vec::with_capacity(primary_key.len());
    for pk_column in primary_key {
        parts.push(change.values.get(pk_column)?.to_string());
    }
    Some(parts.join(ENTITY_ID_SEPARATOR))
}
