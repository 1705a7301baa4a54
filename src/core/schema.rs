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

//! Schema catalog for entity-to-table metadata
//!
//! The catalog is the engine's view of the external schema-metadata
//! collaborator: which table an entity type maps to, which columns form
//! its primary key, and which columns the table carries. It is built once
//! at startup and injected into the components that need it.

use rustc_hash::FxHashMap;

/// Separator used to join multi-column primary-key values into an entity id
pub const ENTITY_ID_SEPARATOR: &str = ",";

/// Metadata for a single mapped entity type
#[derive(Debug, Clone)]
pub struct EntityMeta {
    /// Logical entity type name (e.g. "Order")
    pub entity_type: String,
    /// Backing table name (e.g. "orders")
    pub table: String,
    /// Primary-key column names, in key order
    pub primary_key: Vec<String>,
    /// All column names of the table
    pub columns: Vec<String>,
}

/// Catalog of entity metadata, indexed by entity type and by table
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    by_entity: FxHashMap<String, EntityMeta>,
    table_to_entity: FxHashMap<String, String>,
}

impl SchemaCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type's metadata
    ///
    /// Re-registering an entity type replaces its previous mapping.
    pub fn register(&mut self, meta: EntityMeta) {
        self.table_to_entity
            .insert(meta.table.clone(), meta.entity_type.clone());
        self.by_entity.insert(meta.entity_type.clone(), meta);
    }

    /// Look up metadata by entity type name
    pub fn entity(&self, entity_type: &str) -> Option<&EntityMeta> {
        self.by_entity.get(entity_type)
    }

    /// Look up metadata by backing table name
    pub fn table(&self, table: &str) -> Option<&EntityMeta> {
        self.table_to_entity
            .get(table)
            .and_then(|entity| self.by_entity.get(entity))
    }

    /// Primary-key columns of a table, if the table is mapped
    pub fn primary_key_of(&self, table: &str) -> Option<&[String]> {
        self.table(table).map(|m| m.primary_key.as_slice())
    }

    /// Columns of a table, if the table is mapped
    pub fn columns_of(&self, table: &str) -> Option<&[String]> {
        self.table(table).map(|m| m.columns.as_slice())
    }

    /// Number of registered entity types
    pub fn len(&self) -> usize {
        self.by_entity.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }
}
