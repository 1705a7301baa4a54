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

//! Core types: errors, values, rows, schema metadata, configuration

pub mod config;
pub mod error;
pub mod row;
pub mod schema;
pub mod value;

pub use config::{EngineConfig, DEFAULT_CONFIDENCE_THRESHOLD};
pub use error::{Error, Result};
pub use row::{ResultSet, Row};
pub use schema::{EntityMeta, SchemaCatalog, ENTITY_ID_SEPARATOR};
pub use value::{escape_sql_string, Value};
