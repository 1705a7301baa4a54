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

//! Query AST, canonical rendering and the fluent builder

pub mod ast;
pub mod builder;
pub mod canonical;

pub use ast::{CompareOp, FieldRef, Predicate, Query, QueryExpression, SortKey};
pub use builder::QueryBuilder;
pub use canonical::{expression_text, field_text, predicate_text, query_text};
