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

//! Fluent query builder
//!
//! Builds a [`Query`] tree without hand-assembling nodes. Filters and
//! joins apply immediately; ordering, grouping, projection and paging
//! accumulate and wrap the tree at `build()` time in a fixed order, so
//! the same call sequence always produces the same tree.

use crate::core::{Result, Value};
use crate::query::ast::{CompareOp, FieldRef, Predicate, Query, QueryExpression, SortKey};

/// Fluent builder over the query AST
#[derive(Debug)]
pub struct QueryBuilder {
    root: QueryExpression,
    order: Vec<SortKey>,
    group: Option<FieldRef>,
    projection: Option<Vec<String>>,
    limit: Option<u64>,
    offset: Option<u64>,
    distinct: bool,
}

impl QueryBuilder {
    /// Start a query from a base table
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            root: QueryExpression::source(table),
            order: Vec::new(),
            group: None,
            projection: None,
            limit: None,
            offset: None,
            distinct: false,
        }
    }

    /// Add a filter predicate
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.root = self.root.filter(predicate);
        self
    }

    /// Add a filter built from a field name, operator token and value
    ///
    /// The token goes through [`CompareOp::parse_token`]; an unknown
    /// operator is an error, never a silently dropped filter.
    pub fn filter_by(
        self,
        field: impl Into<String>,
        op_token: &str,
        value: impl Into<Value>,
    ) -> Result<Self> {
        let op = CompareOp::parse_token(op_token)?;
        Ok(self.filter(Predicate::compare(FieldRef::new(field), op, value)))
    }

    /// Join another table on an equality condition
    pub fn join(
        mut self,
        table: impl Into<String>,
        left_key: FieldRef,
        right_key: FieldRef,
    ) -> Self {
        self.root = self
            .root
            .join(QueryExpression::source(table), left_key, right_key);
        self
    }

    /// Add an order-by key; keys apply in declaration order
    pub fn order_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        let field = FieldRef::new(field);
        self.order.push(if ascending {
            SortKey::asc(field)
        } else {
            SortKey::desc(field)
        });
        self
    }

    /// Group by a key field
    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group = Some(FieldRef::new(field));
        self
    }

    /// Project to a field list
    pub fn select(mut self, fields: Vec<String>) -> Self {
        self.projection = Some(fields);
        self
    }

    /// Limit the number of rows
    pub fn take(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }

    /// Skip leading rows
    pub fn skip(mut self, count: u64) -> Self {
        self.offset = Some(count);
        self
    }

    /// Eliminate duplicate rows
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Assemble the final query tree
    pub fn build(self) -> Query {
        let mut expr = self.root;
        if let Some(key) = self.group {
            expr = expr.group_by(key);
        }
        if !self.order.is_empty() {
            expr = expr.order_by(self.order);
        }
        if let Some(fields) = self.projection {
            expr = expr.project(fields);
        }
        if self.distinct {
            expr = expr.distinct();
        }
        if let Some(n) = self.offset {
            expr = expr.offset(n);
        }
        if let Some(n) = self.limit {
            expr = expr.limit(n);
        }
        Query::new(expr)
    }
}
