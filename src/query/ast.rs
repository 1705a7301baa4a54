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

//! Query AST
//!
//! A query is a closed tagged tree. Every transform in the optimizer
//! pipeline consumes a tree and produces a new one; nothing mutates a
//! node in place and no stage aliases another stage's tree.

use rustc_hash::FxHashSet;

use crate::core::{Error, Result, Value};

/// A reference to a field, optionally qualified by table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Qualifying table name, if any
    pub table: Option<String>,
    /// Column name
    pub name: String,
}

impl FieldRef {
    /// Create an unqualified field reference
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    /// Create a table-qualified field reference
    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }
}

/// Closed set of comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    StartsWith,
    EndsWith,
}

impl CompareOp {
    /// Parse an operator token as used by dynamic query construction
    ///
    /// Unknown tokens fail fast with an unsupported-operation error; they
    /// are never coerced to a default.
    pub fn parse_token(token: &str) -> Result<Self> {
        match token.to_ascii_lowercase().as_str() {
            "eq" | "==" | "=" => Ok(CompareOp::Eq),
            "neq" | "!=" | "<>" => Ok(CompareOp::NotEq),
            "gt" | ">" => Ok(CompareOp::Gt),
            "gte" | ">=" => Ok(CompareOp::Gte),
            "lt" | "<" => Ok(CompareOp::Lt),
            "lte" | "<=" => Ok(CompareOp::Lte),
            "contains" => Ok(CompareOp::Contains),
            "startswith" => Ok(CompareOp::StartsWith),
            "endswith" => Ok(CompareOp::EndsWith),
            other => Err(Error::unsupported(other.to_string())),
        }
    }

    /// SQL symbol for plain comparison operators
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => "LIKE",
        }
    }
}

/// Predicate tree for filters and invalidation
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Field-operator-literal comparison
    Compare {
        field: FieldRef,
        op: CompareOp,
        value: Value,
    },
    /// Conjunction
    And(Box<Predicate>, Box<Predicate>),
    /// Disjunction
    Or(Box<Predicate>, Box<Predicate>),
    /// Negation
    Not(Box<Predicate>),
    /// Membership test against an in-memory collection (inefficient idiom,
    /// rewritten by the optimizer into `AnyMatch`)
    Membership { field: FieldRef, values: Vec<Value> },
    /// Existential ANY-form membership (the rewritten shape)
    AnyMatch { field: FieldRef, values: Vec<Value> },
    /// IS NULL check
    IsNull(FieldRef),
    /// IS NOT NULL check
    IsNotNull(FieldRef),
}

impl Predicate {
    /// Build an equality comparison
    pub fn eq(field: FieldRef, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field,
            op: CompareOp::Eq,
            value: value.into(),
        }
    }

    /// Build a comparison with an explicit operator
    pub fn compare(field: FieldRef, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field,
            op,
            value: value.into(),
        }
    }

    /// Conjoin with another predicate
    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// Disjoin with another predicate
    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    /// Collect every field reference in the tree, in encounter order
    pub fn fields(&self) -> Vec<&FieldRef> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a FieldRef>) {
        match self {
            Predicate::Compare { field, .. }
            | Predicate::Membership { field, .. }
            | Predicate::AnyMatch { field, .. }
            | Predicate::IsNull(field)
            | Predicate::IsNotNull(field) => out.push(field),
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.collect_fields(out);
                r.collect_fields(out);
            }
            Predicate::Not(inner) => inner.collect_fields(out),
        }
    }

    /// Tables referenced by field accesses in this predicate
    ///
    /// Only qualified field references name a table; unqualified fields
    /// belong to whatever source the enclosing query filters.
    pub fn referenced_tables(&self) -> FxHashSet<String> {
        self.fields()
            .into_iter()
            .filter_map(|f| f.table.clone())
            .collect()
    }

    /// Collect (field, value) pairs pinned by equality through the
    /// conjunctive spine of the predicate
    ///
    /// Descends only through `And` nodes: an equality under `Or` or `Not`
    /// does not pin a row.
    pub fn conjunctive_equalities(&self) -> Vec<(&FieldRef, &Value)> {
        let mut out = Vec::new();
        self.collect_equalities(&mut out);
        out
    }

    fn collect_equalities<'a>(&'a self, out: &mut Vec<(&'a FieldRef, &'a Value)>) {
        match self {
            Predicate::Compare {
                field,
                op: CompareOp::Eq,
                value,
            } => out.push((field, value)),
            Predicate::And(l, r) => {
                l.collect_equalities(out);
                r.collect_equalities(out);
            }
            _ => {}
        }
    }
}

/// Sort key for ORDER BY
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: FieldRef,
    pub ascending: bool,
}

impl SortKey {
    /// Ascending sort on a field
    pub fn asc(field: FieldRef) -> Self {
        Self {
            field,
            ascending: true,
        }
    }

    /// Descending sort on a field
    pub fn desc(field: FieldRef) -> Self {
        Self {
            field,
            ascending: false,
        }
    }
}

/// Closed tagged query tree
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpression {
    /// Base table scan
    Source { table: String },
    /// Row filter
    Filter {
        input: Box<QueryExpression>,
        predicate: Predicate,
    },
    /// Equi-join of two subtrees
    Join {
        left: Box<QueryExpression>,
        right: Box<QueryExpression>,
        left_key: FieldRef,
        right_key: FieldRef,
    },
    /// Ordering
    OrderBy {
        input: Box<QueryExpression>,
        keys: Vec<SortKey>,
    },
    /// Grouping by a key expression
    GroupBy {
        input: Box<QueryExpression>,
        key: FieldRef,
    },
    /// Projection to a field list
    Project {
        input: Box<QueryExpression>,
        fields: Vec<String>,
    },
    /// Row limit
    Limit {
        input: Box<QueryExpression>,
        count: u64,
    },
    /// Row offset
    Offset {
        input: Box<QueryExpression>,
        count: u64,
    },
    /// Duplicate elimination
    Distinct { input: Box<QueryExpression> },
}

impl QueryExpression {
    /// Create a base table scan
    pub fn source(table: impl Into<String>) -> Self {
        QueryExpression::Source {
            table: table.into(),
        }
    }

    /// Wrap in a filter
    pub fn filter(self, predicate: Predicate) -> Self {
        QueryExpression::Filter {
            input: Box::new(self),
            predicate,
        }
    }

    /// Join against another subtree
    pub fn join(self, right: QueryExpression, left_key: FieldRef, right_key: FieldRef) -> Self {
        QueryExpression::Join {
            left: Box::new(self),
            right: Box::new(right),
            left_key,
            right_key,
        }
    }

    /// Wrap in an ordering
    pub fn order_by(self, keys: Vec<SortKey>) -> Self {
        QueryExpression::OrderBy {
            input: Box::new(self),
            keys,
        }
    }

    /// Wrap in a grouping
    pub fn group_by(self, key: FieldRef) -> Self {
        QueryExpression::GroupBy {
            input: Box::new(self),
            key,
        }
    }

    /// Wrap in a projection
    pub fn project(self, fields: Vec<String>) -> Self {
        QueryExpression::Project {
            input: Box::new(self),
            fields,
        }
    }

    /// Wrap in a limit
    pub fn limit(self, count: u64) -> Self {
        QueryExpression::Limit {
            input: Box::new(self),
            count,
        }
    }

    /// Wrap in an offset
    pub fn offset(self, count: u64) -> Self {
        QueryExpression::Offset {
            input: Box::new(self),
            count,
        }
    }

    /// Wrap in duplicate elimination
    pub fn distinct(self) -> Self {
        QueryExpression::Distinct {
            input: Box::new(self),
        }
    }

    /// The single input of a wrapper node, if this node has one
    ///
    /// `Source` has none and `Join` has two, so both return `None`.
    pub fn input(&self) -> Option<&QueryExpression> {
        match self {
            QueryExpression::Filter { input, .. }
            | QueryExpression::OrderBy { input, .. }
            | QueryExpression::GroupBy { input, .. }
            | QueryExpression::Project { input, .. }
            | QueryExpression::Limit { input, .. }
            | QueryExpression::Offset { input, .. }
            | QueryExpression::Distinct { input } => Some(input),
            QueryExpression::Source { .. } | QueryExpression::Join { .. } => None,
        }
    }

    /// The leftmost base table of this subtree
    pub fn base_table(&self) -> Option<&str> {
        match self {
            QueryExpression::Source { table } => Some(table),
            QueryExpression::Join { left, .. } => left.base_table(),
            other => other.input().and_then(|i| i.base_table()),
        }
    }

    /// Every table this tree depends on: sources, join sides (including
    /// key qualifiers) and tables referenced inside filter predicates
    pub fn dependent_tables(&self) -> FxHashSet<String> {
        let mut out = FxHashSet::default();
        self.collect_tables(&mut out);
        out
    }

    fn collect_tables(&self, out: &mut FxHashSet<String>) {
        match self {
            QueryExpression::Source { table } => {
                out.insert(table.clone());
            }
            QueryExpression::Join {
                left,
                right,
                left_key,
                right_key,
            } => {
                left.collect_tables(out);
                right.collect_tables(out);
                if let Some(t) = &left_key.table {
                    out.insert(t.clone());
                }
                if let Some(t) = &right_key.table {
                    out.insert(t.clone());
                }
            }
            QueryExpression::Filter { input, predicate } => {
                input.collect_tables(out);
                out.extend(predicate.referenced_tables());
            }
            other => {
                if let Some(input) = other.input() {
                    input.collect_tables(out);
                }
            }
        }
    }
}

/// A query: the expression tree plus the read-only execution hint
///
/// The hint is set by normalization and consumed by the executor
/// collaborator; it does not participate in canonicalization or cache-key
/// derivation because it cannot change the result rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub expr: QueryExpression,
    pub read_only: bool,
}

impl Query {
    /// Create a query from an expression tree
    pub fn new(expr: QueryExpression) -> Self {
        Self {
            expr,
            read_only: false,
        }
    }

    /// Create a query with the read-only hint already set
    pub fn read_only(expr: QueryExpression) -> Self {
        Self {
            expr,
            read_only: true,
        }
    }

    /// Every table this query depends on
    pub fn dependent_tables(&self) -> FxHashSet<String> {
        self.expr.dependent_tables()
    }
}
