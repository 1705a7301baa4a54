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

//! Canonical query text
//!
//! Renders a query tree to a deterministic SQL-shaped string: uppercase
//! keywords, lowercase identifiers, single spaces, stable literal
//! formatting. Canonical text is the input to cache-key hashing, to the
//! predictor's feature extraction and to the plan-trace collaborator, so
//! two trees that render identically are treated as the same query
//! everywhere downstream.

use crate::core::{escape_sql_string, Value};
use crate::query::ast::{CompareOp, FieldRef, Predicate, Query, QueryExpression, SortKey};

/// Render a query's canonical text
pub fn query_text(query: &Query) -> String {
    expression_text(&query.expr)
}

/// Render an expression tree's canonical text
pub fn expression_text(expr: &QueryExpression) -> String {
    let mut distinct = false;
    let mut fields: Option<&[String]> = None;
    let mut filters: Vec<&Predicate> = Vec::new();
    let mut order: Option<&[SortKey]> = None;
    let mut group: Option<&FieldRef> = None;
    let mut limit: Option<u64> = None;
    let mut offset: Option<u64> = None;

    // Peel wrapper nodes down to the join/source core. For repeated
    // wrappers of the same kind the outermost wins, except filters which
    // all apply and are conjoined innermost-first.
    let mut node = expr;
    loop {
        match node {
            QueryExpression::Distinct { input } => {
                distinct = true;
                node = input;
            }
            QueryExpression::Project { input, fields: f } => {
                if fields.is_none() {
                    fields = Some(f);
                }
                node = input;
            }
            QueryExpression::Limit { input, count } => {
                if limit.is_none() {
                    limit = Some(*count);
                }
                node = input;
            }
            QueryExpression::Offset { input, count } => {
                if offset.is_none() {
                    offset = Some(*count);
                }
                node = input;
            }
            QueryExpression::OrderBy { input, keys } => {
                if order.is_none() {
                    order = Some(keys);
                }
                node = input;
            }
            QueryExpression::GroupBy { input, key } => {
                if group.is_none() {
                    group = Some(key);
                }
                node = input;
            }
            QueryExpression::Filter { input, predicate } => {
                filters.push(predicate);
                node = input;
            }
            QueryExpression::Source { .. } | QueryExpression::Join { .. } => break,
        }
    }

    let mut text = String::from("SELECT ");
    if distinct {
        text.push_str("DISTINCT ");
    }
    match fields {
        Some(f) if !f.is_empty() => {
            let rendered: Vec<String> = f.iter().map(|c| c.to_lowercase()).collect();
            text.push_str(&rendered.join(", "));
        }
        _ => text.push('*'),
    }
    text.push_str(" FROM ");
    text.push_str(&from_clause(node));

    if !filters.is_empty() {
        // Innermost filter first: it was applied first
        let conjoined: Vec<String> = filters.iter().rev().map(|p| predicate_text(p)).collect();
        text.push_str(" WHERE ");
        text.push_str(&conjoined.join(" AND "));
    }
    if let Some(key) = group {
        text.push_str(" GROUP BY ");
        text.push_str(&field_text(key));
    }
    if let Some(keys) = order {
        text.push_str(" ORDER BY ");
        let rendered: Vec<String> = keys
            .iter()
            .map(|k| {
                format!(
                    "{} {}",
                    field_text(&k.field),
                    if k.ascending { "ASC" } else { "DESC" }
                )
            })
            .collect();
        text.push_str(&rendered.join(", "));
    }
    if let Some(n) = limit {
        text.push_str(&format!(" LIMIT {}", n));
    }
    if let Some(n) = offset {
        text.push_str(&format!(" OFFSET {}", n));
    }
    text
}

/// Render the join/source core as a FROM clause
///
/// A join's right side renders by its base table; joins produced by the
/// builder and the reorderer always keep the right side a plain source.
fn from_clause(core: &QueryExpression) -> String {
    match core {
        QueryExpression::Source { table } => table.to_lowercase(),
        QueryExpression::Join {
            left,
            right,
            left_key,
            right_key,
        } => {
            let right_table = right
                .base_table()
                .map(|t| t.to_lowercase())
                .unwrap_or_else(|| "?".to_string());
            format!(
                "{} JOIN {} ON {} = {}",
                from_clause(left),
                right_table,
                field_text(left_key),
                field_text(right_key)
            )
        }
        // Wrapper nodes below a join core are folded into their input
        other => other
            .input()
            .map(from_clause)
            .unwrap_or_else(|| "?".to_string()),
    }
}

/// Render a field reference
pub fn field_text(field: &FieldRef) -> String {
    match &field.table {
        Some(table) => format!("{}.{}", table.to_lowercase(), field.name.to_lowercase()),
        None => field.name.to_lowercase(),
    }
}

/// Render a predicate tree
pub fn predicate_text(predicate: &Predicate) -> String {
    match predicate {
        Predicate::Compare { field, op, value } => match op {
            CompareOp::Contains => like_text(field, value, true, true),
            CompareOp::StartsWith => like_text(field, value, false, true),
            CompareOp::EndsWith => like_text(field, value, true, false),
            plain => format!(
                "{} {} {}",
                field_text(field),
                plain.symbol(),
                value.sql_literal()
            ),
        },
        Predicate::And(l, r) => format!("({} AND {})", predicate_text(l), predicate_text(r)),
        Predicate::Or(l, r) => format!("({} OR {})", predicate_text(l), predicate_text(r)),
        Predicate::Not(inner) => format!("NOT ({})", predicate_text(inner)),
        Predicate::Membership { field, values } => {
            format!("{} IN ({})", field_text(field), literal_list(values))
        }
        Predicate::AnyMatch { field, values } => {
            format!("{} = ANY ({})", field_text(field), literal_list(values))
        }
        Predicate::IsNull(field) => format!("{} IS NULL", field_text(field)),
        Predicate::IsNotNull(field) => format!("{} IS NOT NULL", field_text(field)),
    }
}

fn literal_list(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| v.sql_literal())
        .collect::<Vec<_>>()
        .join(", ")
}

fn like_text(field: &FieldRef, value: &Value, leading: bool, trailing: bool) -> String {
    let inner = match value {
        Value::Text(s) => escape_sql_string(s),
        other => escape_sql_string(&other.to_string()),
    };
    format!(
        "{} LIKE '{}{}{}'",
        field_text(field),
        if leading { "%" } else { "" },
        inner,
        if trailing { "%" } else { "" }
    )
}
