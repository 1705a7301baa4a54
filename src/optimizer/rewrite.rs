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

//! Normalization and pattern rewriting
//!
//! Both stages are pure tree-to-tree functions. Normalization marks the
//! query read-only and pushes filters below projections where legal;
//! pattern rewriting replaces known-inefficient predicate idioms with
//! their efficient equivalents.

use crate::query::{Predicate, Query, QueryExpression};

/// Normalize a query: read-only marking plus predicate pushdown
///
/// Queries flowing through the cache never track entities, so the
/// read-only hint is always legal here. Pushdown runs to a fixed point:
/// a filter above a projection moves below it whenever the filter only
/// references projected fields.
pub fn normalize(query: Query) -> Query {
    let mut expr = query.expr;
    loop {
        let (rewritten, changed) = push_filters_down(expr);
        expr = rewritten;
        if !changed {
            break;
        }
    }
    Query::read_only(expr)
}

/// One pushdown pass over the tree; reports whether anything moved
fn push_filters_down(expr: QueryExpression) -> (QueryExpression, bool) {
    match expr {
        QueryExpression::Filter { input, predicate } => {
            let (input, changed) = push_filters_down(*input);
            match input {
                QueryExpression::Project { input: inner, fields }
                    if predicate_references_only(&predicate, &fields) =>
                {
                    let filtered = QueryExpression::Filter {
                        input: inner,
                        predicate,
                    };
                    (
                        QueryExpression::Project {
                            input: Box::new(filtered),
                            fields,
                        },
                        true,
                    )
                }
                other => (
                    QueryExpression::Filter {
                        input: Box::new(other),
                        predicate,
                    },
                    changed,
                ),
            }
        }
        QueryExpression::Join {
            left,
            right,
            left_key,
            right_key,
        } => {
            let (left, left_changed) = push_filters_down(*left);
            let (right, right_changed) = push_filters_down(*right);
            (
                QueryExpression::Join {
                    left: Box::new(left),
                    right: Box::new(right),
                    left_key,
                    right_key,
                },
                left_changed || right_changed,
            )
        }
        QueryExpression::Source { .. } => (expr, false),
        QueryExpression::OrderBy { input, keys } => {
            let (input, changed) = push_filters_down(*input);
            (
                QueryExpression::OrderBy {
                    input: Box::new(input),
                    keys,
                },
                changed,
            )
        }
        QueryExpression::GroupBy { input, key } => {
            let (input, changed) = push_filters_down(*input);
            (
                QueryExpression::GroupBy {
                    input: Box::new(input),
                    key,
                },
                changed,
            )
        }
        QueryExpression::Project { input, fields } => {
            let (input, changed) = push_filters_down(*input);
            (
                QueryExpression::Project {
                    input: Box::new(input),
                    fields,
                },
                changed,
            )
        }
        QueryExpression::Limit { input, count } => {
            let (input, changed) = push_filters_down(*input);
            (
                QueryExpression::Limit {
                    input: Box::new(input),
                    count,
                },
                changed,
            )
        }
        QueryExpression::Offset { input, count } => {
            let (input, changed) = push_filters_down(*input);
            (
                QueryExpression::Offset {
                    input: Box::new(input),
                    count,
                },
                changed,
            )
        }
        QueryExpression::Distinct { input } => {
            let (input, changed) = push_filters_down(*input);
            (
                QueryExpression::Distinct {
                    input: Box::new(input),
                },
                changed,
            )
        }
    }
}

/// Check that every field the predicate touches survives the projection
fn predicate_references_only(predicate: &Predicate, fields: &[String]) -> bool {
    predicate
        .fields()
        .iter()
        .all(|f| fields.iter().any(|p| p.eq_ignore_ascii_case(&f.name)))
}

/// Rewrite known-inefficient predicate idioms across the whole tree
///
/// The one rewrite today: a membership test against an in-memory
/// collection becomes its existential ANY-form, which the store can
/// evaluate without materializing the collection per row.
pub fn rewrite_patterns(query: Query) -> Query {
    Query {
        expr: rewrite_expr(query.expr),
        read_only: query.read_only,
    }
}

fn rewrite_expr(expr: QueryExpression) -> QueryExpression {
    match expr {
        QueryExpression::Filter { input, predicate } => QueryExpression::Filter {
            input: Box::new(rewrite_expr(*input)),
            predicate: rewrite_predicate(predicate),
        },
        QueryExpression::Join {
            left,
            right,
            left_key,
            right_key,
        } => QueryExpression::Join {
            left: Box::new(rewrite_expr(*left)),
            right: Box::new(rewrite_expr(*right)),
            left_key,
            right_key,
        },
        QueryExpression::Source { .. } => expr,
        QueryExpression::OrderBy { input, keys } => QueryExpression::OrderBy {
            input: Box::new(rewrite_expr(*input)),
            keys,
        },
        QueryExpression::GroupBy { input, key } => QueryExpression::GroupBy {
            input: Box::new(rewrite_expr(*input)),
            key,
        },
        QueryExpression::Project { input, fields } => QueryExpression::Project {
            input: Box::new(rewrite_expr(*input)),
            fields,
        },
        QueryExpression::Limit { input, count } => QueryExpression::Limit {
            input: Box::new(rewrite_expr(*input)),
            count,
        },
        QueryExpression::Offset { input, count } => QueryExpression::Offset {
            input: Box::new(rewrite_expr(*input)),
            count,
        },
        QueryExpression::Distinct { input } => QueryExpression::Distinct {
            input: Box::new(rewrite_expr(*input)),
        },
    }
}

fn rewrite_predicate(predicate: Predicate) -> Predicate {
    match predicate {
        Predicate::Membership { field, values } => Predicate::AnyMatch { field, values },
        Predicate::And(l, r) => Predicate::And(
            Box::new(rewrite_predicate(*l)),
            Box::new(rewrite_predicate(*r)),
        ),
        Predicate::Or(l, r) => Predicate::Or(
            Box::new(rewrite_predicate(*l)),
            Box::new(rewrite_predicate(*r)),
        ),
        Predicate::Not(inner) => Predicate::Not(Box::new(rewrite_predicate(*inner))),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::query::{expression_text, FieldRef};

    #[test]
    fn test_normalize_sets_read_only() {
        let query = Query::new(QueryExpression::source("orders"));
        assert!(!query.read_only);
        assert!(normalize(query).read_only);
    }

    #[test]
    fn test_pushdown_moves_filter_below_projection() {
        let expr = QueryExpression::source("orders")
            .project(vec!["id".to_string(), "status".to_string()])
            .filter(Predicate::eq(FieldRef::new("status"), "Open"));

        let normalized = normalize(Query::new(expr));
        match &normalized.expr {
            QueryExpression::Project { input, .. } => {
                assert!(matches!(**input, QueryExpression::Filter { .. }));
            }
            other => panic!("expected projection on top, got {:?}", other),
        }
    }

    #[test]
    fn test_pushdown_skips_unprojected_fields() {
        let expr = QueryExpression::source("orders")
            .project(vec!["id".to_string()])
            .filter(Predicate::eq(FieldRef::new("status"), "Open"));

        let normalized = normalize(Query::new(expr));
        // status is projected away, so the filter must stay on top
        assert!(matches!(normalized.expr, QueryExpression::Filter { .. }));
    }

    #[test]
    fn test_pushdown_through_stacked_filters() {
        let expr = QueryExpression::source("orders")
            .project(vec!["id".to_string(), "status".to_string()])
            .filter(Predicate::eq(FieldRef::new("status"), "Open"))
            .filter(Predicate::eq(FieldRef::new("id"), 1i64));

        let normalized = normalize(Query::new(expr));
        // Both filters end up below the projection
        match &normalized.expr {
            QueryExpression::Project { input, .. } => match &**input {
                QueryExpression::Filter { input, .. } => {
                    assert!(matches!(**input, QueryExpression::Filter { .. }));
                }
                other => panic!("expected stacked filters, got {:?}", other),
            },
            other => panic!("expected projection on top, got {:?}", other),
        }
    }

    #[test]
    fn test_membership_rewrites_to_any_match() {
        let values = vec![Value::Integer(1), Value::Integer(2)];
        let expr = QueryExpression::source("orders").filter(Predicate::Membership {
            field: FieldRef::new("id"),
            values: values.clone(),
        });

        let rewritten = rewrite_patterns(Query::new(expr));
        match &rewritten.expr {
            QueryExpression::Filter { predicate, .. } => {
                assert_eq!(
                    *predicate,
                    Predicate::AnyMatch {
                        field: FieldRef::new("id"),
                        values,
                    }
                );
            }
            other => panic!("expected filter, got {:?}", other),
        }
    }

    #[test]
    fn test_membership_rewrites_inside_conjunction() {
        let pred = Predicate::eq(FieldRef::new("status"), "Open").and(Predicate::Membership {
            field: FieldRef::new("id"),
            values: vec![Value::Integer(1)],
        });
        let expr = QueryExpression::source("orders").filter(pred);

        let rewritten = rewrite_patterns(Query::new(expr));
        let text = expression_text(&rewritten.expr);
        assert!(text.contains("id = ANY (1)"), "got: {}", text);
        assert!(!text.contains(" IN ("));
    }

    #[test]
    fn test_rewrite_leaves_other_predicates_alone() {
        let expr = QueryExpression::source("orders")
            .filter(Predicate::eq(FieldRef::new("status"), "Open"));
        let before = expression_text(&expr);
        let rewritten = rewrite_patterns(Query::new(expr));
        assert_eq!(expression_text(&rewritten.expr), before);
    }
}
