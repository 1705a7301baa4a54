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

//! Join reordering
//!
//! Extracts the join graph from a left-deep join chain, estimates each
//! join's output cardinality from table statistics, and rebuilds the
//! chain cheapest-first. Statistics failures fall back to the original
//! join order; reordering is an optimization, never a requirement.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::StatisticsProvider;
use crate::core::Result;
use crate::query::{FieldRef, Predicate, Query, QueryExpression, SortKey};

/// Fixed join selectivity used for cardinality estimation
///
/// A coarse heuristic: roughly one row in ten survives a join. Tune it
/// per deployment rather than treating it as a law.
pub const JOIN_SELECTIVITY: f64 = 0.1;

/// One edge of the join graph
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub left_table: String,
    pub right_table: String,
    pub left_key: FieldRef,
    pub right_key: FieldRef,
}

/// Wrapper nodes peeled off above the join core, outermost first
enum Wrapper {
    Filter(Predicate),
    OrderBy(Vec<SortKey>),
    GroupBy(FieldRef),
    Project(Vec<String>),
    Limit(u64),
    Offset(u64),
    Distinct,
}

/// Cardinality-based join reorderer
pub struct JoinReorderer {
    stats: Arc<dyn StatisticsProvider>,
}

impl JoinReorderer {
    /// Create a reorderer over a statistics provider
    pub fn new(stats: Arc<dyn StatisticsProvider>) -> Self {
        Self { stats }
    }

    /// Estimate a join's output cardinality from row counts
    pub fn estimate_cardinality(&self, spec: &JoinSpec) -> Result<u64> {
        let left_rows = self.stats.row_count(&spec.left_table)?;
        let right_rows = self.stats.row_count(&spec.right_table)?;
        Ok((left_rows as f64 * right_rows as f64 * JOIN_SELECTIVITY) as u64)
    }

    /// Reorder the query's joins ascending by estimated cardinality
    ///
    /// Only left-deep chains whose join targets are plain sources are
    /// rewritten; anything else (or any statistics failure) keeps the
    /// original order. Wrapper nodes above the chain are reapplied
    /// unchanged, preserving filter semantics.
    pub fn reorder(&self, query: Query) -> Query {
        let (wrappers, core) = peel_wrappers(query.expr);
        let read_only = query.read_only;

        let reordered_core = match extract_join_chain(&core) {
            Some((base, joins)) if joins.len() >= 2 => {
                let mut estimated: Vec<(u64, JoinSpec)> = Vec::with_capacity(joins.len());
                let mut failed = false;
                for spec in joins {
                    match self.estimate_cardinality(&spec) {
                        Ok(cardinality) => estimated.push((cardinality, spec)),
                        Err(e) => {
                            warn!(
                                left = %spec.left_table,
                                right = %spec.right_table,
                                "cardinality estimation failed, keeping original join order: {}",
                                e
                            );
                            failed = true;
                            break;
                        }
                    }
                }

                if failed {
                    core
                } else {
                    estimated.sort_by_key(|(cardinality, _)| *cardinality);
                    debug!(
                        order = ?estimated
                            .iter()
                            .map(|(c, s)| (s.right_table.clone(), *c))
                            .collect::<Vec<_>>(),
                        "joins reordered by estimated cardinality"
                    );
                    rebuild_chain(base, estimated.into_iter().map(|(_, s)| s))
                }
            }
            _ => core,
        };

        Query {
            expr: rewrap(wrappers, reordered_core),
            read_only,
        }
    }
}

/// Peel wrapper nodes down to the join/source core
fn peel_wrappers(expr: QueryExpression) -> (Vec<Wrapper>, QueryExpression) {
    let mut wrappers = Vec::new();
    let mut node = expr;
    loop {
        node = match node {
            QueryExpression::Filter { input, predicate } => {
                wrappers.push(Wrapper::Filter(predicate));
                *input
            }
            QueryExpression::OrderBy { input, keys } => {
                wrappers.push(Wrapper::OrderBy(keys));
                *input
            }
            QueryExpression::GroupBy { input, key } => {
                wrappers.push(Wrapper::GroupBy(key));
                *input
            }
            QueryExpression::Project { input, fields } => {
                wrappers.push(Wrapper::Project(fields));
                *input
            }
            QueryExpression::Limit { input, count } => {
                wrappers.push(Wrapper::Limit(count));
                *input
            }
            QueryExpression::Offset { input, count } => {
                wrappers.push(Wrapper::Offset(count));
                *input
            }
            QueryExpression::Distinct { input } => {
                wrappers.push(Wrapper::Distinct);
                *input
            }
            core => return (wrappers, core),
        };
    }
}

/// Reapply peeled wrappers around a rebuilt core
fn rewrap(wrappers: Vec<Wrapper>, core: QueryExpression) -> QueryExpression {
    let mut expr = core;
    for wrapper in wrappers.into_iter().rev() {
        expr = match wrapper {
            Wrapper::Filter(predicate) => expr.filter(predicate),
            Wrapper::OrderBy(keys) => expr.order_by(keys),
            Wrapper::GroupBy(key) => expr.group_by(key),
            Wrapper::Project(fields) => expr.project(fields),
            Wrapper::Limit(count) => expr.limit(count),
            Wrapper::Offset(count) => expr.offset(count),
            Wrapper::Distinct => expr.distinct(),
        };
    }
    expr
}

/// Extract (base table, join edges) from a left-deep join chain
///
/// Returns `None` when the core is not a plain chain (a join target that
/// is itself filtered or joined), in which case the order stays as-is.
fn extract_join_chain(core: &QueryExpression) -> Option<(String, Vec<JoinSpec>)> {
    match core {
        QueryExpression::Source { table } => Some((table.clone(), Vec::new())),
        QueryExpression::Join {
            left,
            right,
            left_key,
            right_key,
        } => {
            let right_table = match &**right {
                QueryExpression::Source { table } => table.clone(),
                _ => return None,
            };
            let (base, mut joins) = extract_join_chain(left)?;
            let left_table = left_key
                .table
                .clone()
                .unwrap_or_else(|| base.clone());
            joins.push(JoinSpec {
                left_table,
                right_table,
                left_key: left_key.clone(),
                right_key: right_key.clone(),
            });
            Some((base, joins))
        }
        _ => None,
    }
}

/// Rebuild a left-deep chain applying joins in the given order
fn rebuild_chain(base: String, joins: impl Iterator<Item = JoinSpec>) -> QueryExpression {
    let mut expr = QueryExpression::source(base);
    for spec in joins {
        expr = expr.join(
            QueryExpression::source(spec.right_table),
            spec.left_key,
            spec.right_key,
        );
    }
    expr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use crate::query::{expression_text, Predicate};
    use rustc_hash::FxHashMap;

    struct FixedStats {
        rows: FxHashMap<String, u64>,
    }

    impl FixedStats {
        fn new(rows: &[(&str, u64)]) -> Arc<Self> {
            Arc::new(Self {
                rows: rows
                    .iter()
                    .map(|(t, n)| (t.to_string(), *n))
                    .collect(),
            })
        }
    }

    impl StatisticsProvider for FixedStats {
        fn row_count(&self, table: &str) -> Result<u64> {
            self.rows
                .get(table)
                .copied()
                .ok_or_else(|| Error::statistics(format!("no stats for {}", table)))
        }

        fn distinct_values(&self, _table: &str, _column: &str) -> Result<u64> {
            Ok(0)
        }
    }

    struct BrokenStats;

    impl StatisticsProvider for BrokenStats {
        fn row_count(&self, _table: &str) -> Result<u64> {
            Err(Error::statistics("stats collector offline"))
        }

        fn distinct_values(&self, _table: &str, _column: &str) -> Result<u64> {
            Err(Error::statistics("stats collector offline"))
        }
    }

    fn three_join_query() -> Query {
        // base x a: 100, base x b: 10, base x c: 1000 (selectivity 0.1)
        Query::new(
            QueryExpression::source("base")
                .join(
                    QueryExpression::source("a"),
                    FieldRef::qualified("base", "a_id"),
                    FieldRef::qualified("a", "id"),
                )
                .join(
                    QueryExpression::source("b"),
                    FieldRef::qualified("base", "b_id"),
                    FieldRef::qualified("b", "id"),
                )
                .join(
                    QueryExpression::source("c"),
                    FieldRef::qualified("base", "c_id"),
                    FieldRef::qualified("c", "id"),
                ),
        )
    }

    fn stats_for_three() -> Arc<FixedStats> {
        FixedStats::new(&[("base", 10), ("a", 100), ("b", 10), ("c", 1000)])
    }

    #[test]
    fn test_cardinality_formula() {
        let reorderer = JoinReorderer::new(stats_for_three());
        let spec = JoinSpec {
            left_table: "base".to_string(),
            right_table: "a".to_string(),
            left_key: FieldRef::qualified("base", "a_id"),
            right_key: FieldRef::qualified("a", "id"),
        };
        // 10 * 100 * 0.1 = 100
        assert_eq!(reorderer.estimate_cardinality(&spec).unwrap(), 100);
    }

    #[test]
    fn test_joins_sorted_ascending_by_cardinality() {
        let reorderer = JoinReorderer::new(stats_for_three());
        let reordered = reorderer.reorder(three_join_query());

        // Cardinalities: a=100, b=10, c=1000 -> order b, a, c
        let (_, joins) = extract_join_chain(&reordered.expr).unwrap();
        let order: Vec<&str> = joins.iter().map(|j| j.right_table.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_reorder_preserves_wrappers() {
        let query = Query::new(
            three_join_query()
                .expr
                .filter(Predicate::eq(FieldRef::qualified("base", "status"), "Open"))
                .limit(5),
        );
        let reorderer = JoinReorderer::new(stats_for_three());
        let reordered = reorderer.reorder(query);

        let text = expression_text(&reordered.expr);
        assert!(text.contains("WHERE base.status = 'Open'"), "got: {}", text);
        assert!(text.contains("LIMIT 5"), "got: {}", text);
        assert!(
            text.contains("JOIN b ON base.b_id = b.id JOIN a ON base.a_id = a.id JOIN c"),
            "got: {}",
            text
        );
    }

    #[test]
    fn test_statistics_failure_keeps_original_order() {
        let reorderer = JoinReorderer::new(Arc::new(BrokenStats));
        let query = three_join_query();
        let before = expression_text(&query.expr);
        let reordered = reorderer.reorder(query);
        assert_eq!(expression_text(&reordered.expr), before);
    }

    #[test]
    fn test_single_join_is_left_alone() {
        let query = Query::new(QueryExpression::source("base").join(
            QueryExpression::source("a"),
            FieldRef::qualified("base", "a_id"),
            FieldRef::qualified("a", "id"),
        ));
        let before = expression_text(&query.expr);
        let reorderer = JoinReorderer::new(stats_for_three());
        assert_eq!(
            expression_text(&reorderer.reorder(query).expr),
            before
        );
    }

    #[test]
    fn test_non_chain_core_is_left_alone() {
        // Join target carries its own filter; not a plain chain
        let query = Query::new(QueryExpression::source("base").join(
            QueryExpression::source("a")
                .filter(Predicate::eq(FieldRef::qualified("a", "kind"), "x")),
            FieldRef::qualified("base", "a_id"),
            FieldRef::qualified("a", "id"),
        ));
        let before = expression_text(&query.expr);
        let reorderer = JoinReorderer::new(stats_for_three());
        assert_eq!(expression_text(&reorderer.reorder(query).expr), before);
    }
}
