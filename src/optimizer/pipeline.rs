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

//! The optimization pipeline
//!
//! Fixed stage order: normalize, pattern rewrite, join reorder. After the
//! tree is final, plan analysis, index advice and cost prediction run as
//! a diagnostics side channel; their failures degrade the report, never
//! the returned tree.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::analysis::{Bottleneck, IndexAdvisor, PlanAnalyzer};
use crate::backend::{PlanTraceProvider, QueryExecutor, StatisticsProvider};
use crate::core::SchemaCatalog;
use crate::predictor::{PerformancePredictor, PerformancePrediction};
use crate::query::{canonical, Query};

use super::join::JoinReorderer;
use super::rewrite::{normalize, rewrite_patterns};

/// Diagnostics produced alongside an optimized query
#[derive(Debug, Clone)]
pub struct OptimizationReport {
    /// Canonical text before optimization
    pub original_query: String,
    /// Canonical text after optimization
    pub optimized_query: String,
    /// Cost prediction for the optimized query, if the model cooperated
    pub prediction: Option<PerformancePrediction>,
    /// Plan bottleneck findings
    pub bottlenecks: Vec<Bottleneck>,
    /// Plan-level optimization suggestions
    pub suggestions: Vec<String>,
    /// Index advisory texts
    pub index_suggestions: Vec<String>,
}

/// Orchestrates the rewrite stages and the diagnostics side channel
pub struct QueryOptimizer {
    reorderer: JoinReorderer,
    analyzer: PlanAnalyzer,
    advisor: IndexAdvisor,
    predictor: Arc<PerformancePredictor>,
    executor: Arc<dyn QueryExecutor>,
}

impl QueryOptimizer {
    /// Wire the pipeline to its collaborators
    pub fn new(
        stats: Arc<dyn StatisticsProvider>,
        trace: Arc<dyn PlanTraceProvider>,
        catalog: Arc<SchemaCatalog>,
        predictor: Arc<PerformancePredictor>,
        executor: Arc<dyn QueryExecutor>,
    ) -> Self {
        Self {
            reorderer: JoinReorderer::new(stats),
            analyzer: PlanAnalyzer::new(trace),
            advisor: IndexAdvisor::new(catalog),
            predictor,
            executor,
        }
    }

    /// Run the fixed rewrite pipeline and assemble diagnostics
    pub fn optimize(&self, query: Query) -> (Query, OptimizationReport) {
        let original_query = canonical::query_text(&query);

        let query = normalize(query);
        let query = rewrite_patterns(query);
        let query = self.reorderer.reorder(query);

        let optimized_query = canonical::query_text(&query);

        let analysis = self.analyzer.analyze(&query);
        let index_suggestions = self.advisor.suggest(&analysis);
        let prediction = match self.predictor.predict(&query, self.executor.as_ref()) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(query = %optimized_query, "cost prediction unavailable: {}", e);
                None
            }
        };

        debug!(
            original = %original_query,
            optimized = %optimized_query,
            bottlenecks = analysis.bottlenecks.len(),
            index_suggestions = index_suggestions.len(),
            estimated_ms = prediction
                .as_ref()
                .map(|p| p.estimated_execution_time.as_secs_f64() * 1000.0),
            "query optimized"
        );

        let report = OptimizationReport {
            original_query,
            optimized_query,
            prediction,
            bottlenecks: analysis.bottlenecks,
            suggestions: analysis.suggestions,
            index_suggestions,
        };
        (query, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    use crate::backend::PlanTraceRow;
    use crate::core::{Error, ResultSet, Result, Value};
    use crate::query::{FieldRef, Predicate, QueryExpression};

    struct FixedStats {
        rows: FxHashMap<String, u64>,
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

    struct ScanTrace;

    impl PlanTraceProvider for ScanTrace {
        fn explain(&self, _query_text: &str) -> Result<Vec<PlanTraceRow>> {
            Ok(vec![PlanTraceRow::new(1, 0, "SCAN TABLE orders")])
        }
    }

    struct BrokenTrace;

    impl PlanTraceProvider for BrokenTrace {
        fn explain(&self, _query_text: &str) -> Result<Vec<PlanTraceRow>> {
            Err(Error::plan_trace("offline"))
        }
    }

    struct NullExecutor;

    impl QueryExecutor for NullExecutor {
        fn execute(&self, _query: &Query) -> Result<ResultSet> {
            Ok(ResultSet::empty(vec!["id".to_string()]))
        }
    }

    fn optimizer(trace: Arc<dyn PlanTraceProvider>) -> QueryOptimizer {
        let stats = Arc::new(FixedStats {
            rows: [("orders", 10u64), ("customers", 1000), ("items", 10)]
                .iter()
                .map(|(t, n)| (t.to_string(), *n))
                .collect(),
        });
        QueryOptimizer::new(
            stats,
            trace,
            Arc::new(SchemaCatalog::new()),
            Arc::new(PerformancePredictor::new(0.0)), // never fall back in tests
            Arc::new(NullExecutor),
        )
    }

    #[test]
    fn test_pipeline_applies_all_stages() {
        let query = Query::new(
            QueryExpression::source("orders")
                .join(
                    QueryExpression::source("customers"),
                    FieldRef::qualified("orders", "customer_id"),
                    FieldRef::qualified("customers", "id"),
                )
                .join(
                    QueryExpression::source("items"),
                    FieldRef::qualified("orders", "item_id"),
                    FieldRef::qualified("items", "id"),
                )
                .filter(Predicate::Membership {
                    field: FieldRef::qualified("orders", "status"),
                    values: vec![Value::from("Open"), Value::from("Held")],
                }),
        );

        let (optimized, report) = optimizer(Arc::new(ScanTrace)).optimize(query);

        // Read-only marking
        assert!(optimized.read_only);
        // Membership became ANY-form
        assert!(report.optimized_query.contains("= ANY ('Open', 'Held')"));
        // The cheaper items join (10x10) moved ahead of customers (10x1000)
        assert!(
            report.optimized_query.contains("JOIN items")
                && report.optimized_query.find("JOIN items").unwrap()
                    < report.optimized_query.find("JOIN customers").unwrap(),
            "got: {}",
            report.optimized_query
        );
        // Diagnostics came along
        assert!(!report.bottlenecks.is_empty());
        assert!(report.prediction.is_some());
        assert_ne!(report.original_query, report.optimized_query);
    }

    #[test]
    fn test_diagnostics_failure_keeps_ast() {
        let query = Query::new(
            QueryExpression::source("orders")
                .filter(Predicate::eq(FieldRef::new("status"), "Open")),
        );
        let (optimized, report) = optimizer(Arc::new(BrokenTrace)).optimize(query.clone());

        // The tree still went through normalization only; diagnostics are empty
        assert_eq!(
            canonical::query_text(&optimized),
            canonical::query_text(&query)
        );
        assert!(report.bottlenecks.is_empty());
        assert!(report.suggestions.is_empty());
        assert!(report.index_suggestions.is_empty());
    }
}
