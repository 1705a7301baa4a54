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

//! Execution-plan analysis
//!
//! Turns a raw plan trace from the storage collaborator into structured
//! findings. The detail markers match what the engine's EXPLAIN output
//! prints; everything here is pattern matching over that text, no plan
//! semantics are re-derived.

use tracing::warn;

use crate::backend::PlanTraceProvider;
use crate::query::{canonical, Query};

/// Marker for a full table scan
pub const MARKER_FULL_SCAN: &str = "SCAN TABLE";
/// Marker for an indexed search
pub const MARKER_SEARCH: &str = "SEARCH TABLE";
/// Marker for temporary sort/group structure creation
pub const MARKER_TEMP_BTREE: &str = "TEMP B-TREE";
/// Marker for temporary structure reuse
pub const MARKER_TEMP_BTREE_USE: &str = "USE TEMP B-TREE";
/// Marker for an embedded subquery
pub const MARKER_SUBQUERY: &str = "SUBQUERY";
/// Marker for an unconditioned cross product
pub const MARKER_CROSS_JOIN: &str = "CROSS JOIN";
/// Marker for index usage
pub const MARKER_INDEX: &str = "INDEX";
/// Marker for a search step
pub const MARKER_SEARCH_WORD: &str = "SEARCH";

/// One step of an execution-plan trace
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    pub id: i64,
    pub parent: i64,
    pub detail: String,
}

/// Bottleneck categories found in a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BottleneckKind {
    FullTableScan,
    TempStructureCreation,
    TempStructureUse,
    Subquery,
}

/// A bottleneck finding, tied to the step it was found on
#[derive(Debug, Clone, PartialEq)]
pub struct Bottleneck {
    pub step_id: i64,
    pub kind: BottleneckKind,
    pub description: String,
}

/// Structured result of plan analysis
#[derive(Debug, Clone, Default)]
pub struct PlanAnalysis {
    /// Canonical text of the analyzed query
    pub query_text: String,
    /// Trace steps in plan order
    pub steps: Vec<PlanStep>,
    /// Bottleneck findings
    pub bottlenecks: Vec<Bottleneck>,
    /// Advisory suggestion texts
    pub suggestions: Vec<String>,
    /// Relative complexity score; only meaningful for ranking
    pub complexity: u64,
}

/// Analyzer over the plan-trace collaborator
pub struct PlanAnalyzer {
    trace: std::sync::Arc<dyn PlanTraceProvider>,
}

impl PlanAnalyzer {
    /// Create an analyzer over a trace provider
    pub fn new(trace: std::sync::Arc<dyn PlanTraceProvider>) -> Self {
        Self { trace }
    }

    /// Analyze a query's execution plan
    ///
    /// A collaborator failure degrades to an empty analysis; it never
    /// propagates to the caller.
    pub fn analyze(&self, query: &Query) -> PlanAnalysis {
        let query_text = canonical::query_text(query);
        let steps = match self.trace.explain(&query_text) {
            Ok(rows) => rows
                .into_iter()
                .map(|row| PlanStep {
                    id: row.id,
                    parent: row.parent,
                    detail: row.detail,
                })
                .collect(),
            Err(e) => {
                warn!(query = %query_text, "plan trace unavailable: {}", e);
                Vec::new()
            }
        };

        let bottlenecks = identify_bottlenecks(&steps);
        let suggestions = suggest_optimizations(&steps, &bottlenecks);
        let complexity = estimate_complexity(&steps);

        PlanAnalysis {
            query_text,
            steps,
            bottlenecks,
            suggestions,
            complexity,
        }
    }
}

/// Pattern-match each step's detail against the known bottleneck markers
///
/// A step can produce several findings; `USE TEMP B-TREE` also contains
/// the creation marker and reports both, matching the engine's output
/// where reuse implies a prior build.
pub fn identify_bottlenecks(steps: &[PlanStep]) -> Vec<Bottleneck> {
    let mut findings = Vec::new();
    for step in steps {
        if step.detail.contains(MARKER_FULL_SCAN) {
            findings.push(Bottleneck {
                step_id: step.id,
                kind: BottleneckKind::FullTableScan,
                description: format!("Full table scan detected on step {}", step.id),
            });
        }
        if step.detail.contains(MARKER_TEMP_BTREE) {
            findings.push(Bottleneck {
                step_id: step.id,
                kind: BottleneckKind::TempStructureCreation,
                description: format!("Temporary B-tree creation detected on step {}", step.id),
            });
        }
        if step.detail.contains(MARKER_TEMP_BTREE_USE) {
            findings.push(Bottleneck {
                step_id: step.id,
                kind: BottleneckKind::TempStructureUse,
                description: format!("Usage of temporary B-tree detected on step {}", step.id),
            });
        }
        if step.detail.contains(MARKER_SUBQUERY) {
            findings.push(Bottleneck {
                step_id: step.id,
                kind: BottleneckKind::Subquery,
                description: format!("Subquery detected on step {}", step.id),
            });
        }
    }
    findings
}

/// Map bottleneck categories to fixed advisory texts
pub fn suggest_optimizations(steps: &[PlanStep], bottlenecks: &[Bottleneck]) -> Vec<String> {
    let mut suggestions = Vec::new();
    for bottleneck in bottlenecks {
        match bottleneck.kind {
            BottleneckKind::FullTableScan => suggestions
                .push("Consider adding an index to avoid full table scan".to_string()),
            BottleneckKind::TempStructureCreation | BottleneckKind::TempStructureUse => {
                suggestions.push(
                    "Consider optimizing the query to avoid temporary B-tree creation"
                        .to_string(),
                )
            }
            BottleneckKind::Subquery => suggestions
                .push("Consider rewriting the query to avoid subqueries if possible".to_string()),
        }
    }

    if steps.iter().any(|s| s.detail.contains(MARKER_CROSS_JOIN)) {
        suggestions.push(
            "Potential missing JOIN condition detected. Verify all JOINs have proper conditions."
                .to_string(),
        );
    }

    if steps.iter().any(|s| s.detail.contains(MARKER_INDEX))
        && steps.iter().any(|s| s.detail.contains(MARKER_SEARCH_WORD))
    {
        suggestions.push(
            "Consider creating a covering index to include all required columns".to_string(),
        );
    }

    suggestions
}

/// Weighted step count: steps + 10·scans + 2·searches + 5·subqueries + 3·temp structures
pub fn estimate_complexity(steps: &[PlanStep]) -> u64 {
    let count = |marker: &str| steps.iter().filter(|s| s.detail.contains(marker)).count() as u64;
    steps.len() as u64
        + count(MARKER_FULL_SCAN) * 10
        + count(MARKER_SEARCH) * 2
        + count(MARKER_SUBQUERY) * 5
        + count(MARKER_TEMP_BTREE) * 3
}
