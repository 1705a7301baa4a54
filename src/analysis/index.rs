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

//! Index advisory
//!
//! Derives index recommendations from plan-analysis steps by extracting
//! table and column names out of the detail text. Purely advisory: the
//! output is human-readable text, never DDL.

use std::sync::Arc;

use regex::Regex;
use rustc_hash::FxHashSet;

use crate::core::SchemaCatalog;

use super::plan::PlanAnalysis;

/// Covering-index marker: a scan that already uses one needs no advice
const MARKER_COVERING_INDEX: &str = "COVERING INDEX";

/// Index advisor over plan analyses
pub struct IndexAdvisor {
    catalog: Arc<SchemaCatalog>,
    scan_table: Regex,
    search_table: Regex,
    bound_column: Regex,
    order_by_table: Regex,
    order_by_columns: Regex,
    group_by_table: Regex,
    group_by_columns: Regex,
    join_table: Regex,
}

impl IndexAdvisor {
    /// Create an advisor; the catalog supplies column sets for
    /// foreign-key-shaped advice on join targets
    pub fn new(catalog: Arc<SchemaCatalog>) -> Self {
        // The patterns are fixed literals; compilation cannot fail
        Self {
            catalog,
            scan_table: Regex::new(r"SCAN TABLE (\w+)").unwrap(),
            search_table: Regex::new(r"SEARCH TABLE (\w+)").unwrap(),
            bound_column: Regex::new(r"(\w+)\s*=\s*\?").unwrap(),
            order_by_table: Regex::new(r"ORDER BY .*? ON (\w+)").unwrap(),
            order_by_columns: Regex::new(r"ORDER BY ([\w\s,]+)").unwrap(),
            group_by_table: Regex::new(r"GROUP BY .*? ON (\w+)").unwrap(),
            group_by_columns: Regex::new(r"GROUP BY ([\w\s,]+)").unwrap(),
            join_table: Regex::new(r"JOIN (\w+)").unwrap(),
        }
    }

    /// Derive deduplicated index suggestions from a plan analysis
    pub fn suggest(&self, analysis: &PlanAnalysis) -> Vec<String> {
        let mut suggestions = Vec::new();
        for step in &analysis.steps {
            self.analyze_step(&step.detail, &mut suggestions);
        }

        let mut seen = FxHashSet::default();
        suggestions.retain(|s| seen.insert(s.clone()));
        suggestions
    }

    fn analyze_step(&self, detail: &str, out: &mut Vec<String>) {
        if detail.contains("SCAN TABLE") && !detail.contains(MARKER_COVERING_INDEX) {
            if let Some(caps) = self.scan_table.captures(detail) {
                let table = &caps[1];
                out.push(format!(
                    "Consider adding an index for the scan on table {}",
                    table
                ));

                let columns = self.bound_columns(detail);
                if !columns.is_empty() {
                    out.push(format!(
                        "Suggested index for table {}: ({})",
                        table,
                        columns.join(", ")
                    ));
                }
            }
        }

        if detail.contains("SEARCH TABLE") {
            if let Some(caps) = self.search_table.captures(detail) {
                let table = &caps[1];
                let columns = self.bound_columns(detail);
                if columns.len() > 1 {
                    out.push(format!(
                        "Consider a composite index on table {}: ({})",
                        table,
                        columns.join(", ")
                    ));
                }
            }
        }

        if detail.contains("ORDER BY") {
            if let Some(caps) = self.order_by_table.captures(detail) {
                let table = caps[1].to_string();
                if let Some(cols) = self.order_by_columns.captures(detail) {
                    let columns: Vec<String> = cols[1]
                        .split(',')
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty())
                        .collect();
                    out.push(format!(
                        "Consider an index for ORDER BY on table {}: ({})",
                        table,
                        columns.join(", ")
                    ));
                }
            }
        }

        if detail.contains("GROUP BY") {
            if let Some(caps) = self.group_by_table.captures(detail) {
                let table = caps[1].to_string();
                if let Some(cols) = self.group_by_columns.captures(detail) {
                    let columns: Vec<String> = cols[1]
                        .split(',')
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty())
                        .collect();
                    out.push(format!(
                        "Consider an index for GROUP BY on table {}: ({})",
                        table,
                        columns.join(", ")
                    ));
                }
            }
        }

        if detail.contains("TEMP B-TREE") {
            out.push(
                "Consider optimizing the query to avoid temporary B-tree creation".to_string(),
            );
        }

        if detail.contains("JOIN") {
            for caps in self.join_table.captures_iter(detail) {
                let table = &caps[1];
                if let Some(columns) = self.catalog.columns_of(table) {
                    for column in columns {
                        if column.ends_with("Id") || column.ends_with("_id") {
                            out.push(format!(
                                "Consider an index on the foreign key column {}.{}",
                                table, column
                            ));
                        }
                    }
                }
            }
        }
    }

    /// Columns bound to a parameter placeholder in the detail text
    fn bound_columns(&self, detail: &str) -> Vec<String> {
        self.bound_column
            .captures_iter(detail)
            .map(|caps| caps[1].to_string())
            .collect()
    }
}
