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

//! Query feature extraction
//!
//! Features are lexical counts over canonical query text. Counting text
//! markers instead of walking the tree keeps the feature definition
//! identical for any query representation that renders to the same
//! canonical form.

/// Number of features in the vector form
pub const FEATURE_COUNT: usize = 8;

/// Structural feature counts for one query
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QueryFeatures {
    /// FROM plus JOIN occurrences
    pub table_count: u32,
    /// JOIN occurrences
    pub join_count: u32,
    /// WHERE occurrences
    pub filter_count: u32,
    /// ORDER BY occurrences
    pub order_by_count: u32,
    /// GROUP BY occurrences
    pub group_by_count: u32,
    /// HAVING occurrences
    pub having_count: u32,
    /// Embedded subquery occurrences
    pub subquery_count: u32,
    /// Length of the query text in bytes
    pub query_length: u32,
}

impl QueryFeatures {
    /// Extract features from canonical query text
    pub fn extract(query_text: &str) -> Self {
        let upper = query_text.to_ascii_uppercase();
        let from_count = count_occurrences(&upper, "FROM");
        let join_count = count_occurrences(&upper, "JOIN");
        Self {
            table_count: from_count + join_count,
            join_count,
            filter_count: count_occurrences(&upper, "WHERE"),
            order_by_count: count_occurrences(&upper, "ORDER BY"),
            group_by_count: count_occurrences(&upper, "GROUP BY"),
            having_count: count_occurrences(&upper, "HAVING"),
            subquery_count: count_occurrences(&upper, "(SELECT"),
            query_length: query_text.len() as u32,
        }
    }

    /// Feature vector for model input
    pub fn to_vector(self) -> [f64; FEATURE_COUNT] {
        [
            self.table_count as f64,
            self.join_count as f64,
            self.filter_count as f64,
            self.order_by_count as f64,
            self.group_by_count as f64,
            self.having_count as f64,
            self.subquery_count as f64,
            self.query_length as f64,
        ]
    }
}

/// Count non-overlapping occurrences of a marker in uppercased text
fn count_occurrences(upper: &str, marker: &str) -> u32 {
    upper.matches(marker).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_query() {
        let f = QueryFeatures::extract("SELECT * FROM orders WHERE status = 'Open'");
        assert_eq!(f.table_count, 1);
        assert_eq!(f.join_count, 0);
        assert_eq!(f.filter_count, 1);
        assert_eq!(f.order_by_count, 0);
        assert_eq!(f.query_length, 42);
    }

    #[test]
    fn test_extract_join_query() {
        let f = QueryFeatures::extract(
            "SELECT * FROM orders JOIN customers ON orders.customer_id = customers.id \
             GROUP BY region ORDER BY total DESC",
        );
        assert_eq!(f.table_count, 2);
        assert_eq!(f.join_count, 1);
        assert_eq!(f.group_by_count, 1);
        assert_eq!(f.order_by_count, 1);
    }

    #[test]
    fn test_extract_is_case_insensitive() {
        let upper = QueryFeatures::extract("SELECT * FROM t WHERE x = 1");
        let lower = QueryFeatures::extract("select * from t where x = 1");
        assert_eq!(upper.table_count, lower.table_count);
        assert_eq!(upper.filter_count, lower.filter_count);
    }

    #[test]
    fn test_subquery_marker() {
        let f = QueryFeatures::extract("SELECT * FROM t WHERE id IN (SELECT id FROM u)");
        assert_eq!(f.subquery_count, 1);
        assert_eq!(f.table_count, 2);
    }

    #[test]
    fn test_vector_shape() {
        let f = QueryFeatures::extract("SELECT * FROM t");
        let v = f.to_vector();
        assert_eq!(v.len(), FEATURE_COUNT);
        assert_eq!(v[0], 1.0);
        assert_eq!(v[7], 15.0);
    }
}
