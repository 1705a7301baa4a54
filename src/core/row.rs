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

//! Result rows and result sets
//!
//! A `ResultSet` is what the executor collaborator returns and what the
//! cache serializes. The whole structure round-trips through JSON so a
//! cached payload can be rehydrated without consulting the executor.

use serde::{Deserialize, Serialize};

use super::value::Value;

/// A single result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Create a row from a vector of values
    pub fn from_values(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Get a value by column index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Number of values in the row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the row's values
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }
}

/// An ordered set of result rows with column names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Column names in projection order
    pub columns: Vec<String>,
    /// Result rows in execution order
    pub rows: Vec<Row>,
}

impl ResultSet {
    /// Create a result set
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Create an empty result set with the given columns
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result set has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultSet {
        ResultSet::new(
            vec!["id".to_string(), "status".to_string()],
            vec![
                Row::from_values(vec![Value::Integer(1), Value::from("Open")]),
                Row::from_values(vec![Value::Integer(2), Value::from("Closed")]),
            ],
        )
    }

    #[test]
    fn test_row_access() {
        let rs = sample();
        assert_eq!(rs.row_count(), 2);
        assert_eq!(rs.rows[0].get(0), Some(&Value::Integer(1)));
        assert_eq!(rs.rows[1].get(1), Some(&Value::from("Closed")));
        assert_eq!(rs.rows[0].get(5), None);
    }

    #[test]
    fn test_empty_result_set() {
        let rs = ResultSet::empty(vec!["id".to_string()]);
        assert!(rs.is_empty());
        assert_eq!(rs.columns.len(), 1);
    }

    #[test]
    fn test_json_round_trip() {
        let rs = sample();
        let payload = serde_json::to_vec(&rs).unwrap();
        let back: ResultSet = serde_json::from_slice(&payload).unwrap();
        assert_eq!(rs, back);
    }
}
