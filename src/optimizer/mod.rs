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

//! Query optimization pipeline
//!
//! ## Modules
//!
//! - `rewrite` - Normalization (read-only marking, predicate pushdown) and
//!   pattern rewriting
//! - `join` - Cardinality-based join reordering
//! - `pipeline` - The fixed-order orchestrator and its diagnostics report

pub mod join;
pub mod pipeline;
pub mod rewrite;

pub use join::{JoinReorderer, JoinSpec, JOIN_SELECTIVITY};
pub use pipeline::{OptimizationReport, QueryOptimizer};
pub use rewrite::{normalize, rewrite_patterns};
