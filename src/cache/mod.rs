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

//! Distributed result caching
//!
//! ## Modules
//!
//! - `key` - Cache-key derivation and the invalidation reverse index
//! - `distributed` - The get-or-execute-and-set facade
//! - `batch` - Batch execution through the facade

pub mod batch;
pub mod distributed;
pub mod key;

pub use batch::BatchExecutor;
pub use distributed::{CacheOptions, CacheStatsSnapshot, DistributedCache};
pub use key::{CacheKeyDeriver, KEY_NAMESPACE};
