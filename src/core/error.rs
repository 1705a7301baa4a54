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

//! Error types for Quiver
//!
//! This module defines all error types used throughout the caching and
//! optimization engine.

use thiserror::Error;

/// Result type alias for Quiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Quiver operations
///
/// Collaborator failures (cache store, executor, statistics, plan trace)
/// carry a message from the underlying backend. Most of them are handled
/// internally by degrading gracefully rather than surfacing to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Predicate built from an operator token we do not understand
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Cache store round trip failed
    #[error("cache store error: {message}")]
    CacheStore { message: String },

    /// Cached payload could not be deserialized
    #[error("corrupt cache payload for key '{key}'")]
    CorruptPayload { key: String },

    /// Payload serialization failed
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// Query execution against the backing store failed
    #[error("execution error: {message}")]
    Execution { message: String },

    /// Table statistics could not be obtained
    #[error("statistics unavailable: {message}")]
    Statistics { message: String },

    /// Execution-plan trace could not be obtained
    #[error("plan trace unavailable: {message}")]
    PlanTrace { message: String },

    /// Prediction model inference or refit failed
    #[error("prediction model error: {message}")]
    Model { message: String },

    /// Entity type is not registered in the schema catalog
    #[error("entity type '{0}' not registered")]
    UnknownEntityType(String),

    /// Table is not registered in the schema catalog
    #[error("table '{0}' not found")]
    TableNotFound(String),

    /// Internal error for unexpected conditions
    #[error("{message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new UnsupportedOperation error
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Error::UnsupportedOperation(operation.into())
    }

    /// Create a new CacheStore error
    pub fn cache_store(message: impl Into<String>) -> Self {
        Error::CacheStore {
            message: message.into(),
        }
    }

    /// Create a new CorruptPayload error
    pub fn corrupt_payload(key: impl Into<String>) -> Self {
        Error::CorruptPayload { key: key.into() }
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Error::Serialization {
            message: message.into(),
        }
    }

    /// Create a new Execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Error::Execution {
            message: message.into(),
        }
    }

    /// Create a new Statistics error
    pub fn statistics(message: impl Into<String>) -> Self {
        Error::Statistics {
            message: message.into(),
        }
    }

    /// Create a new PlanTrace error
    pub fn plan_trace(message: impl Into<String>) -> Self {
        Error::PlanTrace {
            message: message.into(),
        }
    }

    /// Create a new Model error
    pub fn model(message: impl Into<String>) -> Self {
        Error::Model {
            message: message.into(),
        }
    }

    /// Create a new Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Check if this error came from an external collaborator
    ///
    /// Collaborator failures are the ones the engine degrades around:
    /// cache misses, original join order, empty plan analysis.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            Error::CacheStore { .. }
                | Error::Statistics { .. }
                | Error::PlanTrace { .. }
                | Error::Execution { .. }
        )
    }

    /// Check if this is a cache-payload error (treated as a miss)
    pub fn is_payload_error(&self) -> bool {
        matches!(
            self,
            Error::CorruptPayload { .. } | Error::Serialization { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization {
            message: err.to_string(),
        }
    }
}
