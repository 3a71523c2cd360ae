// Copyright 2025 Stoolap Contributors
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

//! Error types for tuplestream
//!
//! Every failure in the execution core is surfaced through this enum and
//! propagated to the query driver. Nothing in this layer retries.

use thiserror::Error;

/// Result type alias for tuplestream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the execution core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // =========================================================================
    // Configuration errors
    // =========================================================================
    /// A batch size, batch limit, top or TTL expression produced an unusable value
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// An identity expression (cache region name, ...) evaluated to NULL
    #[error("{what} evaluated to NULL")]
    NullIdentity { what: String },

    /// Invalid execution option
    #[error("invalid option '{key}': {message}")]
    InvalidOption { key: String, message: String },

    // =========================================================================
    // Catalog contract violations
    // =========================================================================
    /// An index-capable operator did not honour the outer-values channel contract
    #[error("catalog contract violation by index {index}: {message}")]
    CatalogContract { index: String, message: String },

    /// Table not found in a catalog
    #[error("table '{0}' not found")]
    TableNotFound(String),

    // =========================================================================
    // State errors
    // =========================================================================
    /// Iterator protocol misuse (next without has_next, use after close, ...)
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// A tuple merger invariant was violated
    #[error("tuple merge error: {message}")]
    TupleMerge { message: String },

    // =========================================================================
    // Column errors
    // =========================================================================
    /// Column not found in a tuple's schema
    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    // =========================================================================
    // Comparison / evaluation errors
    // =========================================================================
    /// Cannot compare NULL with non-NULL value
    #[error("cannot compare NULL with non-NULL value")]
    NullComparison,

    /// Cannot compare incompatible types
    #[error("cannot compare incompatible types")]
    IncomparableTypes,

    /// Expression evaluation failed with message
    #[error("expression evaluation failed: {message}")]
    ExpressionEvaluation { message: String },

    /// Type error
    #[error("type error: {0}")]
    Type(String),

    /// Division by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Parse error
    #[error("parse error: {0}")]
    Parse(String),

    /// Internal error for unexpected conditions
    #[error("{message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a new NullIdentity error
    pub fn null_identity(what: impl Into<String>) -> Self {
        Error::NullIdentity { what: what.into() }
    }

    /// Create a new InvalidOption error
    pub fn invalid_option(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidOption {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a new CatalogContract error
    pub fn catalog_contract(index: impl Into<String>, message: impl Into<String>) -> Self {
        Error::CatalogContract {
            index: index.into(),
            message: message.into(),
        }
    }

    /// Create a new InvalidState error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Error::InvalidState {
            message: message.into(),
        }
    }

    /// Create a new TupleMerge error
    pub fn tuple_merge(message: impl Into<String>) -> Self {
        Error::TupleMerge {
            message: message.into(),
        }
    }

    /// Create a new ExpressionEvaluation error
    pub fn expression_evaluation(message: impl Into<String>) -> Self {
        Error::ExpressionEvaluation {
            message: message.into(),
        }
    }

    /// Create a new Parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }

    /// Create a new Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Returns true for errors caused by plan/option configuration
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::Configuration { .. } | Error::NullIdentity { .. } | Error::InvalidOption { .. }
        )
    }

    /// Returns true for violations of the catalog SPI contract
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Error::CatalogContract { .. })
    }

    /// Returns true for programmer errors inside the execution core
    pub fn is_state_error(&self) -> bool {
        matches!(self, Error::InvalidState { .. } | Error::TupleMerge { .. })
    }
}
