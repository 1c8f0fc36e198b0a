//! Service Layer Error Types
//!
//! This module defines error types for service-layer operations. Every error
//! carries its HTTP-facing classification via [`QueryServiceError::status_code`]
//! so transports can map failures without inspecting variants: validation and
//! capacity problems are the caller's fault (4xx), storage problems are ours
//! (5xx). A lookup that finds nothing is not an error at this layer; those
//! surface as empty values.

use crate::db::DatabaseError;
use crate::query::ValidationError;
use thiserror::Error;

/// Query service operation errors
///
/// Provides high-level error types for the asset query, analytics and
/// report services, with proper error chaining into the storage layer.
#[derive(Error, Debug)]
pub enum QueryServiceError {
    /// Caller input failed validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A bulk extraction exceeded the configured cap
    #[error("Requested extraction of {requested} assets exceeds the cap of {limit}")]
    CapacityExceeded { requested: usize, limit: usize },

    /// Storage operation failed
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    /// A result row could not be decoded
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

impl QueryServiceError {
    /// Create a capacity exceeded error
    pub fn capacity_exceeded(requested: usize, limit: usize) -> Self {
        Self::CapacityExceeded { requested, limit }
    }

    /// Create a query failed error
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }

    /// HTTP status class for this error.
    ///
    /// Validation and capacity errors map to 400, storage and decode
    /// failures to 500.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::CapacityExceeded { .. } => 400,
            Self::Database(_) | Self::QueryFailed(_) => 500,
        }
    }
}
