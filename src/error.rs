//! Error types for the expiring cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Store Error Enum ==
/// Failure reported by a durable store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend cannot be reached at all
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Backend refused the write
    #[error("Write denied: {0}")]
    WriteDenied(String),

    /// Backend is out of room
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Value could not be encoded into an entry
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other I/O failure
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// == Cache Error Enum ==
/// Unified error type for cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is empty or too long
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Underlying store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Stored bytes exist but cannot be decoded
    #[error("Corrupt entry for key '{key}': {source}")]
    CorruptEntry {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

// == Get Or Compute Error ==
/// Error returned by `ExpiringCache::get_or_compute`.
///
/// Compute failures are carried unchanged in `Compute`.
#[derive(Error, Debug)]
pub enum GetOrComputeError<E> {
    #[error("{0}")]
    Compute(E),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl<E> GetOrComputeError<E> {
    /// Returns the caller's compute error, if that is what failed.
    pub fn into_compute(self) -> Option<E> {
        match self {
            GetOrComputeError::Compute(err) => Some(err),
            GetOrComputeError::Cache(_) => None,
        }
    }
}

// == Api Error Enum ==
/// Errors surfaced by the HTTP façade.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Key not present or expired
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Cache(CacheError::InvalidKey(_)) => StatusCode::BAD_REQUEST,
            ApiError::Cache(CacheError::CorruptEntry { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Cache(CacheError::Store(_)) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
