//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::ExpiringCache;
use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// The cache is internally synchronised, so handlers share it behind an `Arc`
/// without an outer lock.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache
    pub cache: Arc<ExpiringCache>,
    /// TTL applied when a request gives none
    pub default_ttl_ms: u64,
}

impl AppState {
    /// Creates a new AppState with the given cache.
    pub fn new(cache: ExpiringCache, default_ttl_ms: u64) -> Self {
        Self {
            cache: Arc::new(cache),
            default_ttl_ms,
        }
    }

    /// Creates a new AppState from an already-built cache and configuration.
    pub fn from_config(cache: ExpiringCache, config: &Config) -> Self {
        Self::new(cache, config.default_ttl_ms)
    }
}

/// Handler for PUT /set
///
/// Stores a JSON value in the cache with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>, ApiError> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl(state.default_ttl_ms);
    state.cache.set(&req.key, &req.value, ttl).await?;

    Ok(Json(SetResponse::new(req.key, ttl)))
}

/// Handler for GET /get/:key
///
/// Retrieves a live value from the cache by key.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>, ApiError> {
    let value: Value = state
        .cache
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(key.clone()))?;

    // Entry may lapse between the two reads; the value is still reported.
    let ttl = state.cache.ttl(&key).await?;

    Ok(Json(GetResponse::new(key, value, ttl)))
}

/// Handler for DELETE /del/:key
///
/// Deletes a key from the cache. Deleting an absent key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.cache.delete(&key).await?;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(
        state.cache.stats(),
        state.cache.single_flight_enabled(),
    ))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
