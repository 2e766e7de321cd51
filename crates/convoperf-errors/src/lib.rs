//! Unified error handling for the performance-management layer.
//!
//! Mirrors the teacher workspace's `rust-ai-ide-errors` crate: a single
//! `thiserror`-derived enum covering every foreground failure mode named in
//! the error taxonomy, plus `From` conversions from the underlying
//! persistence and serialization crates so call sites can use `?` freely.
//!
//! Background-loop failure modes (`ResourcePressure`, `PolicyDeferred`,
//! per-item `AnalysisItemError`, `WarmingError`) are intentionally *not*
//! variants of [`PerfError`] — they are not errors, they are recorded
//! outcomes (counters / history entries), per the taxonomy in the
//! specification's error-handling section.

use std::fmt;

/// Result type alias used throughout the workspace.
pub type PerfResult<T> = Result<T, PerfError>;

/// Unified error type for foreground operations.
#[derive(thiserror::Error, Debug, Clone)]
pub enum PerfError {
    /// A single artifact exceeded the cache's total capacity; the cache is
    /// effectively disabled for that key but the call still succeeds with
    /// the authoritative (uncached) value.
    #[error("cache error: {0}")]
    Cache(String),

    /// Statement preparation or execution against the persistent store
    /// failed. Carries the `queryId` so callers can correlate with
    /// `QueryExecutor::stats()`.
    #[error("query error in '{query_id}': {message}")]
    Query { query_id: String, message: String },

    /// Configuration was structurally invalid (out-of-range thresholds,
    /// empty maintenance window, etc).
    #[error("configuration error: {0}")]
    Config(String),

    /// The underlying relational store returned an error outside of a
    /// specific query execution (e.g. connection setup).
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization of an artifact or metadata field
    /// failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The component was asked to operate after `shutdown()` completed.
    #[error("component has already shut down")]
    ShuttingDown,
}

impl From<rusqlite::Error> for PerfError {
    fn from(err: rusqlite::Error) -> Self {
        PerfError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for PerfError {
    fn from(err: serde_json::Error) -> Self {
        PerfError::Serialization(err.to_string())
    }
}

/// A query-scoped constructor, since `PerfError::Query` needs both fields.
impl PerfError {
    pub fn query(query_id: impl Into<String>, err: impl fmt::Display) -> Self {
        PerfError::Query {
            query_id: query_id.into(),
            message: err.to_string(),
        }
    }
}

/// Per-component health status reported by `performanceHealthCheck`.
///
/// Never carries a [`PerfError`] or any internal identifier — only a
/// classification and a one-line human message, per the "no stack traces or
/// internal identifiers" contract.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HealthStatus {
    Pass,
    Warning,
    Fail,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthCheck {
    pub component: String,
    pub status: HealthStatus,
    pub message: String,
}
