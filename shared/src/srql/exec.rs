//! Executor seam between the compiler and the storage backend.
//!
//! The compiler never performs I/O; everything it produces is handed to an
//! [`Executor`], the external collaborator that runs parameterized SQL and
//! returns rows. [`StaticExecutor`] is the in-process implementation used
//! by unit and route tests.

use super::compiler::SqlValue;
use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;

/// One result row, keyed by column name/alias.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Errors surfaced by a storage backend. Opaque to the query core; the
/// caller decides whether to retry (e.g. a UI "refresh" action).
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The backend rejected or failed the query.
    #[error("query backend error: {0}")]
    Backend(String),

    /// The backend did not answer in time.
    #[error("query backend timed out")]
    Timeout,
}

/// Runs compiled SQL against a storage backend.
///
/// Implementations must be thread-safe; the compiler and engine keep no
/// shared mutable state of their own.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Executes `sql` with `params` bound in placeholder order.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutionError`] when the backend fails.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, ExecutionError>;
}

/// An executor returning canned rows; records every call for assertions.
#[derive(Default)]
pub struct StaticExecutor {
    rows: Vec<Row>,
    fail_with: Option<String>,
    calls: Mutex<Vec<(String, Vec<SqlValue>)>>,
}

impl StaticExecutor {
    /// Returns the given rows for every query.
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Returns no rows.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fails every query with the given backend message.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    /// The `(sql, params)` pairs seen so far.
    ///
    /// # Panics
    ///
    /// Panics if a previous caller panicked while recording a call.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.calls.lock().expect("call log poisoned").clone()
    }
}

#[async_trait]
impl Executor for StaticExecutor {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, ExecutionError> {
        self.calls
            .lock()
            .map_err(|_| ExecutionError::Backend("call log poisoned".to_string()))?
            .push((sql.to_string(), params.to_vec()));

        match &self.fail_with {
            Some(message) => Err(ExecutionError::Backend(message.clone())),
            None => Ok(self.rows.clone()),
        }
    }
}
