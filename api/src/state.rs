//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use shared::srql::{Executor, Limits, QueryEngine, Row, SchemaCatalog, StaticExecutor};
use std::sync::Arc;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The query engine compiling and executing SRQL.
    engine: QueryEngine,
}

impl AppState {
    /// Creates application state over the given executor.
    #[must_use]
    pub fn new(catalog: SchemaCatalog, limits: Limits, executor: Arc<dyn Executor>) -> Self {
        Self {
            engine: QueryEngine::new(catalog, limits, executor),
        }
    }

    /// State backed by a static executor returning the given rows.
    ///
    /// This is useful for development and testing.
    #[must_use]
    pub fn with_static_rows(rows: Vec<Row>) -> Self {
        Self::new(
            SchemaCatalog::with_defaults(),
            Limits::default(),
            Arc::new(StaticExecutor::new(rows)),
        )
    }

    /// Returns the query engine.
    #[must_use]
    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_static_rows(Vec::new())
    }
}
