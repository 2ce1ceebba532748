//! Query engine: compile, execute, and assemble the paginated envelope.
//!
//! The engine owns the "limit+1" protocol: the compiler fetches one row
//! beyond the page, and the engine turns the overflow into `next_cursor`/
//! `prev_cursor` built from the boundary rows of the returned page. A
//! stale or invalid cursor degrades to the first page instead of erroring
//! the whole view.

use super::ast::{Direction, Query};
use super::compiler::{
    apply_request, compile, translate, CompiledQuery, CompiledShape, Limits,
};
use super::cursor::Cursor;
use super::error::CompileError;
use super::exec::{ExecutionError, Executor, Row};
use super::parser::parse_query;
use super::schema::SchemaCatalog;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// A query request as submitted by a view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The SRQL query string.
    pub query: String,
    /// Page size override.
    #[serde(default)]
    pub limit: Option<i64>,
    /// Opaque cursor from a previous page.
    #[serde(default)]
    pub cursor: Option<String>,
    /// Walk direction; defaults to the cursor's embedded direction.
    #[serde(default)]
    pub direction: Option<Direction>,
}

impl QueryRequest {
    /// A request carrying only a query string.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: None,
            cursor: None,
            direction: None,
        }
    }
}

/// Cursor envelope returned with every page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaginationMeta {
    /// Cursor for the page after this one; absent on the last page.
    pub next_cursor: Option<String>,
    /// Cursor for the page before this one; absent on the first page.
    pub prev_cursor: Option<String>,
    /// Effective page size.
    pub limit: Option<i64>,
}

/// A page of results plus its pagination envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Result rows in the requested sort order.
    pub results: Vec<Row>,
    /// Cursor envelope.
    pub pagination: PaginationMeta,
}

/// Errors from the compile-execute pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The query failed to parse or compile.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The storage backend failed.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Compiles SRQL queries and runs them through an [`Executor`].
///
/// The engine is stateless apart from its immutable configuration and may
/// be shared freely across request handlers.
#[derive(Clone)]
pub struct QueryEngine {
    catalog: Arc<SchemaCatalog>,
    limits: Limits,
    executor: Arc<dyn Executor>,
}

impl QueryEngine {
    /// Creates an engine over the given catalog and executor.
    #[must_use]
    pub fn new(catalog: SchemaCatalog, limits: Limits, executor: Arc<dyn Executor>) -> Self {
        Self {
            catalog: Arc::new(catalog),
            limits,
            executor,
        }
    }

    /// The entity catalog this engine compiles against.
    #[must_use]
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// The page-size limits this engine clamps to.
    #[must_use]
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Compiles a request without executing it.
    ///
    /// Unlike [`QueryEngine::query`], an invalid cursor surfaces as
    /// [`CompileError::InvalidCursor`] so tooling can see it.
    ///
    /// # Errors
    ///
    /// Returns any [`CompileError`].
    pub fn translate(&self, request: &QueryRequest) -> Result<CompiledQuery, CompileError> {
        translate(
            &request.query,
            request.cursor.as_deref(),
            request.direction,
            request.limit,
            &self.catalog,
            &self.limits,
        )
    }

    /// Compiles and executes a request, returning a paginated page.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Compile`] for unparseable/uncompilable
    /// queries and [`EngineError::Execution`] for backend failures.
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, EngineError> {
        let mut parsed = parse_query(&request.query)?;
        apply_request(
            &mut parsed,
            request.cursor.as_deref(),
            request.direction,
            request.limit,
        );

        let compiled = self.compile_with_degradation(&mut parsed)?;
        let rows = self
            .executor
            .execute(&compiled.sql, &compiled.params)
            .await?;

        Ok(assemble_page(rows, &compiled.shape))
    }

    /// Cursors legitimately expire when the underlying data changes shape;
    /// restart from the first page rather than blanking the view.
    fn compile_with_degradation(&self, parsed: &mut Query) -> Result<CompiledQuery, CompileError> {
        match compile(parsed, &self.catalog, &self.limits) {
            Err(CompileError::InvalidCursor(reason)) if parsed.cursor.is_some() => {
                tracing::warn!(%reason, "invalid cursor; restarting from first page");
                parsed.cursor = None;
                parsed.direction = Direction::Next;
                compile(parsed, &self.catalog, &self.limits)
            }
            other => other,
        }
    }
}

/// Turns a "limit+1" fetch into a page plus its cursor envelope.
fn assemble_page(mut rows: Vec<Row>, shape: &CompiledShape) -> QueryResponse {
    let CompiledShape::Rows {
        page_size,
        sort,
        tie_break,
        direction,
        fingerprint,
        resumed,
    } = shape
    else {
        return QueryResponse {
            results: rows,
            pagination: PaginationMeta::default(),
        };
    };

    #[allow(clippy::cast_sign_loss)]
    let page = *page_size as usize;
    let has_probe = rows.len() > page;
    rows.truncate(page);
    if matches!(direction, Direction::Prev) {
        // Backward fetches arrive in flipped order; restore the requested one.
        rows.reverse();
    }

    let boundary = |row: &Row, dir: Direction| {
        Cursor {
            sort_value: field_text(row, &sort.field),
            tie_break: field_text(row, tie_break),
            direction: dir,
            fingerprint: fingerprint.clone(),
        }
        .encode()
    };

    let (next_cursor, prev_cursor) = match (rows.first(), rows.last()) {
        (Some(first), Some(last)) => match direction {
            Direction::Next => (
                has_probe.then(|| boundary(last, Direction::Next)),
                resumed.then(|| boundary(first, Direction::Prev)),
            ),
            Direction::Prev => (
                Some(boundary(last, Direction::Next)),
                has_probe.then(|| boundary(first, Direction::Prev)),
            ),
        },
        _ => (None, None),
    };

    QueryResponse {
        results: rows,
        pagination: PaginationMeta {
            next_cursor,
            prev_cursor,
            limit: Some(*page_size),
        },
    }
}

fn field_text(row: &Row, field: &str) -> String {
    match row.get(field) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::srql::compiler::SqlValue;
    use crate::srql::exec::StaticExecutor;
    use async_trait::async_trait;
    use serde_json::json;

    fn row(ts: &str, id: &str) -> Row {
        match json!({ "timestamp": ts, "id": id, "severity_text": "error" }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn ids(response: &QueryResponse) -> Vec<String> {
        response
            .results
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect()
    }

    /// Interprets the compiled keyset predicate against an in-memory
    /// dataset, so pagination can be walked end to end.
    struct KeysetExecutor {
        rows: Vec<Row>,
    }

    #[async_trait]
    impl Executor for KeysetExecutor {
        async fn execute(
            &self,
            sql: &str,
            params: &[SqlValue],
        ) -> Result<Vec<Row>, ExecutionError> {
            let mut rows = self.rows.clone();
            rows.sort_by(|a, b| {
                let ka = (field_text(a, "timestamp"), field_text(a, "id"));
                let kb = (field_text(b, "timestamp"), field_text(b, "id"));
                ka.cmp(&kb)
            });
            if sql.contains("ORDER BY timestamp DESC") {
                rows.reverse();
            }

            if sql.contains("(timestamp, id)") {
                let (SqlValue::Text(s), SqlValue::Text(t)) =
                    (&params[params.len() - 3], &params[params.len() - 2])
                else {
                    return Err(ExecutionError::Backend("bad keyset params".to_string()));
                };
                let boundary = (s.clone(), t.clone());
                let keep_less = sql.contains(") < (");
                rows.retain(|r| {
                    let key = (field_text(r, "timestamp"), field_text(r, "id"));
                    if keep_less {
                        key < boundary
                    } else {
                        key > boundary
                    }
                });
            }

            let Some(SqlValue::Int(limit)) = params.last() else {
                return Err(ExecutionError::Backend("missing limit".to_string()));
            };
            #[allow(clippy::cast_sign_loss)]
            rows.truncate(*limit as usize);
            Ok(rows)
        }
    }

    fn dataset() -> Vec<Row> {
        vec![
            row("2026-08-06T10:00:05Z", "r5"),
            row("2026-08-06T10:00:04Z", "r4"),
            // Duplicate sort values exercise the tie-break.
            row("2026-08-06T10:00:03Z", "r3b"),
            row("2026-08-06T10:00:03Z", "r3a"),
            row("2026-08-06T10:00:01Z", "r1"),
        ]
    }

    fn engine_over(rows: Vec<Row>) -> QueryEngine {
        QueryEngine::new(
            SchemaCatalog::with_defaults(),
            Limits::default(),
            Arc::new(KeysetExecutor { rows }),
        )
    }

    const WALK_QUERY: &str = "in:logs severity_text:error sort:timestamp:desc limit:2";

    #[tokio::test]
    async fn test_first_page_has_no_prev_cursor() {
        let engine = engine_over(dataset());
        let page = engine.query(&QueryRequest::new(WALK_QUERY)).await.unwrap();

        assert_eq!(ids(&page), vec!["r5", "r4"]);
        assert!(page.pagination.prev_cursor.is_none());
        assert!(page.pagination.next_cursor.is_some());
        assert_eq!(page.pagination.limit, Some(2));
    }

    #[tokio::test]
    async fn test_walk_forward_to_end_then_back() {
        let engine = engine_over(dataset());

        let page1 = engine.query(&QueryRequest::new(WALK_QUERY)).await.unwrap();
        assert_eq!(ids(&page1), vec!["r5", "r4"]);

        let mut request = QueryRequest::new(WALK_QUERY);
        request.cursor = page1.pagination.next_cursor.clone();
        let page2 = engine.query(&request).await.unwrap();
        assert_eq!(ids(&page2), vec!["r3b", "r3a"]);
        assert!(page2.pagination.prev_cursor.is_some());

        let mut request = QueryRequest::new(WALK_QUERY);
        request.cursor = page2.pagination.next_cursor.clone();
        let page3 = engine.query(&request).await.unwrap();
        assert_eq!(ids(&page3), vec!["r1"]);
        // True last page: nothing further.
        assert!(page3.pagination.next_cursor.is_none());
        assert!(page3.pagination.prev_cursor.is_some());

        // Walk back: identical pages, no skips or duplicates.
        let mut request = QueryRequest::new(WALK_QUERY);
        request.cursor = page3.pagination.prev_cursor.clone();
        let back2 = engine.query(&request).await.unwrap();
        assert_eq!(ids(&back2), ids(&page2));

        let mut request = QueryRequest::new(WALK_QUERY);
        request.cursor = back2.pagination.prev_cursor.clone();
        let back1 = engine.query(&request).await.unwrap();
        assert_eq!(ids(&back1), ids(&page1));
        // Back at the first page; nothing before it.
        assert!(back1.pagination.prev_cursor.is_none());
    }

    #[tokio::test]
    async fn test_invalid_cursor_degrades_to_first_page() {
        let engine = engine_over(dataset());

        let mut request = QueryRequest::new(WALK_QUERY);
        request.cursor = Some("definitely-not-a-cursor".to_string());
        let page = engine.query(&request).await.unwrap();

        assert_eq!(ids(&page), vec!["r5", "r4"]);
        assert!(page.pagination.prev_cursor.is_none());
    }

    #[tokio::test]
    async fn test_cursor_for_other_shape_degrades_to_first_page() {
        let engine = engine_over(dataset());

        let page1 = engine.query(&QueryRequest::new(WALK_QUERY)).await.unwrap();
        let mut request =
            QueryRequest::new("in:logs service_name:api sort:timestamp:desc limit:2");
        request.cursor = page1.pagination.next_cursor.clone();

        let page = engine.query(&request).await.unwrap();
        assert!(page.pagination.prev_cursor.is_none(), "expected first page");
    }

    #[tokio::test]
    async fn test_translate_surfaces_invalid_cursor() {
        let engine = engine_over(dataset());
        let mut request = QueryRequest::new(WALK_QUERY);
        request.cursor = Some("garbage".to_string());

        let err = engine.translate(&request).unwrap_err();
        assert!(matches!(err, CompileError::InvalidCursor(_)));
    }

    #[tokio::test]
    async fn test_compile_error_keeps_taxonomy() {
        let engine = engine_over(dataset());
        let err = engine
            .query(&QueryRequest::new("in:devices hostname:x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Compile(CompileError::UnknownEntity(_))
        ));
    }

    #[tokio::test]
    async fn test_execution_error_passes_through() {
        let engine = QueryEngine::new(
            SchemaCatalog::with_defaults(),
            Limits::default(),
            Arc::new(StaticExecutor::failing("boom")),
        );
        let err = engine
            .query(&QueryRequest::new("in:logs"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Execution(_)));
    }

    #[tokio::test]
    async fn test_aggregate_page_has_no_cursors() {
        let engine = QueryEngine::new(
            SchemaCatalog::with_defaults(),
            Limits::default(),
            Arc::new(StaticExecutor::new(vec![
                match json!({ "total": 12, "fatal": 3 }) {
                    serde_json::Value::Object(map) => map,
                    _ => unreachable!(),
                },
            ])),
        );

        let page = engine
            .query(&QueryRequest::new(
                "in:logs stats:\"count() as total, sum(if(severity_text = 'fatal', 1, 0)) as fatal\"",
            ))
            .await
            .unwrap();

        assert_eq!(page.results.len(), 1);
        assert!(page.pagination.next_cursor.is_none());
        assert!(page.pagination.prev_cursor.is_none());
    }

    #[tokio::test]
    async fn test_empty_result_set_has_no_cursors() {
        let engine = QueryEngine::new(
            SchemaCatalog::with_defaults(),
            Limits::default(),
            Arc::new(StaticExecutor::empty()),
        );
        let page = engine
            .query(&QueryRequest::new("in:logs limit:10"))
            .await
            .unwrap();
        assert!(page.results.is_empty());
        assert!(page.pagination.next_cursor.is_none());
        assert!(page.pagination.prev_cursor.is_none());
    }
}
