//! SRQL query endpoints.
//!
//! `/api/v1/query` compiles and executes a query, returning a paginated
//! page; `/api/v1/translate` compiles without executing, for tooling and
//! debugging. Compile errors map to 400 with a distinct machine-readable
//! kind; backend failures map to 502.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use shared::srql::{CompileError, EngineError, QueryRequest, QueryResponse, SqlValue};

/// Error response for query operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable error kind.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

impl From<&CompileError> for ApiError {
    fn from(e: &CompileError) -> Self {
        Self {
            error: e.kind().to_string(),
            message: e.to_string(),
        }
    }
}

/// Response for successful translation.
#[derive(Debug, Serialize, Deserialize)]
pub struct TranslateResponse {
    /// Parameterized SQL with `?` placeholders.
    pub sql: String,
    /// Bound parameters in placeholder order.
    pub params: Vec<SqlValue>,
}

/// Creates the query routes with application state.
pub fn query_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/query", post(execute_query))
        .route("/api/v1/translate", post(translate_query))
        .with_state(state)
}

/// Handler for query execution.
async fn execute_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, Json<ApiError>)> {
    match state.engine().query(&request).await {
        Ok(response) => {
            tracing::debug!(
                query = %request.query,
                returned = response.results.len(),
                "query executed"
            );
            Ok(Json(response))
        }
        Err(EngineError::Compile(e)) => {
            tracing::debug!(query = %request.query, error = %e, "query failed to compile");
            Err((StatusCode::BAD_REQUEST, Json(ApiError::from(&e))))
        }
        Err(EngineError::Execution(e)) => {
            tracing::error!(query = %request.query, error = %e, "query execution failed");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(ApiError {
                    error: "execution_error".to_string(),
                    message: e.to_string(),
                }),
            ))
        }
    }
}

/// Handler for query translation.
async fn translate_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<TranslateResponse>, (StatusCode, Json<ApiError>)> {
    let compiled = state.engine().translate(&request).map_err(|e| {
        tracing::debug!(query = %request.query, error = %e, "translation failed");
        (StatusCode::BAD_REQUEST, Json(ApiError::from(&e)))
    })?;

    Ok(Json(TranslateResponse {
        sql: compiled.sql,
        params: compiled.params,
    }))
}
