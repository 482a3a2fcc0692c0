//! SQL query endpoints.
//!
//! `POST /api/v1/query` runs a statement and returns its rows as JSON;
//! `POST /api/v1/explain` returns the rendered plan instead. Queries run on
//! tokio's blocking pool and are cancelled when the request is dropped.

use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use engine::adapter::{InputFormat, SourceDescriptor};
use engine::{CancelReason, CancellationHandle, Column, Engine, QueryError, QueryOptions, Row};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// One named source of a request: a server-side path or inline content.
#[derive(Debug, Deserialize)]
pub struct SourceSpec {
    /// Name used in the FROM clause.
    pub name: String,
    /// Input format.
    pub format: InputFormat,
    /// File path on the server.
    #[serde(default)]
    pub path: Option<String>,
    /// Inline source text.
    #[serde(default)]
    pub content: Option<String>,
}

/// Request body for query execution.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// The SQL statement.
    pub sql: String,
    /// Named sources available to the statement.
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    /// Execution options.
    #[serde(default)]
    pub options: QueryOptions,
}

/// Response for successful query execution.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    /// Output columns.
    pub columns: Vec<Column>,
    /// Result rows, one array per row.
    pub rows: Vec<Row>,
    /// Number of rows returned.
    pub row_count: usize,
    /// Runtime type warnings raised while evaluating.
    pub warnings: u64,
    /// Execution time in milliseconds.
    pub elapsed_ms: u128,
}

/// Response for plan rendering.
#[derive(Debug, Serialize)]
pub struct ExplainResponse {
    /// Indented plan tree.
    pub plan: String,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Stable error code.
    pub error: String,
    /// Detailed error message.
    pub message: String,
}

/// A failed request: status plus error body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error: "invalid_request".to_string(),
                message: message.into(),
            },
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorResponse {
                error: "internal_error".to_string(),
                message: message.into(),
            },
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        let status = match &e {
            QueryError::Syntax(_) | QueryError::Bind(_) | QueryError::InvalidOptions(_) => {
                StatusCode::BAD_REQUEST
            }
            QueryError::Adapter(_) => StatusCode::UNPROCESSABLE_ENTITY,
            QueryError::Cancelled(CancelReason::Timeout) => StatusCode::REQUEST_TIMEOUT,
            QueryError::Cancelled(CancelReason::User) => StatusCode::SERVICE_UNAVAILABLE,
            QueryError::Sink(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            body: ErrorResponse {
                error: e.kind().to_string(),
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Cancels the query when the handler future is dropped, which happens when
/// the client disconnects.
struct CancelOnDrop(CancellationHandle);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl QueryRequest {
    fn source_descriptors(&self) -> Result<Vec<(String, SourceDescriptor)>, ApiError> {
        self.sources
            .iter()
            .map(|spec| {
                let descriptor = match (&spec.path, &spec.content) {
                    (Some(path), None) => SourceDescriptor::path(path, spec.format),
                    (None, Some(content)) => {
                        SourceDescriptor::text(spec.name.clone(), content.as_str(), spec.format)
                    }
                    _ => {
                        return Err(ApiError::bad_request(format!(
                            "Source '{}' needs exactly one of 'path' or 'content'",
                            spec.name
                        )))
                    }
                };
                Ok((spec.name.clone(), descriptor))
            })
            .collect()
    }
}

/// Creates the query routes with application state.
pub fn query_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/query", post(execute_query))
        .route("/api/v1/explain", post(explain_query))
        .with_state(state)
}

fn run_blocking(
    engine: &Engine,
    sql: &str,
    sources: &[(String, SourceDescriptor)],
    options: QueryOptions,
) -> Result<QueryResponse, QueryError> {
    let started = Instant::now();
    let mut stream = engine.query(sql, sources, options)?;
    let columns = stream.schema().columns().to_vec();
    let rows = stream.by_ref().collect::<Result<Vec<_>, _>>()?;
    Ok(QueryResponse {
        columns,
        row_count: rows.len(),
        rows,
        warnings: stream.warnings(),
        elapsed_ms: started.elapsed().as_millis(),
    })
}

/// Handler for query execution.
async fn execute_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let sources = request.source_descriptors()?;
    let QueryRequest { sql, mut options, .. } = request;
    if options.timeout_ms.is_none() {
        options.timeout_ms = u64::try_from(state.query_timeout().as_millis()).ok();
    }
    let cancel = CancellationHandle::new();
    options.cancel = Some(cancel.clone());
    let _guard = CancelOnDrop(cancel);

    let engine = state.engine();
    let response = tokio::task::spawn_blocking(move || {
        run_blocking(&engine, &sql, &sources, options).map_err(|e| {
            tracing::debug!(sql = %sql, error = %e, "Query failed");
            e
        })
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Query task failed");
        ApiError::internal(e.to_string())
    })??;

    tracing::debug!(
        rows = response.row_count,
        warnings = response.warnings,
        elapsed_ms = response.elapsed_ms,
        "Query executed successfully"
    );
    Ok(Json(response))
}

/// Handler for plan rendering.
async fn explain_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<ExplainResponse>, ApiError> {
    let sources = request.source_descriptors()?;
    let QueryRequest { sql, options, .. } = request;
    let engine = state.engine();
    let plan = tokio::task::spawn_blocking(move || engine.explain(&sql, &sources, &options))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))??;
    Ok(Json(ExplainResponse { plan }))
}
