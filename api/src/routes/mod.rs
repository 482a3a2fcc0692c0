//! API route definitions.

mod health;
mod query;

pub use health::health_routes;
pub use query::{
    query_routes, ApiError, ErrorResponse, ExplainResponse, QueryRequest, QueryResponse,
    SourceSpec,
};
