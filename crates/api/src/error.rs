//! API error type and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use skillgap_aggregation::QueryError;
use skillgap_ingestion::RefreshError;
use tracing::error;

/// Errors a route can return.
///
/// Internal details are logged; clients only ever see the generic message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{context}")]
    Query {
        context: &'static str,
        #[source]
        source: QueryError,
    },
    #[error("Scrape failed")]
    Refresh(#[source] RefreshError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::Query { context, source } => {
                error!(error = %source, "{}", context);
                (StatusCode::INTERNAL_SERVER_ERROR, *context)
            }
            ApiError::Refresh(RefreshError::InProgress) => {
                (StatusCode::CONFLICT, "Refresh already in progress")
            }
            ApiError::Refresh(source) => {
                error!(error = %source, "Scrape failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Scrape failed")
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Attach a route-specific client message to a query failure.
pub trait QueryResultExt<T> {
    fn or_fail(self, context: &'static str) -> Result<T, ApiError>;
}

impl<T> QueryResultExt<T> for Result<T, QueryError> {
    fn or_fail(self, context: &'static str) -> Result<T, ApiError> {
        self.map_err(|source| ApiError::Query { context, source })
    }
}
