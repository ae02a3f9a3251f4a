pub mod transactions;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::core::QueryBuildError;
use crate::models::response::ErrorResponse;

/// Maps core and execution failures onto HTTP status codes: build errors
/// are the caller's fault (400), database failures are ours (500).
#[derive(Debug)]
pub enum ApiError {
    Build(QueryBuildError),
    NotFound(String),
    Database(sqlx::Error),
}

impl From<QueryBuildError> for ApiError {
    fn from(err: QueryBuildError) -> Self {
        ApiError::Build(err)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Database(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Build(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Database(err) => {
                error!(error = %err, "database failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

pub async fn service_info() -> impl IntoResponse {
    Json(json!({
        "message": "Transaction API",
        "examples": [
            "/api/v1/transactions?type=1&year=gte:2020&groupBy=companyName&orderBy=count:desc&limit=10",
            "/api/v1/transactions?type=14&year=2021&country=131&orderBy=size:desc&limit=5",
            "/api/v1/transactions?industry=32,34&country=37&year=2023&orderBy=year:desc,month:desc,day:desc",
            "/api/v1/transactions/summary/2023?country=37&type=2",
            "/api/v1/transactions/aggregate?groupBy=industry&measure=sum&field=size&type=14&year=2022",
        ],
    }))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}
