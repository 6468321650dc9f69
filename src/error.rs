// Error handling for the discount API
// Maps domain errors to HTTP responses with a consistent JSON body

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::discounts::error::DiscountError;

/// Main error type for the API
/// All handlers return Result<T, ApiError>
#[derive(Debug)]
pub enum ApiError {
    /// Rule failed validation; carries every violation
    /// Maps to HTTP 400 Bad Request
    ValidationFailed(Vec<String>),

    /// Unknown rule, or a rule of another shop
    /// Maps to HTTP 404 Not Found
    NotFound { resource: String, id: String },

    /// Malformed query, body or calculation input
    /// Maps to HTTP 400 Bad Request
    InvalidArgument(String),

    /// Rule store unreachable or timed out
    /// Maps to HTTP 503 Service Unavailable
    StoreUnavailable(String),

    /// Cache could not be invalidated after a mutation
    /// Maps to HTTP 503 Service Unavailable
    CacheUnavailable(String),

    /// Internal server errors
    /// Maps to HTTP 500 Internal Server Error
    /// Sensitive details are filtered from client responses
    InternalError(String),
}

/// Consistent error response structure
///
/// `errorCode` is machine-readable, `message` is for humans, `retryable`
/// tells the caller whether the same request may succeed later.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// e.g. "VALIDATION_ERROR", "NOT_FOUND"
    pub error_code: String,

    pub message: String,

    /// Violation list for validation errors; omitted otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,

    pub retryable: bool,

    /// RFC 3339 timestamp of when the error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    fn new(error_code: &str, message: String, retryable: bool) -> Self {
        Self {
            error_code: error_code.to_string(),
            message,
            details: None,
            retryable,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = self.to_error_response();
        (status, Json(error_response)).into_response()
    }
}

impl ApiError {
    /// Convert ApiError to HTTP status code and ErrorResponse
    ///
    /// Logged at debug for expected client errors, warn for degraded
    /// dependencies and error for internal failures.
    fn to_error_response(&self) -> (StatusCode, ErrorResponse) {
        let status = self.status_code();
        match self {
            ApiError::ValidationFailed(violations) => {
                debug!("Validation failed: {:?}", violations);

                let mut response = ErrorResponse::new(
                    "VALIDATION_ERROR",
                    "Rule validation failed".to_string(),
                    false,
                );
                response.details = Some(violations.clone());
                (status, response)
            }
            ApiError::NotFound { resource, id } => {
                debug!("Resource not found: {} with id {}", resource, id);

                (
                    status,
                    ErrorResponse::new(
                        "NOT_FOUND",
                        format!("{} with id {} not found", resource, id),
                        false,
                    ),
                )
            }
            ApiError::InvalidArgument(message) => {
                debug!("Invalid argument: {}", message);

                (status, ErrorResponse::new("INVALID_ARGUMENT", message.clone(), false))
            }
            ApiError::StoreUnavailable(detail) => {
                error!("Rule store unavailable: {}", detail);

                (
                    status,
                    ErrorResponse::new(
                        "STORE_UNAVAILABLE",
                        "The rule store is temporarily unavailable".to_string(),
                        true,
                    ),
                )
            }
            ApiError::CacheUnavailable(detail) => {
                warn!("Discount cache unavailable: {}", detail);

                (
                    status,
                    ErrorResponse::new(
                        "CACHE_UNAVAILABLE",
                        "The change was saved but cached discounts could not be refreshed"
                            .to_string(),
                        true,
                    ),
                )
            }
            ApiError::InternalError(internal_msg) => {
                error!("Internal error: {}", internal_msg);

                (
                    status,
                    ErrorResponse::new(
                        "INTERNAL_ERROR",
                        "An internal server error occurred".to_string(),
                        false,
                    ),
                )
            }
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::CacheUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn rule_not_found(id: Uuid) -> Self {
        ApiError::NotFound {
            resource: "Discount rule".to_string(),
            id: id.to_string(),
        }
    }
}

impl From<DiscountError> for ApiError {
    fn from(error: DiscountError) -> Self {
        match error {
            DiscountError::Validation(violations) => ApiError::ValidationFailed(violations),
            DiscountError::NotFound(id) => ApiError::rule_not_found(id),
            DiscountError::InvalidArgument(message) => ApiError::InvalidArgument(message),
            DiscountError::StoreUnavailable(detail) => ApiError::StoreUnavailable(detail),
            DiscountError::CacheUnavailable(detail) => ApiError::CacheUnavailable(detail),
        }
    }
}

/// Convert validator errors to ApiError
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        DiscountError::from(errors).into()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidArgument(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::InvalidArgument(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidArgument(rejection.body_text())
    }
}
