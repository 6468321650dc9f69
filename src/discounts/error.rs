// Error types for discount rules and discount resolution

use thiserror::Error;
use uuid::Uuid;

/// Main error type for the rule store, the resolver and the rule service
///
/// Neither the store nor the resolver swallow failures; the HTTP boundary
/// translates each variant to a status code (see `crate::error::ApiError`).
#[derive(Debug, Error)]
pub enum DiscountError {
    /// Bad rule input, one message per violated constraint
    #[error("Rule validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Unknown rule id, or a rule owned by another shop
    #[error("Discount rule {0} not found")]
    NotFound(Uuid),

    /// Malformed calculation or webhook request
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Persistence layer unreachable or too slow; callers may retry
    #[error("Rule store unavailable: {0}")]
    StoreUnavailable(String),

    /// Shop cache could not be invalidated after a mutation; callers may retry
    #[error("Discount cache unavailable: {0}")]
    CacheUnavailable(String),
}

/// Result type alias for discount operations
pub type DiscountResult<T> = Result<T, DiscountError>;

impl DiscountError {
    /// Transient failures that a caller may retry unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DiscountError::StoreUnavailable(_) | DiscountError::CacheUnavailable(_)
        )
    }
}

impl From<sqlx::Error> for DiscountError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Rule store error: {:?}", err);
        DiscountError::StoreUnavailable(err.to_string())
    }
}

impl From<validator::ValidationErrors> for DiscountError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, field_errors)| {
                field_errors.iter().map(move |e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field))
                })
            })
            .collect();
        messages.sort();
        DiscountError::InvalidArgument(messages.join("; "))
    }
}
