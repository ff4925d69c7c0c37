//! Typed error handling for this-cypher
//!
//! Every condition raised by the translation engine, the authorization
//! deriver and the resolver wrappers is a [`GraphError`] variant, so callers
//! can match on the specific case instead of inspecting strings.
//!
//! # Error Categories
//!
//! - [`GraphError::MissingConnection`]: a handler ran without a connection handle
//! - [`GraphError::Unauthorized`]: credentials were supplied but failed verification
//! - [`GraphError::SchemaMismatch`]: a selection or input names something the type graph lacks
//! - [`GraphError::InvalidArgument`]: an argument has the wrong shape
//! - [`GraphError::Composition`] / [`GraphError::Config`]: startup-time failures
//! - [`GraphError::Store`]: errors coming back from the connection handle, untouched
//!
//! Access denied by an authorization rule is deliberately *not* an error:
//! the compiled query matches nothing and the caller sees an empty result.
//!
//! # Example
//!
//! ```rust,ignore
//! match handler.resolve(parent, args, ctx, selection).await {
//!     Ok(value) => println!("{}", value),
//!     Err(GraphError::Unauthorized { reason }) => eprintln!("bad token: {}", reason),
//!     Err(e) => eprintln!("{} ({})", e, e.error_code()),
//! }
//! ```

use axum::http::StatusCode;
use serde::Serialize;

/// Result alias used across the crate
pub type GraphResult<T> = Result<T, GraphError>;

/// The main error type for this-cypher
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The execution context carried no connection handle
    #[error("execution context is missing a connection handle")]
    MissingConnection,

    /// Credentials were present but could not be verified
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// The request references a field or relationship the entity does not declare
    #[error("{entity} has no field '{field}'")]
    SchemaMismatch { entity: String, field: String },

    /// An argument was present but malformed
    #[error("invalid argument '{argument}': {message}")]
    InvalidArgument { argument: String, message: String },

    /// Resolver maps could not be composed (startup only)
    #[error("resolver composition failed: {0}")]
    Composition(String),

    /// Configuration could not be loaded or is inconsistent (startup only)
    #[error("configuration error: {0}")]
    Config(String),

    /// Error surfaced by the connection handle, passed through unchanged
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Error response structure for transports that want a JSON body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl GraphError {
    /// Shorthand for a schema mismatch on `entity.field`
    pub fn schema_mismatch(entity: impl Into<String>, field: impl Into<String>) -> Self {
        GraphError::SchemaMismatch {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Shorthand for a malformed argument
    pub fn invalid_argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        GraphError::InvalidArgument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GraphError::MissingConnection => StatusCode::INTERNAL_SERVER_ERROR,
            GraphError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            GraphError::SchemaMismatch { .. } => StatusCode::BAD_REQUEST,
            GraphError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            GraphError::Composition(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GraphError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GraphError::Store(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            GraphError::MissingConnection => "MISSING_CONNECTION",
            GraphError::Unauthorized { .. } => "UNAUTHORIZED",
            GraphError::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            GraphError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            GraphError::Composition(_) => "COMPOSITION_ERROR",
            GraphError::Config(_) => "CONFIG_ERROR",
            GraphError::Store(_) => "STORE_ERROR",
        }
    }

    /// Whether the error can only happen while building the registry
    pub fn is_startup_error(&self) -> bool {
        matches!(self, GraphError::Composition(_) | GraphError::Config(_))
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            GraphError::SchemaMismatch { entity, field } => Some(serde_json::json!({
                "entity": entity,
                "field": field
            })),
            GraphError::InvalidArgument { argument, .. } => {
                Some(serde_json::json!({ "argument": argument }))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            GraphError::MissingConnection.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GraphError::Unauthorized {
                reason: "expired".into()
            }
            .status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GraphError::schema_mismatch("Person", "age").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GraphError::Store(anyhow::anyhow!("boom")).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_schema_mismatch_display_and_details() {
        let err = GraphError::schema_mismatch("Person", "age");
        assert_eq!(err.to_string(), "Person has no field 'age'");

        let response = err.to_response();
        assert_eq!(response.code, "SCHEMA_MISMATCH");
        let details = response.details.expect("details should be present");
        assert_eq!(details["entity"], "Person");
        assert_eq!(details["field"], "age");
    }

    #[test]
    fn test_store_error_is_transparent() {
        let err: GraphError = anyhow::anyhow!("connection reset").into();
        assert_eq!(err.to_string(), "connection reset");
        assert_eq!(err.error_code(), "STORE_ERROR");
        assert!(err.to_response().details.is_none());
    }

    #[test]
    fn test_startup_errors() {
        assert!(GraphError::Composition("x".into()).is_startup_error());
        assert!(GraphError::Config("x".into()).is_startup_error());
        assert!(!GraphError::MissingConnection.is_startup_error());
    }
}
