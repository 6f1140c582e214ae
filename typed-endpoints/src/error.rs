//! Error types and HTTP response conversion

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::reply::ErrorResponse;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Failure to bind a query string onto a query model
///
/// Raised before the handler runs; never reaches user code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// The target type is not a struct with named fields
    #[error("query model must be a struct with named fields")]
    NotARecord,

    /// A declared field cannot hold a string value
    #[error("query field `{0}` is not assignable to string")]
    UnsupportedField(String),

    /// The same key appeared more than once in the query string
    #[error("repeated query parameter `{0}` is not supported")]
    RepeatedParameter(String),

    /// Any other message produced while building the model
    #[error("{0}")]
    Custom(String),
}

impl serde::de::Error for BindingError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }
}

/// Main error type for the crate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Method string is not one of the supported HTTP methods
    #[error("Invalid method: {0:?}")]
    InvalidMethod(String),

    /// Path cannot be registered with the router
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// A handler is already registered for this method and path
    #[error("Route already registered: {0}")]
    DuplicateRoute(String),

    /// Query string could not be bound onto the query model
    #[error("{0}")]
    Binding(#[from] BindingError),

    /// Request body could not be read or decoded
    #[error("{0}")]
    Decode(String),

    /// Outgoing value could not be serialized
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the failure was caused by the request rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Binding(_) | Error::Decode(_))
    }

    /// HTTP status the error maps to when reported in detail
    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if self.is_client_error() {
            ErrorResponse::new(status, self.to_string())
        } else {
            // User-facing message (don't expose internal details)
            tracing::error!(error = %self, "request failed");
            ErrorResponse::internal()
        };

        body.into_response()
    }
}

// Manual From implementations for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}
