//! Handler outcomes and the structured error record
//!
//! [`ErrorResponse`] is the one fixed-shape failure body this crate writes:
//!
//! ```json
//! {"statusCode": 400, "errorMessage": {"Error": "repeated query parameter `id` is not supported"}}
//! ```
//!
//! [`Reply`] is what a fallible handler hands back to the pipeline: a
//! response model, an error response, or nothing at all.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Key under which pipeline-generated messages are stored
pub const ERROR_KEY: &str = "Error";

/// Message written for failures whose detail must not leak
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Structured error body
///
/// # Example
///
/// ```rust
/// use typed_endpoints::ErrorResponse;
///
/// let err = ErrorResponse::bad_request("missing id");
/// let json = serde_json::to_string(&err).unwrap();
/// assert_eq!(json, r#"{"statusCode":400,"errorMessage":{"Error":"missing id"}}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// HTTP status code
    pub status_code: u16,

    /// Message entries, serialized as `null` when absent
    pub error_message: Option<BTreeMap<String, String>>,
}

impl ErrorResponse {
    /// Create an error response with a single `"Error"` entry
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self::with_status(status.as_u16()).with_entry(ERROR_KEY, message)
    }

    /// Create an error response with no message entries
    pub fn with_status(status_code: u16) -> Self {
        Self {
            status_code,
            error_message: None,
        }
    }

    /// 400 error response carrying `message`
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 500 error response with a generic message
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
    }

    /// Add a message entry
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.error_message
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Look up a message entry
    pub fn entry(&self, key: &str) -> Option<&str> {
        self.error_message
            .as_ref()
            .and_then(|entries| entries.get(key))
            .map(String::as_str)
    }

    /// Transport status for this body; out-of-range codes become 500
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Outcome of a handler invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<R> {
    /// Success; serialized as the response body with status 200
    Ok(R),
    /// Domain failure chosen by the handler
    Err(ErrorResponse),
    /// Neither; an empty body is written
    Empty,
}

/// Conversion from a handler's return value into a [`Reply`]
///
/// The associated type pins the response model, so handlers returning any of
/// the supported shapes need no annotations.
pub trait IntoReply {
    /// Response model carried on success
    type Response: Serialize + Send + 'static;

    /// Convert into a reply
    fn into_reply(self) -> Reply<Self::Response>;
}

impl<R> IntoReply for Reply<R>
where
    R: Serialize + Send + 'static,
{
    type Response = R;

    fn into_reply(self) -> Reply<R> {
        self
    }
}

impl<R> IntoReply for Result<R, ErrorResponse>
where
    R: Serialize + Send + 'static,
{
    type Response = R;

    fn into_reply(self) -> Reply<R> {
        match self {
            Ok(response) => Reply::Ok(response),
            Err(error) => Reply::Err(error),
        }
    }
}

/// A present response model wins over a present error.
impl<R> IntoReply for (Option<R>, Option<ErrorResponse>)
where
    R: Serialize + Send + 'static,
{
    type Response = R;

    fn into_reply(self) -> Reply<R> {
        match self {
            (Some(response), _) => Reply::Ok(response),
            (None, Some(error)) => Reply::Err(error),
            (None, None) => Reply::Empty,
        }
    }
}
