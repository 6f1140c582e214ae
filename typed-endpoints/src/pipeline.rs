//! Per-request dispatch pipeline
//!
//! bind query -> read and decode body -> invoke handler -> encode reply.
//! Failures short-circuit before the handler runs and are reported according
//! to the route's [`ErrorPolicy`].

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::FutureExt;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::Instrument;

use crate::{
    error::{Error, Result},
    handler::Handler,
    query::{bind_query, QueryParams},
    reply::{ErrorResponse, Reply},
};

const APPLICATION_JSON: &str = "application/json";

/// How pipeline failures are reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Every failure is answered with an opaque 500 error response
    FailFast,
    /// Binding and decoding failures are answered with a 400 error response
    /// carrying the message; server-side failures with an opaque 500
    #[default]
    StructuredError,
}

impl ErrorPolicy {
    /// Error response written for `error` under this policy
    pub fn report(&self, error: &Error) -> ErrorResponse {
        match self {
            Self::StructuredError if error.is_client_error() => {
                ErrorResponse::bad_request(error.to_string())
            }
            _ => ErrorResponse::internal(),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail_fast"),
            Self::StructuredError => write!(f, "structured_error"),
        }
    }
}

/// Compiled callback for one route
pub(crate) struct Pipeline<H, Q, B> {
    route: Arc<str>,
    policy: ErrorPolicy,
    body_limit: usize,
    handler: Arc<H>,
    models: PhantomData<fn() -> (Q, B)>,
}

impl<H, Q, B> Clone for Pipeline<H, Q, B> {
    fn clone(&self) -> Self {
        Self {
            route: Arc::clone(&self.route),
            policy: self.policy,
            body_limit: self.body_limit,
            handler: Arc::clone(&self.handler),
            models: PhantomData,
        }
    }
}

impl<H, Q, B> Pipeline<H, Q, B>
where
    H: Handler<Q, B>,
    Q: DeserializeOwned + Send + 'static,
    B: DeserializeOwned + Default + Send + 'static,
{
    pub(crate) fn new(route: String, policy: ErrorPolicy, body_limit: usize, handler: H) -> Self {
        Self {
            route: route.into(),
            policy,
            body_limit,
            handler: Arc::new(handler),
            models: PhantomData,
        }
    }

    /// Run the pipeline for one request; never fails
    pub(crate) async fn dispatch(self, request: Request) -> Response {
        let span = tracing::debug_span!("dispatch", route = %self.route, policy = %self.policy);

        async move {
            match self.run(request).await {
                Ok(response) => response,
                Err(error) => self.fail(error),
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: Request) -> Result<Response> {
        let params = QueryParams::parse(request.uri().query().unwrap_or_default());
        let query: Q = bind_query(&params)?;

        let bytes = axum::body::to_bytes(request.into_body(), self.body_limit)
            .await
            .map_err(|e| Error::Decode(format!("Failed to read the request body: {e}")))?;
        let body: B = decode_body(&bytes)?;

        let handler = Arc::clone(&self.handler);
        let reply = AssertUnwindSafe(async move { handler.call(query, body).await })
            .catch_unwind()
            .await
            .map_err(|panic| {
                Error::Internal(format!("handler panicked: {}", panic_message(panic.as_ref())))
            })?;

        encode_reply(reply)
    }

    fn fail(&self, error: Error) -> Response {
        let response = self.policy.report(&error);
        if response.status().is_server_error() {
            tracing::error!(error = %error, "request failed");
        } else {
            tracing::debug!(error = %error, "rejected request");
        }
        response.into_response()
    }
}

/// Decode a JSON body; an empty or all-whitespace body yields `B::default()`
pub fn decode_body<B>(bytes: &Bytes) -> Result<B>
where
    B: DeserializeOwned + Default,
{
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(B::default());
    }

    // axum reports the path of the offending field, e.g. `age: invalid type`
    Json::<B>::from_bytes(bytes)
        .map(|Json(body)| body)
        .map_err(|rejection| Error::Decode(rejection.body_text()))
}

/// Serialize a handler outcome into the response written to the caller
pub fn encode_reply<R>(reply: Reply<R>) -> Result<Response>
where
    R: Serialize,
{
    match reply {
        Reply::Ok(response) => Ok(json_response(StatusCode::OK, &response)?),
        Reply::Err(error) => {
            tracing::debug!(status = error.status_code, "handler returned an error response");
            Ok(json_response(error.status(), &error)?)
        }
        Reply::Empty => Ok(StatusCode::OK.into_response()),
    }
}

fn json_response<T>(status: StatusCode, value: &T) -> Result<Response>
where
    T: Serialize + ?Sized,
{
    let bytes = serde_json::to_vec(value)?;
    Ok((
        status,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_JSON),
        )],
        bytes,
    )
        .into_response())
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{ser::Error as _, Serializer};

    #[derive(Debug, Deserialize, Default, PartialEq)]
    struct Student {
        name: String,
        age: i32,
    }

    #[derive(Serialize)]
    struct Unencodable {
        #[serde(serialize_with = "fail_serialize_unit")]
        value: (),
    }

    fn fail_serialize_unit<S: Serializer>(_: &(), _serializer: S) -> std::result::Result<S::Ok, S::Error> {
        Err(S::Error::custom("value cannot be serialized"))
    }

    #[test]
    fn test_policy_report() {
        let client = Error::Decode("age: invalid type".to_string());
        let server = Error::Internal("boom".to_string());

        let report = ErrorPolicy::StructuredError.report(&client);
        assert_eq!(report.status_code, 400);
        assert_eq!(report.entry("Error"), Some("age: invalid type"));

        assert_eq!(ErrorPolicy::StructuredError.report(&server), ErrorResponse::internal());
        assert_eq!(ErrorPolicy::FailFast.report(&client), ErrorResponse::internal());
        assert_eq!(ErrorPolicy::FailFast.report(&server), ErrorResponse::internal());
    }

    #[test]
    fn test_decode_empty_body_is_default() {
        let body: Student = decode_body(&Bytes::new()).unwrap();
        assert_eq!(body, Student::default());

        let body: Student = decode_body(&Bytes::from_static(b" \n\t")).unwrap();
        assert_eq!(body, Student::default());
    }

    #[test]
    fn test_decode_type_mismatch_names_field() {
        let err = decode_body::<Student>(&Bytes::from_static(br#"{"name":"N","age":"Adult"}"#))
            .unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("age"), "{err}");
    }

    #[test]
    fn test_decode_malformed_json() {
        let err = decode_body::<Student>(&Bytes::from_static(b"{\"name\":")).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_encode_empty_reply() {
        let response = encode_reply::<()>(Reply::Empty).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_encode_error_reply_sets_status() {
        let reply = Reply::<()>::Err(ErrorResponse::with_status(404));
        let response = encode_reply(reply).unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_encode_failure_is_reported() {
        let err = encode_reply(Reply::Ok(Unencodable { value: () })).unwrap_err();
        assert!(matches!(err, Error::Encode(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
