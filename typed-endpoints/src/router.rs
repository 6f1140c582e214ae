//! Route registration
//!
//! [`Router`] is a write-once registration table over an [`axum::Router`].
//! Every route compiles its handler into a dispatch pipeline once, at
//! registration time; registering the same `"<METHOD> <path>"` key twice is
//! an error, not a panic.
//!
//! When no router is passed to [`handle`] or [`handle_fallible`], the
//! process-wide [`Router::global`] instance is used. It is created on first
//! use and lives until the process exits.
//!
//! # Example
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use typed_endpoints::{handle, Method, Router};
//!
//! #[derive(Deserialize)]
//! struct Query {
//!     #[serde(rename = "queryString")]
//!     text: String,
//! }
//!
//! #[derive(Deserialize, Default)]
//! struct Body {
//!     number: i64,
//! }
//!
//! #[derive(Serialize)]
//! struct Echo {
//!     #[serde(rename = "queryString")]
//!     text: String,
//!     #[serde(rename = "requestNumber")]
//!     number: i64,
//! }
//!
//! async fn echo(query: Query, body: Body) -> Echo {
//!     Echo { text: query.text, number: body.number }
//! }
//!
//! let router = Router::new();
//! handle("/echo", Method::Post, echo, Some(&router)).unwrap();
//! assert!(handle("/echo", Method::Post, echo, Some(&router)).is_err());
//!
//! let app: axum::Router = router.to_axum();
//! # let _ = app;
//! ```

use std::collections::BTreeSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use axum::{extract::Request, routing};
use once_cell::sync::Lazy;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::Config,
    error::{Error, Result},
    handler::{Fallible, Handler, Strict},
    method::{Method, Route},
    pipeline::{ErrorPolicy, Pipeline},
    reply::IntoReply,
};

/// Process-wide router used when none is supplied
static GLOBAL_ROUTER: Lazy<Router> = Lazy::new(Router::new);

/// Handler registration table
///
/// Cloning is cheap; clones share the same table.
#[derive(Debug, Clone)]
pub struct Router {
    table: Arc<RwLock<RouteTable>>,
}

#[derive(Debug)]
struct RouteTable {
    app: axum::Router,
    keys: BTreeSet<String>,
    body_limit: usize,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create an empty router with the default body limit
    pub fn new() -> Self {
        Self::with_body_limit(Config::default().middleware.body_limit_bytes())
    }

    /// Create an empty router whose routes read at most `bytes` of body
    pub fn with_body_limit(bytes: usize) -> Self {
        Self {
            table: Arc::new(RwLock::new(RouteTable {
                app: axum::Router::new(),
                keys: BTreeSet::new(),
                body_limit: bytes,
            })),
        }
    }

    /// Create an empty router configured from `config`
    pub fn from_config(config: &Config) -> Self {
        Self::with_body_limit(config.middleware.body_limit_bytes())
    }

    /// The process-wide default router
    pub fn global() -> &'static Router {
        &GLOBAL_ROUTER
    }

    /// Register `handler` for `route`, reporting failures per `policy`
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRoute`] if the path cannot be routed
    /// - [`Error::DuplicateRoute`] if the route's key is already registered
    pub fn register<H, Q, B>(&self, route: Route, policy: ErrorPolicy, handler: H) -> Result<()>
    where
        H: Handler<Q, B>,
        Q: DeserializeOwned + Send + 'static,
        B: DeserializeOwned + Default + Send + 'static,
    {
        route.validate()?;
        let key = route.key();

        let mut table = self.write()?;
        if table.keys.contains(&key) {
            return Err(Error::DuplicateRoute(key));
        }

        let pipeline = Pipeline::new(key.clone(), policy, table.body_limit, handler);
        let endpoint = move |request: Request| pipeline.clone().dispatch(request);
        let method_router = match route.method.filter() {
            Some(filter) => routing::on(filter, endpoint),
            None => routing::any(endpoint),
        };

        // axum panics on paths its matcher rejects; keep the table intact and
        // surface that as an error instead
        let app = table.app.clone();
        let app = std::panic::catch_unwind(AssertUnwindSafe(move || {
            app.route(&route.path, method_router)
        }))
        .map_err(|_| Error::InvalidRoute(format!("path rejected by the router: {}", key)))?;

        table.app = app;
        table.keys.insert(key.clone());

        tracing::info!(route = %key, policy = %policy, "Registered handler");
        Ok(())
    }

    /// Whether a handler is registered for `route`
    pub fn contains(&self, route: &Route) -> bool {
        self.table
            .read()
            .map(|table| table.keys.contains(&route.key()))
            .unwrap_or(false)
    }

    /// Registered keys, sorted
    pub fn routes(&self) -> Vec<String> {
        self.table
            .read()
            .map(|table| table.keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of the assembled axum router, ready to serve
    pub fn to_axum(&self) -> axum::Router {
        self.table
            .read()
            .map(|table| table.app.clone())
            .unwrap_or_default()
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RouteTable>> {
        self.table
            .write()
            .map_err(|_| Error::Internal("route table lock poisoned".to_string()))
    }
}

/// Register a strict handler; every pipeline failure is answered with an
/// opaque 500 error response
///
/// Uses the process-wide router when `router` is `None`.
pub fn handle<F, Fut, Q, B, R>(
    path: &str,
    method: Method,
    handler: F,
    router: Option<&Router>,
) -> Result<()>
where
    F: Fn(Q, B) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Serialize + Send + 'static,
    Q: DeserializeOwned + Send + 'static,
    B: DeserializeOwned + Default + Send + 'static,
{
    router.unwrap_or_else(|| Router::global()).register(
        Route::new(method, path),
        ErrorPolicy::FailFast,
        Strict(handler),
    )
}

/// Register a fallible handler; binding and decoding failures are answered
/// with a 400 error response carrying the message
///
/// Uses the process-wide router when `router` is `None`.
pub fn handle_fallible<F, Fut, Q, B>(
    path: &str,
    method: Method,
    handler: F,
    router: Option<&Router>,
) -> Result<()>
where
    F: Fn(Q, B) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoReply,
    Q: DeserializeOwned + Send + 'static,
    B: DeserializeOwned + Default + Send + 'static,
{
    router.unwrap_or_else(|| Router::global()).register(
        Route::new(method, path),
        ErrorPolicy::StructuredError,
        Fallible(handler),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::ErrorResponse;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request as HttpRequest, StatusCode},
        response::Response,
    };
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    #[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
    struct StudentInfo {
        name: String,
        age: i32,
        score: f32,
        #[serde(rename = "letterScore")]
        letter_score: u32,
        passed: bool,
    }

    #[derive(Debug, Deserialize)]
    struct StudentIdentifierInfo {
        #[serde(rename = "id")]
        id: String,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct StudentCompleteInfo {
        id: String,
        name: String,
        age: i32,
        score: f32,
        #[serde(rename = "letterScore")]
        letter_score: u32,
        passed: bool,
    }

    async fn combine_student_info(
        query: StudentIdentifierInfo,
        body: StudentInfo,
    ) -> (Option<StudentCompleteInfo>, Option<ErrorResponse>) {
        (
            Some(StudentCompleteInfo {
                id: query.id,
                name: body.name,
                age: body.age,
                score: body.score,
                letter_score: body.letter_score,
                passed: body.passed,
            }),
            None,
        )
    }

    async fn send(router: &Router, method: &str, uri: &str, body: impl Into<Body>) -> Response {
        let request = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap();
        router.to_axum().oneshot(request).await.unwrap()
    }

    async fn json_body<T: DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn student() -> StudentInfo {
        StudentInfo {
            name: "Name".to_string(),
            age: 20,
            score: 90.3,
            letter_score: 'A' as u32,
            passed: true,
        }
    }

    #[tokio::test]
    async fn test_query_and_body_are_combined() {
        let router = Router::new();
        handle_fallible("/combine", Method::Post, combine_student_info, Some(&router)).unwrap();

        let body = serde_json::to_vec(&student()).unwrap();
        let response = send(&router, "POST", "/combine?id=studentid", body).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body: StudentCompleteInfo = json_body(response).await;
        assert_eq!(
            body,
            StudentCompleteInfo {
                id: "studentid".to_string(),
                name: "Name".to_string(),
                age: 20,
                score: 90.3,
                letter_score: 'A' as u32,
                passed: true,
            }
        );
    }

    #[tokio::test]
    async fn test_type_mismatch_is_bad_request_and_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let router = Router::new();
        handle_fallible(
            "/combine",
            Method::Post,
            move |query: StudentIdentifierInfo, body: StudentInfo| {
                counter.fetch_add(1, Ordering::SeqCst);
                combine_student_info(query, body)
            },
            Some(&router),
        )
        .unwrap();

        let body = serde_json::json!({
            "name": "Name",
            "age": "Adult",
            "score": "Enough",
            "letterScore": 1,
            "passed": "maybe",
        });
        let response = send(&router, "POST", "/combine?id=studentid", body.to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error: ErrorResponse = json_body(response).await;
        assert_eq!(error.status_code, 400);
        let message = error.entry("Error").unwrap();
        assert!(message.contains("age"), "{message}");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeated_query_parameter_is_bad_request() {
        let router = Router::new();
        handle_fallible("/combine", Method::Post, combine_student_info, Some(&router)).unwrap();

        let response = send(&router, "POST", "/combine?id=a&id=b", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error: ErrorResponse = json_body(response).await;
        assert_eq!(
            error,
            ErrorResponse::bad_request("repeated query parameter `id` is not supported")
        );
    }

    #[tokio::test]
    async fn test_empty_body_invokes_handler_with_default() {
        let router = Router::new();
        handle_fallible("/combine", Method::Post, combine_student_info, Some(&router)).unwrap();

        let response = send(&router, "POST", "/combine?id=studentid", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: StudentCompleteInfo = json_body(response).await;
        assert_eq!(body.id, "studentid");
        assert_eq!(body.name, "");
        assert_eq!(body.age, 0);
        assert!(!body.passed);
    }

    #[tokio::test]
    async fn test_duplicate_registration_fails() {
        let router = Router::new();
        handle_fallible("/combine", Method::Post, combine_student_info, Some(&router)).unwrap();

        let err = handle_fallible("/combine", Method::Post, combine_student_info, Some(&router))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateRoute(ref key) if key == "POST /combine"));

        // Same path, different method is a different route
        handle_fallible("/combine", Method::Put, combine_student_info, Some(&router)).unwrap();
        assert_eq!(router.routes(), vec!["POST /combine", "PUT /combine"]);
    }

    #[tokio::test]
    async fn test_fallible_error_response_is_written_verbatim() {
        let router = Router::new();
        handle_fallible(
            "/reject",
            Method::Post,
            |_query: StudentIdentifierInfo, _body: StudentInfo| async {
                let error = ErrorResponse::bad_request("student not found").with_entry("Id", "x");
                (None::<StudentCompleteInfo>, Some(error))
            },
            Some(&router),
        )
        .unwrap();

        let response = send(&router, "POST", "/reject?id=x", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let value: serde_json::Value = json_body(response).await;
        assert_eq!(
            value,
            serde_json::json!({
                "statusCode": 400,
                "errorMessage": {"Error": "student not found", "Id": "x"}
            })
        );
    }

    #[tokio::test]
    async fn test_fallible_empty_reply_writes_empty_body() {
        let router = Router::new();
        handle_fallible(
            "/nothing",
            Method::Get,
            |_query: StudentIdentifierInfo, _body: StudentInfo| async {
                (None::<StudentCompleteInfo>, None)
            },
            Some(&router),
        )
        .unwrap();

        let response = send(&router, "GET", "/nothing", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_strict_handler_hides_failures_behind_internal_error() {
        let router = Router::new();
        handle(
            "/strict",
            Method::Post,
            |query: StudentIdentifierInfo, body: StudentInfo| async move {
                StudentCompleteInfo {
                    id: query.id,
                    name: body.name,
                    age: body.age,
                    score: body.score,
                    letter_score: body.letter_score,
                    passed: body.passed,
                }
            },
            Some(&router),
        )
        .unwrap();

        let response = send(&router, "POST", "/strict?id=1", r#"{"age":"Adult"}"#).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let error: ErrorResponse = json_body(response).await;
        assert_eq!(error, ErrorResponse::internal());
    }

    #[tokio::test]
    async fn test_strict_handler_success() {
        let router = Router::new();
        handle(
            "/strict",
            Method::Post,
            |query: StudentIdentifierInfo, body: StudentInfo| async move {
                serde_json::json!({"id": query.id, "name": body.name})
            },
            Some(&router),
        )
        .unwrap();

        let response = send(&router, "POST", "/strict?id=7", r#"{"name":"Ada"}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
        let value: serde_json::Value = json_body(response).await;
        assert_eq!(value, serde_json::json!({"id": "7", "name": "Ada"}));
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_internal_error() {
        let router = Router::new();
        async fn explode(
            _query: StudentIdentifierInfo,
            _body: StudentInfo,
        ) -> std::result::Result<StudentCompleteInfo, ErrorResponse> {
            panic!("handler exploded")
        }
        handle_fallible("/panic", Method::Post, explode, Some(&router)).unwrap();

        let response = send(&router, "POST", "/panic", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error: ErrorResponse = json_body(response).await;
        assert_eq!(error, ErrorResponse::internal());
    }

    #[tokio::test]
    async fn test_body_over_limit_is_rejected_as_json() {
        let router = Router::with_body_limit(8);
        handle_fallible("/combine", Method::Post, combine_student_info, Some(&router)).unwrap();

        let body = serde_json::to_vec(&student()).unwrap();
        let response = send(&router, "POST", "/combine?id=x", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ErrorResponse = json_body(response).await;
        assert!(error.entry("Error").unwrap().contains("request body"));
    }

    #[tokio::test]
    async fn test_any_method_route_and_specific_route_share_path() {
        let router = Router::new();
        handle_fallible(
            "/who",
            Method::Any,
            |_q: StudentIdentifierInfo, _b: StudentInfo| async { Ok::<_, ErrorResponse>("any") },
            Some(&router),
        )
        .unwrap();
        handle_fallible(
            "/who",
            Method::Delete,
            |_q: StudentIdentifierInfo, _b: StudentInfo| async { Ok::<_, ErrorResponse>("delete") },
            Some(&router),
        )
        .unwrap();

        let value: String = json_body(send(&router, "DELETE", "/who", Body::empty()).await).await;
        assert_eq!(value, "delete");
        let value: String = json_body(send(&router, "PATCH", "/who", Body::empty()).await).await;
        assert_eq!(value, "any");
    }

    #[test]
    fn test_invalid_path_is_rejected() {
        let router = Router::new();
        let err = handle_fallible("no-slash", Method::Get, combine_student_info, Some(&router))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRoute(_)));
        assert!(router.routes().is_empty());
    }

    #[test]
    fn test_global_router_is_shared() {
        handle_fallible(
            "/router-tests/global",
            Method::Get,
            combine_student_info,
            None,
        )
        .unwrap();

        assert!(Router::global().contains(&Route::new(Method::Get, "/router-tests/global")));
        assert!(std::ptr::eq(Router::global(), Router::global()));
    }
}
