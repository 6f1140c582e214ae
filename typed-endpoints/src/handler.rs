//! Typed handler trait
//!
//! A [`Handler<Q, B>`] turns a bound query model `Q` and a decoded body
//! model `B` into a [`Reply`]. The types are fixed once, when the handler is
//! registered; nothing is inspected per request.
//!
//! Plain async functions become handlers through one of two adapters:
//!
//! - [`Strict`] for `async fn(Q, B) -> R`
//! - [`Fallible`] for `async fn(Q, B) -> O` where `O: IntoReply`, e.g.
//!   `Result<R, ErrorResponse>` or `(Option<R>, Option<ErrorResponse>)`
//!
//! # Example
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use typed_endpoints::{ErrorResponse, Fallible, Handler, Strict};
//!
//! #[derive(Deserialize)]
//! struct Query {
//!     #[serde(rename = "name")]
//!     name: String,
//! }
//!
//! #[derive(Deserialize, Default)]
//! struct Body {}
//!
//! #[derive(Serialize)]
//! struct Greeting {
//!     message: String,
//! }
//!
//! async fn greet(query: Query, _body: Body) -> Greeting {
//!     Greeting { message: format!("hello {}", query.name) }
//! }
//!
//! async fn greet_checked(query: Query, body: Body) -> Result<Greeting, ErrorResponse> {
//!     if query.name.is_empty() {
//!         return Err(ErrorResponse::bad_request("name is required"));
//!     }
//!     Ok(greet(query, body).await)
//! }
//!
//! fn assert_handler<Q, B>(_: impl Handler<Q, B>) {}
//!
//! assert_handler::<Query, Body>(Strict(greet));
//! assert_handler::<Query, Body>(Fallible(greet_checked));
//! ```

use std::future::Future;

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;

use crate::reply::{IntoReply, Reply};

/// Handler invoked with a bound query model and a decoded body model
pub trait Handler<Q, B>: Send + Sync + 'static {
    /// Response model serialized on success
    type Response: Serialize + Send + 'static;

    /// Invoke the handler
    fn call(&self, query: Q, body: B) -> BoxFuture<'static, Reply<Self::Response>>;
}

/// Adapter for handlers that always produce a response model
#[derive(Debug, Clone, Copy)]
pub struct Strict<F>(pub F);

impl<F, Fut, Q, B, R> Handler<Q, B> for Strict<F>
where
    F: Fn(Q, B) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Serialize + Send + 'static,
{
    type Response = R;

    fn call(&self, query: Q, body: B) -> BoxFuture<'static, Reply<R>> {
        (self.0)(query, body).map(Reply::Ok).boxed()
    }
}

/// Adapter for handlers that may answer with an [`ErrorResponse`](crate::ErrorResponse)
#[derive(Debug, Clone, Copy)]
pub struct Fallible<F>(pub F);

impl<F, Fut, Q, B> Handler<Q, B> for Fallible<F>
where
    F: Fn(Q, B) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoReply,
{
    type Response = <Fut::Output as IntoReply>::Response;

    fn call(&self, query: Q, body: B) -> BoxFuture<'static, Reply<Self::Response>> {
        (self.0)(query, body).map(IntoReply::into_reply).boxed()
    }
}
