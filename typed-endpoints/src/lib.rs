//! # typed-endpoints
//!
//! Typed HTTP endpoints on top of axum. Register a handler that takes a query
//! model and a JSON body model and returns a response model; the crate binds,
//! decodes, invokes and serializes for every request.
//!
//! ## Features
//!
//! - **Query binding**: query strings bound onto string-field structs by
//!   their serde names, repeated keys rejected
//! - **Body decoding**: JSON bodies decoded into the body model, an empty body
//!   yields its `Default`
//! - **Two handler shapes**: strict handlers that always answer, and fallible
//!   handlers that may answer with an [`ErrorResponse`]
//! - **Structured errors**: every failure becomes a JSON error response with a
//!   matching status code
//! - **Registration checks**: duplicate method/path pairs fail at startup
//! - **Server**: tower-http middleware stack and graceful shutdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use serde::{Deserialize, Serialize};
//! use typed_endpoints::prelude::*;
//!
//! #[derive(Deserialize)]
//! struct StudentId {
//!     #[serde(rename = "id")]
//!     id: String,
//! }
//!
//! #[derive(Deserialize, Default)]
//! struct Student {
//!     name: String,
//! }
//!
//! #[derive(Serialize)]
//! struct Enrolled {
//!     id: String,
//!     name: String,
//! }
//!
//! async fn enroll(query: StudentId, body: Student) -> Result<Enrolled, ErrorResponse> {
//!     if body.name.is_empty() {
//!         return Err(ErrorResponse::bad_request("name is required"));
//!     }
//!     Ok(Enrolled { id: query.id, name: body.name })
//! }
//!
//! #[tokio::main]
//! async fn main() -> typed_endpoints::Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     handle_fallible("/enroll", Method::Post, enroll, None)?;
//!
//!     Server::new(config).serve(Router::global().to_axum()).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod method;
pub mod middleware;
pub mod observability;
pub mod pipeline;
pub mod query;
pub mod reply;
pub mod router;
pub mod server;

pub use config::Config;
pub use error::{BindingError, Error, Result};
pub use handler::{Fallible, Handler, Strict};
pub use method::{Method, Route};
pub use pipeline::ErrorPolicy;
pub use query::{bind_query, from_query_str, QueryParams};
pub use reply::{ErrorResponse, IntoReply, Reply};
pub use router::{handle, handle_fallible, Router};
pub use server::Server;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{BindingError, Error};
    pub use crate::handler::{Fallible, Handler, Strict};
    pub use crate::method::{Method, Route};
    pub use crate::middleware::{
        request_id_layer, request_id_propagation_layer, sensitive_headers_layer,
        SENSITIVE_HEADERS,
    };
    pub use crate::observability::{init_tracing, shutdown_tracing};
    pub use crate::pipeline::ErrorPolicy;
    pub use crate::query::{bind_query, QueryParams};
    pub use crate::reply::{ErrorResponse, IntoReply, Reply};
    pub use crate::router::{handle, handle_fallible, Router};
    pub use crate::server::Server;
}
