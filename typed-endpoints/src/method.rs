//! HTTP methods and routes

use std::fmt;
use std::str::FromStr;

use axum::routing::MethodFilter;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// HTTP method a handler is registered for
///
/// [`Method::Any`] matches every method not claimed by a more specific
/// registration on the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET
    Get,
    /// HEAD
    Head,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// CONNECT
    Connect,
    /// OPTIONS
    Options,
    /// TRACE
    Trace,
    /// Any method; written as the empty string
    #[serde(rename = "")]
    Any,
}

impl Method {
    /// Every method, in declaration order
    pub const ALL: [Method; 10] = [
        Method::Get,
        Method::Head,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
        Method::Connect,
        Method::Options,
        Method::Trace,
        Method::Any,
    ];

    /// Canonical name; empty for [`Method::Any`]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Connect => "CONNECT",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
            Self::Any => "",
        }
    }

    /// axum method filter, `None` for [`Method::Any`]
    pub fn filter(&self) -> Option<MethodFilter> {
        let filter = match self {
            Self::Get => MethodFilter::GET,
            Self::Head => MethodFilter::HEAD,
            Self::Post => MethodFilter::POST,
            Self::Put => MethodFilter::PUT,
            Self::Patch => MethodFilter::PATCH,
            Self::Delete => MethodFilter::DELETE,
            Self::Connect => MethodFilter::CONNECT,
            Self::Options => MethodFilter::OPTIONS,
            Self::Trace => MethodFilter::TRACE,
            Self::Any => return None,
        };
        Some(filter)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    /// Parse a method name; case-sensitive, as on the wire
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| Error::InvalidMethod(s.to_string()))
    }
}

impl TryFrom<&str> for Method {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A (method, path) pair identifying one registered handler
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    /// HTTP method
    pub method: Method,
    /// URL path, starting with `/`
    pub path: String,
}

impl Route {
    /// Create a route
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    /// Registration key: `"<METHOD> <path>"`, or the bare path for any method
    pub fn key(&self) -> String {
        match self.method {
            Method::Any => self.path.clone(),
            method => format!("{} {}", method, self.path),
        }
    }

    /// Check that the path can be registered
    pub fn validate(&self) -> crate::error::Result<()> {
        if !self.path.starts_with('/') {
            return Err(Error::InvalidRoute(format!(
                "path must start with '/': {:?}",
                self.path
            )));
        }
        if self.path.chars().any(char::is_whitespace) {
            return Err(Error::InvalidRoute(format!(
                "path must not contain whitespace: {:?}",
                self.path
            )));
        }
        if let Some(segment) = self
            .path
            .split('/')
            .find(|segment| segment.starts_with(':') || segment.starts_with('*'))
        {
            return Err(Error::InvalidRoute(format!(
                "path segment {:?} uses unsupported capture syntax, use {{name}} instead",
                segment
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
