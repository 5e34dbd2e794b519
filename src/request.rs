use std::fmt;

use http::header::{CONTENT_TYPE, COOKIE, HOST};
use http::{HeaderMap, Method, Uri};
use thiserror::Error;

use crate::form::Form;

/// Error returned when incoming request data fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The body is not `application/x-www-form-urlencoded`.
    #[error("unsupported content type {0:?}")]
    UnsupportedContentType(String),
    /// The method does not carry a form body.
    #[error("method {0} does not carry a form body")]
    UnsupportedMethod(Method),
    /// A percent escape was malformed or decoded to invalid UTF-8.
    #[error("malformed form encoding")]
    MalformedEncoding,
    /// A required parameter was absent.
    #[error("missing field {0:?}")]
    MissingField(String),
    /// A parameter did not parse as the requested type.
    #[error("field {field:?} is not {expected}")]
    InvalidField {
        /// Parameter name
        field: String,
        /// What the value should have been
        expected: &'static str,
    },
}

/// The request as seen by interceptors and handlers.
///
/// Read-only: nothing in the pipeline can alter the request. Whether it
/// arrived over TLS is decided by the host; by default it is inferred from an
/// `https` URI scheme.
///
/// # Examples
///
/// ```
/// use safeflight::IncomingRequest;
///
/// let req = IncomingRequest::new(
///     http::Request::get("https://example.com:8443/search?q=rust")
///         .body(Vec::new())
///         .unwrap(),
/// );
/// assert!(req.is_tls());
/// assert_eq!(req.host(), "example.com:8443");
/// assert_eq!(req.hostname(), "example.com");
/// assert_eq!(req.path(), "/search");
/// assert_eq!(req.query().unwrap().string("q", ""), "rust");
/// ```
pub struct IncomingRequest {
    inner: http::Request<Vec<u8>>,
    tls: bool,
}

impl IncomingRequest {
    /// Wraps a parsed HTTP request.
    pub fn new(inner: http::Request<Vec<u8>>) -> Self {
        let tls = inner.uri().scheme_str() == Some("https");
        Self { inner, tls }
    }

    /// Overrides whether the connection used TLS.
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    /// Returns the request URI.
    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// Returns the URI path.
    pub fn path(&self) -> &str {
        self.inner.uri().path()
    }

    /// Returns the host the request was addressed to, including any port.
    ///
    /// Taken from the `Host` header, falling back to the URI authority.
    pub fn host(&self) -> &str {
        self.inner
            .headers()
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| self.inner.uri().authority().map(|a| a.as_str()))
            .unwrap_or("")
    }

    /// Returns [`host`](Self::host) without the port.
    pub fn hostname(&self) -> &str {
        let host = self.host();
        if host.starts_with('[') {
            // IPv6 literal
            return match host.find(']') {
                Some(end) => &host[..=end],
                None => host,
            };
        }
        host.split(':').next().unwrap_or(host)
    }

    /// Returns true if the request arrived over TLS.
    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Returns the first value of header `name` as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the raw request body.
    pub fn body(&self) -> &[u8] {
        self.inner.body()
    }

    /// Returns the value of the first cookie named `name`.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.inner
            .headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.trim_matches('"'))
    }

    /// Parses the URI query string.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::MalformedEncoding`] for bad escapes.
    pub fn query(&self) -> Result<Form, RequestError> {
        Form::parse(self.inner.uri().query().unwrap_or(""))
    }

    /// Parses a urlencoded `POST`, `PUT` or `PATCH` body.
    ///
    /// # Errors
    ///
    /// Fails for other methods, for other content types, and for malformed
    /// encoding.
    pub fn post_form(&self) -> Result<Form, RequestError> {
        let method = self.method();
        if !(method == Method::POST || method == Method::PUT || method == Method::PATCH) {
            return Err(RequestError::UnsupportedMethod(method.clone()));
        }

        let content_type = self
            .inner
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let media_type = content_type.split(';').next().unwrap_or("").trim();
        if !media_type.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            return Err(RequestError::UnsupportedContentType(content_type.to_owned()));
        }

        let body =
            std::str::from_utf8(self.inner.body()).map_err(|_| RequestError::MalformedEncoding)?;
        Form::parse(body)
    }
}

impl From<http::Request<Vec<u8>>> for IncomingRequest {
    fn from(inner: http::Request<Vec<u8>>) -> Self {
        Self::new(inner)
    }
}

// Bodies are omitted to avoid leaking request data into logs.
impl fmt::Debug for IncomingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingRequest")
            .field("method", self.method())
            .field("uri", self.uri())
            .field("tls", &self.tls)
            .field("body_len", &self.inner.body().len())
            .finish()
    }
}
