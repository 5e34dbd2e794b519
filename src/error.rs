use std::io;

use thiserror::Error;

use crate::cookie::CookieError;
use crate::dispatcher::DispatchError;
use crate::header::HeaderError;
use crate::request::RequestError;

/// Errors that can abort a request inside the pipeline.
///
/// Any `Err` that escapes an interceptor hook or a handler is contained by the
/// engine: response headers are discarded and, if nothing has reached the
/// transport yet, a bare `500 Internal Server Error` is sent instead.
///
/// Double writes are not represented here. They are programming errors and
/// panic.
#[derive(Debug, Error)]
pub enum Error {
    /// A header could not be read or written.
    #[error("header error: {0}")]
    Header(#[from] HeaderError),
    /// The dispatcher refused or failed to serialize a response.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    /// The incoming request failed validation.
    #[error("request error: {0}")]
    Request(#[from] RequestError),
    /// A cookie failed validation.
    #[error("cookie error: {0}")]
    Cookie(#[from] CookieError),
    /// A status code was outside the range an operation accepts.
    #[error("invalid status code {code}: expected {expected}")]
    InvalidStatus {
        /// The rejected code
        code: u16,
        /// Human-readable description of the accepted range
        expected: &'static str,
    },
    /// The transport sink failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// A component aborted the request explicitly.
    #[error("request aborted: {0}")]
    Aborted(String),
}

impl Error {
    /// Creates an explicit abort with a message.
    ///
    /// # Examples
    ///
    /// ```
    /// use safeflight::Error;
    ///
    /// let err = Error::aborted("upstream policy service unavailable");
    /// assert_eq!(err.to_string(), "request aborted: upstream policy service unavailable");
    /// ```
    pub fn aborted(message: impl Into<String>) -> Self {
        Error::Aborted(message.into())
    }
}
