//! Secure-by-construction HTTP request handling.
//!
//! Every request flows through a chain of security *interceptors* around the
//! application handler, and every response body goes through a
//! [`Dispatcher`] that only accepts pre-vetted safe types. Together they
//! make the secure path the only one that compiles:
//!
//! - **One-shot writes**: a [`ResponseWriter`] produces at most one response
//!   per request. A second write is a programming error and panics.
//! - **Claimed headers**: an interceptor can [`claim`](Header::claim) a header
//!   name, after which only the returned [`HeaderSetter`] can change it.
//! - **Safe responses**: bodies are [`SafeHtml`], JSON or templates from a
//!   [`Templates`] set, which always escapes. Raw strings cannot be written.
//! - **Contained failures**: errors and panics discard every accumulated
//!   header, so a failed request never leaks a half-configured response.
//!
//! # Request lifecycle
//!
//! ```text
//! ServeMux::serve
//!   -> Before(1..n)       registration order; may write and stop the chain
//!   -> Handler            skipped if a Before hook wrote; 204 if it doesn't write
//!   -> Commit(n..1)       reverse order; headers only
//!      or OnError(n..1)   on write_error
//!   -> Dispatcher         content type + body
//!   -> ResponseSink
//! ```
//!
//! # Examples
//!
//! ```
//! use http::{Method, StatusCode};
//! use safeflight::plugins::Hsts;
//! use safeflight::testing::ResponseRecorder;
//! use safeflight::{handler_fn, DefaultDispatcher, IncomingRequest, SafeHtml, ServeMuxConfig};
//!
//! let mut config = ServeMuxConfig::new(DefaultDispatcher);
//! config.intercept(Hsts::default());
//! config.handle("/", Method::GET, handler_fn(|w, _req| {
//!     Ok(w.write(SafeHtml::escape("<h1>Hi</h1>"))?.into())
//! }));
//! let mux = config.mux().expect("routes are valid");
//!
//! let req = IncomingRequest::new(
//!     http::Request::get("https://example.com/").body(Vec::new()).unwrap(),
//! );
//! let mut rec = ResponseRecorder::new();
//! mux.serve(&req, &mut rec);
//!
//! assert_eq!(rec.status(), Some(StatusCode::OK));
//! assert_eq!(
//!     rec.header("strict-transport-security").as_deref(),
//!     Some("max-age=63072000; includeSubDomains")
//! );
//! assert_eq!(rec.body_string().as_deref(), Some("&lt;h1&gt;Hi&lt;/h1&gt;"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod capability;
mod config;
mod cookie;
mod dispatcher;
mod error;
mod flight;
mod flight_values;
mod form;
mod handler;
pub mod header;
mod interceptor;
mod mux;
pub mod plugins;
mod request;
mod response;
mod templates;
pub mod testing;

pub use capability::{Outcome, Written};
pub use config::{Config, ConfigError, CspSettings, HstsSettings, ValidationError};
pub use cookie::{Cookie, CookieDefaults, CookieError, CookieErrorKind, SameSite};
pub use dispatcher::{
    DefaultDispatcher, DispatchError, Dispatcher, HTML_CONTENT_TYPE, JSON_CONTENT_TYPE,
    JSON_XSSI_PREFIX,
};
pub use error::Error;
pub use flight::{ResponseHeadersWriter, ResponseSink, ResponseWriter};
pub use flight_values::{FlightKey, FlightValues};
pub use form::Form;
pub use handler::{handler_fn, Handler, HandlerFn};
pub use header::{Header, HeaderError, HeaderErrorKind, HeaderSetter};
pub use interceptor::{AsAny, Interceptor, InterceptorConfig};
pub use mux::{BuildError, RouteBuilder, ServeMux, ServeMuxConfig};
pub use request::{IncomingRequest, RequestError};
pub use response::{
    ErrorResponse, JsonResponse, RedirectResponse, Response, SafeHtml, TemplateResponse,
};
pub use templates::Templates;
