//! In-memory transport for tests.
//!
//! [`ResponseRecorder`] captures what the engine sends, and
//! [`serve_contained`] plays the role of a server's panic boundary.

use std::panic::{self, AssertUnwindSafe};

use http::header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderValue, StatusCode};

use crate::flight::{panic_message, ResponseSink};
use crate::mux::ServeMux;
use crate::request::IncomingRequest;

/// A [`ResponseSink`] that stores every response it receives.
///
/// # Examples
///
/// ```
/// use safeflight::testing::ResponseRecorder;
/// use safeflight::{handler_fn, DefaultDispatcher, IncomingRequest, SafeHtml, ServeMuxConfig};
///
/// let mut config = ServeMuxConfig::new(DefaultDispatcher);
/// config.handle("/", http::Method::GET, handler_fn(|w, _| {
///     Ok(w.write(SafeHtml::escape("hi"))?.into())
/// }));
/// let mux = config.mux().unwrap();
///
/// let mut rec = ResponseRecorder::new();
/// let req = IncomingRequest::new(http::Request::get("/").body(Vec::new()).unwrap());
/// mux.serve(&req, &mut rec);
/// assert_eq!(rec.status(), Some(http::StatusCode::OK));
/// assert_eq!(rec.body_string().as_deref(), Some("hi"));
/// ```
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    responses: Vec<http::Response<Vec<u8>>>,
}

impl ResponseRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every response received, oldest first.
    pub fn responses(&self) -> &[http::Response<Vec<u8>>] {
        &self.responses
    }

    /// Returns the first response received.
    pub fn response(&self) -> Option<&http::Response<Vec<u8>>> {
        self.responses.first()
    }

    /// Returns the status of the first response.
    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(|r| r.status())
    }

    /// Returns the first value of header `name` on the first response.
    pub fn header(&self, name: &str) -> Option<String> {
        self.response()?
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }

    /// Returns every value of header `name` on the first response.
    pub fn header_values(&self, name: &str) -> Vec<String> {
        self.response()
            .map(|r| {
                r.headers()
                    .get_all(name)
                    .iter()
                    .filter_map(|v| v.to_str().ok())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the body of the first response.
    pub fn body(&self) -> Option<&[u8]> {
        self.response().map(|r| r.body().as_slice())
    }

    /// Returns the body of the first response as UTF-8.
    pub fn body_string(&self) -> Option<String> {
        self.body()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

impl ResponseSink for ResponseRecorder {
    fn send(&mut self, response: http::Response<Vec<u8>>) -> std::io::Result<()> {
        self.responses.push(response);
        Ok(())
    }
}

/// Serves `req` and turns an escaped panic into a generic `500`.
///
/// Returns the panic message if a panic was contained. The `500` is only
/// recorded if nothing had been sent yet.
pub fn serve_contained(
    mux: &ServeMux,
    req: &IncomingRequest,
    rec: &mut ResponseRecorder,
) -> Option<String> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| mux.serve(req, rec)));
    let payload = result.err()?;
    let message = panic_message(&*payload).to_owned();

    if rec.responses.is_empty() {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let mut response =
            http::Response::new(status.canonical_reason().unwrap_or("").as_bytes().to_vec());
        *response.status_mut() = status;
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
            .headers_mut()
            .insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        rec.responses.push(response);
    }
    Some(message)
}
