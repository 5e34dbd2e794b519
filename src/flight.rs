//! The request-processing engine.
//!
//! A *flight* is the lifetime of one request through the pipeline:
//!
//! ```text
//! Before(1..n) -> Handler -> Commit(n..1) -> Dispatcher -> sink
//!                        \-> OnError(n..1) --------------> sink
//! ```
//!
//! [`ResponseWriter`] is the flight's handle. Its write-class methods
//! ([`write`](ResponseWriter::write), [`no_content`](ResponseWriter::no_content),
//! [`write_error`](ResponseWriter::write_error) and
//! [`redirect`](ResponseWriter::redirect)) may be called at most once per
//! request; a second call panics.
//!
//! Failures are contained here. An error escaping a Before hook, the handler
//! or a Commit hook, or a dispatcher rejection, discards every accumulated
//! header and sends a bare `500` if nothing reached the sink yet. A panic
//! discards the headers too and is then resumed for the host to handle.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use http::header::{CONTENT_TYPE, LOCATION, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderValue, StatusCode};
use tracing::{debug, debug_span, error, warn};

use crate::capability::{Outcome, Written};
use crate::cookie::{Cookie, CookieDefaults};
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::flight_values::FlightValues;
use crate::handler::Handler;
use crate::header::{Header, HeaderError, HeaderErrorKind};
use crate::interceptor::ConfiguredInterceptor;
use crate::request::IncomingRequest;
use crate::response::{ErrorResponse, RedirectResponse, Response};

const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Transport boundary receiving the finished response.
///
/// The engine calls [`send`](Self::send) at most once per request with the
/// complete status, headers and body.
pub trait ResponseSink {
    /// Delivers the response to the client.
    ///
    /// # Errors
    ///
    /// Returns the transport's I/O error.
    fn send(&mut self, response: http::Response<Vec<u8>>) -> std::io::Result<()>;
}

/// Everything the engine needs to serve one route: the handler, its
/// interceptors with their resolved overrides, and the dispatcher.
#[derive(Clone)]
pub(crate) struct HandlerConfig {
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) interceptors: Vec<ConfiguredInterceptor>,
    pub(crate) dispatcher: Arc<dyn Dispatcher>,
    pub(crate) cookie_defaults: CookieDefaults,
}

/// The per-request handle given to Before hooks and handlers.
///
/// Owns the request's header collection, pending status code and flight
/// values. It is not `Send`: a flight belongs to the worker serving it.
pub struct ResponseWriter<'r> {
    sink: &'r mut dyn ResponseSink,
    req: &'r IncomingRequest,
    cfg: &'r HandlerConfig,
    code: StatusCode,
    header: Header,
    flight_values: FlightValues,
    // Interceptors whose Before hook was entered, counted from the front.
    before_ran: usize,
    written: bool,
    sent: bool,
}

impl<'r> ResponseWriter<'r> {
    pub(crate) fn new(
        sink: &'r mut dyn ResponseSink,
        req: &'r IncomingRequest,
        cfg: &'r HandlerConfig,
    ) -> Self {
        Self {
            sink,
            req,
            cfg,
            code: StatusCode::OK,
            header: Header::new(),
            flight_values: FlightValues::new(),
            before_ran: 0,
            written: false,
            sent: false,
        }
    }

    /// Returns the response headers.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the response headers for writing.
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Returns the request's flight values.
    pub fn flight_values(&self) -> &FlightValues {
        &self.flight_values
    }

    /// Returns the request's flight values for writing.
    pub fn flight_values_mut(&mut self) -> &mut FlightValues {
        &mut self.flight_values
    }

    /// Returns the cookie defaults configured for this mux.
    pub fn cookie_defaults(&self) -> CookieDefaults {
        self.cfg.cookie_defaults
    }

    /// Adds a `Set-Cookie` header.
    ///
    /// # Errors
    ///
    /// Fails if the cookie does not serialize to a valid header value.
    pub fn set_cookie(&mut self, cookie: &Cookie) -> Result<(), Error> {
        self.header.append_cookie(cookie.to_header_value()?);
        Ok(())
    }

    /// Sets the status code used by [`write`](Self::write).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStatus`] outside `[100, 600)`.
    pub fn set_code(&mut self, code: StatusCode) -> Result<(), Error> {
        check_range(code, 100..600, "a code in [100, 600)")?;
        self.code = code;
        Ok(())
    }

    /// Returns the pending status code.
    pub fn code(&self) -> StatusCode {
        self.code
    }

    /// Returns true once a write-class method has been called.
    pub fn is_written(&self) -> bool {
        self.written
    }

    /// Writes a safe response.
    ///
    /// Runs every Commit hook, then asks the dispatcher for the content type
    /// and body, and sends the result with the pending status code.
    ///
    /// # Errors
    ///
    /// A Commit hook failure or a dispatcher rejection is returned; the
    /// engine then replaces the response with a contained 500.
    ///
    /// # Panics
    ///
    /// Panics if a response has already been written.
    pub fn write(&mut self, resp: impl Into<Response>) -> Result<Written, Error> {
        self.mark_written("write");
        let mut resp = resp.into();
        self.commit_phase(&mut resp)?;
        self.finish(resp)
    }

    /// Sends `204 No Content`.
    ///
    /// # Errors
    ///
    /// Returns a Commit hook failure.
    ///
    /// # Panics
    ///
    /// Panics if a response has already been written.
    pub fn no_content(&mut self) -> Result<Written, Error> {
        self.mark_written("no_content");
        let mut resp = Response::NoContent;
        self.commit_phase(&mut resp)?;
        self.finish(resp)
    }

    /// Sends an error status with a plain-text reason phrase.
    ///
    /// OnError hooks run instead of Commit hooks. The status sent is exactly
    /// `code`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStatus`] outside `[400, 600)`.
    ///
    /// # Panics
    ///
    /// Panics if a response has already been written.
    pub fn write_error(&mut self, code: StatusCode) -> Result<Written, Error> {
        self.assert_not_written("write_error");
        check_range(code, 400..600, "an error code in [400, 600)")?;
        self.mark_written("write_error");
        self.code = code;

        let resp = ErrorResponse::new(code);
        self.error_phase(&resp);

        let body = code.canonical_reason().unwrap_or("Error").as_bytes().to_vec();
        self.header
            .set_privileged(CONTENT_TYPE, HeaderValue::from_static(PLAIN_TEXT));
        self.header
            .set_privileged(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        self.send(code, body)?;
        Ok(Written::new())
    }

    /// Redirects to `url`.
    ///
    /// A relative `url` is resolved against the path of `req`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStatus`] outside `[300, 400)`, a header error
    /// if the target is not a valid header value, or a Commit hook failure.
    ///
    /// # Panics
    ///
    /// Panics if a response has already been written.
    pub fn redirect(
        &mut self,
        req: &IncomingRequest,
        url: &str,
        code: StatusCode,
    ) -> Result<Written, Error> {
        self.assert_not_written("redirect");
        check_range(code, 300..400, "a redirect code in [300, 400)")?;
        self.mark_written("redirect");

        let location = resolve_location(req.path(), url);
        let mut resp = Response::Redirect(RedirectResponse::new(location, code));
        self.commit_phase(&mut resp)?;
        self.finish(resp)
    }

    fn assert_not_written(&self, op: &str) {
        if self.written {
            panic!("{op}: response already written for this request");
        }
    }

    fn mark_written(&mut self, op: &str) {
        self.assert_not_written(op);
        self.written = true;
    }

    fn commit_phase(&mut self, resp: &mut Response) -> Result<(), Error> {
        let cfg = self.cfg;
        let req = self.req;
        for it in cfg.interceptors[..self.before_ran].iter().rev() {
            debug!(interceptor = it.name(), response = resp.kind(), "commit");
            let mut hw = ResponseHeadersWriter { flight: &mut *self };
            it.interceptor().commit(&mut hw, req, resp, it.config())?;
        }
        Ok(())
    }

    fn error_phase(&mut self, resp: &ErrorResponse) {
        let cfg = self.cfg;
        let req = self.req;
        for it in cfg.interceptors[..self.before_ran].iter().rev() {
            debug!(interceptor = it.name(), code = resp.code().as_u16(), "on_error");
            let mut hw = ResponseHeadersWriter { flight: &mut *self };
            if let Err(err) = it.interceptor().on_error(&mut hw, req, resp, it.config()) {
                warn!(interceptor = it.name(), error = %err, "on_error hook failed");
            }
        }
    }

    fn finish(&mut self, resp: Response) -> Result<Written, Error> {
        match resp {
            Response::NoContent => self.send(StatusCode::NO_CONTENT, Vec::new())?,
            Response::Redirect(redirect) => {
                let location = HeaderValue::from_str(redirect.location()).map_err(|_| {
                    HeaderError::new(HeaderErrorKind::InvalidValue, LOCATION.as_str())
                })?;
                self.header.set_privileged(LOCATION, location);
                self.send(redirect.code(), Vec::new())?;
            }
            resp => {
                let cfg = self.cfg;
                let dispatcher = &*cfg.dispatcher;
                let content_type = dispatcher.content_type(&resp)?;
                let mut body = Vec::new();
                dispatcher.write(&mut body, &resp)?;
                let content_type = HeaderValue::from_str(&content_type).map_err(|_| {
                    HeaderError::new(HeaderErrorKind::InvalidValue, CONTENT_TYPE.as_str())
                })?;
                self.header.set_privileged(CONTENT_TYPE, content_type);
                self.send(self.code, body)?;
            }
        }
        Ok(Written::new())
    }

    fn send(&mut self, status: StatusCode, body: Vec<u8>) -> Result<(), Error> {
        let mut response = http::Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = self.header.snapshot();
        self.sent = true;
        debug!(status = status.as_u16(), "sending response");
        self.sink.send(response)?;
        Ok(())
    }

    fn run(&mut self) -> Result<(), Error> {
        let cfg = self.cfg;
        let req = self.req;

        for it in &cfg.interceptors {
            self.before_ran += 1;
            debug!(interceptor = it.name(), "before");
            let outcome = it.interceptor().before(self, req, it.config())?;
            if outcome.is_written() || self.written {
                debug!(interceptor = it.name(), "before hook wrote the response");
                return self.check_delivered();
            }
        }

        debug!("handler");
        let _outcome: Outcome = cfg.handler.serve(self, req)?;
        if !self.written {
            debug!("handler did not write; sending 204");
            let _ = self.no_content()?;
        }
        self.check_delivered()
    }

    // A write whose error was swallowed leaves the flight written but unsent.
    fn check_delivered(&self) -> Result<(), Error> {
        if self.written && !self.sent {
            return Err(Error::aborted("response was written but never delivered"));
        }
        Ok(())
    }

    fn abort(&mut self, err: &Error) {
        warn!(error = %err, "request aborted; discarding headers");
        self.header.clear();
        self.written = true;
        if self.sent {
            return;
        }
        self.header
            .set_privileged(CONTENT_TYPE, HeaderValue::from_static(PLAIN_TEXT));
        self.header
            .set_privileged(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let body = status.canonical_reason().unwrap_or("").as_bytes().to_vec();
        if let Err(err) = self.send(status, body) {
            error!(error = %err, "failed to send 500");
        }
    }

    /// Runs the flight, containing errors and panics.
    ///
    /// Returns the panic payload if one escaped; headers have been cleared by
    /// then.
    pub(crate) fn run_contained(&mut self) -> Result<(), Box<dyn Any + Send>> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run()));
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                self.abort(&err);
                Ok(())
            }
            Err(payload) => {
                error!(
                    panic = panic_message(&*payload),
                    "panic while serving request; discarding headers"
                );
                self.header.clear();
                Err(payload)
            }
        }
    }
}

impl std::fmt::Debug for ResponseWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("code", &self.code)
            .field("header", &self.header)
            .field("flight_values", &self.flight_values)
            .field("written", &self.written)
            .finish()
    }
}

/// The header-only view of a flight given to Commit and OnError hooks.
///
/// It has no write-class methods, so a hook cannot produce a second body.
pub struct ResponseHeadersWriter<'w, 'r> {
    flight: &'w mut ResponseWriter<'r>,
}

impl ResponseHeadersWriter<'_, '_> {
    /// Returns the response headers.
    pub fn header(&self) -> &Header {
        &self.flight.header
    }

    /// Returns the response headers for writing.
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.flight.header
    }

    /// Adds a `Set-Cookie` header.
    ///
    /// # Errors
    ///
    /// See [`ResponseWriter::set_cookie`].
    pub fn set_cookie(&mut self, cookie: &Cookie) -> Result<(), Error> {
        self.flight.set_cookie(cookie)
    }

    /// Changes the status code of a dispatched response.
    ///
    /// Has no effect on redirects, `204` or error responses, whose status is
    /// fixed by the write call.
    ///
    /// # Errors
    ///
    /// See [`ResponseWriter::set_code`].
    pub fn set_code(&mut self, code: StatusCode) -> Result<(), Error> {
        self.flight.set_code(code)
    }

    /// Returns the pending status code.
    pub fn code(&self) -> StatusCode {
        self.flight.code
    }

    /// Returns the request's flight values.
    pub fn flight_values(&self) -> &FlightValues {
        &self.flight.flight_values
    }

    /// Returns the request's flight values for writing.
    pub fn flight_values_mut(&mut self) -> &mut FlightValues {
        &mut self.flight.flight_values
    }

    /// Returns the cookie defaults configured for this mux.
    pub fn cookie_defaults(&self) -> CookieDefaults {
        self.flight.cfg.cookie_defaults
    }
}

impl std::fmt::Debug for ResponseHeadersWriter<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ResponseHeadersWriter")
            .field(&self.flight)
            .finish()
    }
}

/// Serves `req` with `cfg`, delivering at most one response to `sink`.
///
/// # Panics
///
/// Resumes any panic raised by a hook or the handler after clearing the
/// response headers.
pub(crate) fn process_request(
    cfg: &HandlerConfig,
    req: &IncomingRequest,
    sink: &mut dyn ResponseSink,
) {
    let span = debug_span!("flight", method = %req.method(), path = req.path());
    let _enter = span.enter();

    let mut flight = ResponseWriter::new(sink, req, cfg);
    if let Err(payload) = flight.run_contained() {
        drop(flight);
        panic::resume_unwind(payload);
    }
}

fn check_range(
    code: StatusCode,
    range: std::ops::Range<u16>,
    expected: &'static str,
) -> Result<(), Error> {
    if range.contains(&code.as_u16()) {
        Ok(())
    } else {
        Err(Error::InvalidStatus {
            code: code.as_u16(),
            expected,
        })
    }
}

fn resolve_location(request_path: &str, target: &str) -> String {
    if target.starts_with('/') || url::Url::parse(target).is_ok() {
        return target.to_owned();
    }
    let base = format!("http://localhost{request_path}");
    match url::Url::parse(&base).and_then(|b| b.join(target)) {
        Ok(resolved) => {
            let mut out = resolved.path().to_owned();
            if let Some(query) = resolved.query() {
                out.push('?');
                out.push_str(query);
            }
            if let Some(fragment) = resolved.fragment() {
                out.push('#');
                out.push_str(fragment);
            }
            out
        }
        Err(_) => target.to_owned(),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::dispatcher::DefaultDispatcher;
    use crate::handler::handler_fn;
    use crate::interceptor::{Interceptor, InterceptorConfig};
    use crate::response::SafeHtml;
    use crate::testing::ResponseRecorder;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recording {
        name: &'static str,
        log: Log,
        write_in_before: bool,
    }

    impl Recording {
        fn push(&self, event: &str) {
            self.log.lock().unwrap().push(format!("{}:{}", self.name, event));
        }
    }

    impl Interceptor for Recording {
        fn before(
            &self,
            w: &mut ResponseWriter<'_>,
            _req: &IncomingRequest,
            _cfg: Option<&dyn InterceptorConfig>,
        ) -> Result<Outcome, Error> {
            self.push("before");
            if self.write_in_before {
                return Ok(w.write_error(StatusCode::FORBIDDEN)?.into());
            }
            Outcome::not_written()
        }

        fn commit(
            &self,
            _w: &mut ResponseHeadersWriter<'_, '_>,
            _req: &IncomingRequest,
            _resp: &mut Response,
            _cfg: Option<&dyn InterceptorConfig>,
        ) -> Result<(), Error> {
            self.push("commit");
            Ok(())
        }

        fn on_error(
            &self,
            _w: &mut ResponseHeadersWriter<'_, '_>,
            _req: &IncomingRequest,
            _resp: &ErrorResponse,
            _cfg: Option<&dyn InterceptorConfig>,
        ) -> Result<(), Error> {
            self.push("on_error");
            Ok(())
        }
    }

    fn config(handler: Arc<dyn Handler>, interceptors: Vec<Arc<dyn Interceptor>>) -> HandlerConfig {
        HandlerConfig {
            handler,
            interceptors: interceptors
                .iter()
                .map(|it| ConfiguredInterceptor::resolve(it, &[]))
                .collect(),
            dispatcher: Arc::new(DefaultDispatcher),
            cookie_defaults: CookieDefaults::default(),
        }
    }

    fn recording(name: &'static str, log: &Log, write_in_before: bool) -> Arc<dyn Interceptor> {
        Arc::new(Recording {
            name,
            log: Arc::clone(log),
            write_in_before,
        })
    }

    fn get(path: &str) -> IncomingRequest {
        IncomingRequest::new(http::Request::get(path).body(Vec::new()).unwrap())
    }

    #[test]
    fn before_writing_skips_rest_and_handler() {
        let log: Log = Arc::default();
        let handler_log = Arc::clone(&log);
        let handler = Arc::new(handler_fn(move |w, _| {
            handler_log.lock().unwrap().push("handler".into());
            Ok(w.write(SafeHtml::escape("x"))?.into())
        }));
        let cfg = config(
            handler,
            vec![
                recording("a", &log, false),
                recording("b", &log, true),
                recording("c", &log, false),
            ],
        );

        let mut rec = ResponseRecorder::new();
        process_request(&cfg, &get("/"), &mut rec);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:before", "b:before", "b:on_error", "a:on_error"]
        );
        assert_eq!(rec.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(rec.header("x-content-type-options").as_deref(), Some("nosniff"));
        assert_eq!(rec.body_string().as_deref(), Some("Forbidden"));
    }

    #[test]
    fn handler_without_write_gets_204_after_commit() {
        let log: Log = Arc::default();
        let cfg = config(
            Arc::new(handler_fn(|_, _| Outcome::not_written())),
            vec![recording("a", &log, false)],
        );

        let mut rec = ResponseRecorder::new();
        process_request(&cfg, &get("/"), &mut rec);

        assert_eq!(*log.lock().unwrap(), vec!["a:before", "a:commit"]);
        assert_eq!(rec.responses().len(), 1);
        assert_eq!(rec.status(), Some(StatusCode::NO_CONTENT));
    }

    #[test]
    fn handler_error_becomes_bare_500() {
        let cfg = config(
            Arc::new(handler_fn(|w, _| {
                w.header_mut().set("X-Leak", "secret")?;
                Err(Error::aborted("backend down"))
            })),
            Vec::new(),
        );

        let mut rec = ResponseRecorder::new();
        process_request(&cfg, &get("/"), &mut rec);

        assert_eq!(rec.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(rec.header("X-Leak"), None);
        assert_eq!(rec.header("content-type").as_deref(), Some(PLAIN_TEXT));
    }

    #[test]
    fn swallowed_dispatch_error_still_aborts() {
        let cfg = config(
            Arc::new(handler_fn(|w, _| {
                let result = w.write(Response::External(Box::new(1u8)));
                assert!(matches!(result, Err(Error::Dispatch(_))));
                Outcome::not_written()
            })),
            Vec::new(),
        );

        let mut rec = ResponseRecorder::new();
        process_request(&cfg, &get("/"), &mut rec);

        assert_eq!(rec.responses().len(), 1);
        assert_eq!(rec.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn panic_clears_headers_and_returns_payload() {
        let cfg = config(
            Arc::new(handler_fn(|w, _| {
                w.header_mut().set("X-Partial", "1")?;
                panic!("boom");
            })),
            Vec::new(),
        );
        let req = get("/");
        let mut rec = ResponseRecorder::new();

        let mut flight = ResponseWriter::new(&mut rec, &req, &cfg);
        let payload = flight.run_contained().unwrap_err();
        assert_eq!(panic_message(&*payload), "boom");
        assert!(flight.header().is_empty());
        drop(flight);
        assert!(rec.responses().is_empty());
    }

    #[test]
    #[should_panic(expected = "already written")]
    fn second_write_panics() {
        let cfg = config(
            Arc::new(handler_fn(|w, _| {
                let _ = w.write(SafeHtml::escape("one"))?;
                Ok(w.write(SafeHtml::escape("two"))?.into())
            })),
            Vec::new(),
        );
        let mut rec = ResponseRecorder::new();
        process_request(&cfg, &get("/"), &mut rec);
    }

    #[test]
    fn status_ranges_are_enforced() {
        let cfg = config(
            Arc::new(handler_fn(|w, req| {
                assert!(matches!(
                    w.set_code(StatusCode::from_u16(600).unwrap()),
                    Err(Error::InvalidStatus { code: 600, .. })
                ));
                assert!(w.write_error(StatusCode::OK).is_err());
                assert!(w.redirect(req, "/x", StatusCode::OK).is_err());
                assert!(!w.is_written());
                w.set_code(StatusCode::CREATED)?;
                Ok(w.write(SafeHtml::escape("made"))?.into())
            })),
            Vec::new(),
        );
        let mut rec = ResponseRecorder::new();
        process_request(&cfg, &get("/"), &mut rec);
        assert_eq!(rec.status(), Some(StatusCode::CREATED));
    }

    #[test]
    fn relative_redirects_resolve_against_request_path() {
        assert_eq!(resolve_location("/a/b/c", "d"), "/a/b/d");
        assert_eq!(resolve_location("/a/b/", "../x?y=1"), "/a/x?y=1");
        assert_eq!(resolve_location("/a", "/abs"), "/abs");
        assert_eq!(
            resolve_location("/a", "https://example.com/"),
            "https://example.com/"
        );
    }

    #[test]
    fn redirect_sets_location() {
        let cfg = config(
            Arc::new(handler_fn(|w, req| {
                Ok(w.redirect(req, "login", StatusCode::SEE_OTHER)?.into())
            })),
            Vec::new(),
        );
        let mut rec = ResponseRecorder::new();
        process_request(&cfg, &get("/account/settings"), &mut rec);
        assert_eq!(rec.status(), Some(StatusCode::SEE_OTHER));
        assert_eq!(rec.header("Location").as_deref(), Some("/account/login"));
    }

    #[test]
    fn cookies_reach_the_sink() {
        let cfg = config(
            Arc::new(handler_fn(|w, _| {
                let cookie = Cookie::new("sid", "abc", &w.cookie_defaults())?;
                w.set_cookie(&cookie)?;
                Ok(w.no_content()?.into())
            })),
            Vec::new(),
        );
        let mut rec = ResponseRecorder::new();
        process_request(&cfg, &get("/"), &mut rec);
        assert_eq!(
            rec.header("set-cookie").as_deref(),
            Some("sid=abc; Path=/; Secure; HttpOnly; SameSite=Lax")
        );
    }
}
