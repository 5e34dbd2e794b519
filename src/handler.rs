use std::fmt;

use crate::capability::Outcome;
use crate::error::Error;
use crate::flight::ResponseWriter;
use crate::request::IncomingRequest;

/// Application code that produces the response for a route.
///
/// `serve` is called at most once per request, after every Before hook has
/// returned without writing. If it returns without writing, the engine sends
/// `204 No Content`.
pub trait Handler: Send + Sync {
    /// Serves one request.
    ///
    /// # Errors
    ///
    /// Any error aborts the request into a contained 500.
    fn serve(&self, w: &mut ResponseWriter<'_>, req: &IncomingRequest) -> Result<Outcome, Error>;
}

/// A [`Handler`] backed by a closure. Created with [`handler_fn`].
pub struct HandlerFn<F> {
    f: F,
}

/// Wraps a closure as a [`Handler`].
///
/// # Examples
///
/// ```
/// use safeflight::{handler_fn, SafeHtml};
///
/// let hello = handler_fn(|w, _req| Ok(w.write(SafeHtml::escape("<h1>Hi</h1>"))?.into()));
/// # let _ = hello;
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut ResponseWriter<'_>, &IncomingRequest) -> Result<Outcome, Error> + Send + Sync,
{
    HandlerFn { f }
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut ResponseWriter<'_>, &IncomingRequest) -> Result<Outcome, Error> + Send + Sync,
{
    fn serve(&self, w: &mut ResponseWriter<'_>, req: &IncomingRequest) -> Result<Outcome, Error> {
        (self.f)(w, req)
    }
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HandlerFn(..)")
    }
}
