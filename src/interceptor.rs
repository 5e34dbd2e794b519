//! The interceptor protocol.
//!
//! An interceptor is a policy component hooked into every request of the
//! handlers it is registered for. For one request, each interceptor moves
//! through
//!
//! ```text
//! not-run --before--> before-ran --commit---> done
//!                               \--on_error-/
//! ```
//!
//! Before hooks run in registration order. Once a response is produced, by
//! a Before hook or by the handler, exactly one of Commit or OnError runs for
//! every interceptor whose Before ran, in reverse registration order.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::capability::Outcome;
use crate::error::Error;
use crate::flight::{ResponseHeadersWriter, ResponseWriter};
use crate::request::IncomingRequest;
use crate::response::{ErrorResponse, Response};

/// Upcast helper implemented for every `'static` type.
pub trait AsAny {
    /// Returns `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A per-handler configuration override for an interceptor.
///
/// Overrides are passed to [`ServeMuxConfig::handle`](crate::ServeMuxConfig::handle).
/// When the mux is built, each interceptor receives the first override its
/// [`Interceptor::matches`] accepts; overrides no interceptor accepts are
/// ignored.
pub trait InterceptorConfig: AsAny + fmt::Debug + Send + Sync + 'static {}

impl dyn InterceptorConfig {
    /// Returns the override as `T` if it is one.
    pub fn downcast_ref<T: InterceptorConfig>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Returns true if the override is a `T`.
    pub fn is<T: InterceptorConfig>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// A policy component in the request pipeline.
///
/// Instances are shared by every concurrent request. Per-request state
/// belongs in [`FlightValues`](crate::FlightValues), never in `self`.
pub trait Interceptor: Send + Sync {
    /// Runs before the handler, in registration order.
    ///
    /// Writing a response here ends the chain: later Before hooks and the
    /// handler are skipped.
    ///
    /// # Errors
    ///
    /// An error aborts the request into a contained 500 with all headers
    /// discarded.
    fn before(
        &self,
        w: &mut ResponseWriter<'_>,
        req: &IncomingRequest,
        cfg: Option<&dyn InterceptorConfig>,
    ) -> Result<Outcome, Error>;

    /// Runs once a response has been produced, in reverse registration order.
    ///
    /// The writer passed here can change headers, cookies and the status but
    /// cannot write a body.
    ///
    /// # Errors
    ///
    /// An error is fatal for the request: the response is replaced by a
    /// contained 500 with all headers discarded.
    fn commit(
        &self,
        _w: &mut ResponseHeadersWriter<'_, '_>,
        _req: &IncomingRequest,
        _resp: &mut Response,
        _cfg: Option<&dyn InterceptorConfig>,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Runs instead of [`commit`](Self::commit) when an error status is
    /// written.
    ///
    /// # Errors
    ///
    /// Best-effort: an error is logged and the remaining hooks still run.
    fn on_error(
        &self,
        _w: &mut ResponseHeadersWriter<'_, '_>,
        _req: &IncomingRequest,
        _resp: &ErrorResponse,
        _cfg: Option<&dyn InterceptorConfig>,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Returns true if `cfg` is an override for this interceptor.
    ///
    /// Must be pure; it is only called while the mux is being built.
    fn matches(&self, _cfg: &dyn InterceptorConfig) -> bool {
        false
    }

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// An interceptor together with the override resolved for one handler.
#[derive(Clone)]
pub(crate) struct ConfiguredInterceptor {
    interceptor: Arc<dyn Interceptor>,
    config: Option<Arc<dyn InterceptorConfig>>,
}

impl ConfiguredInterceptor {
    /// Picks the first override `interceptor` accepts.
    pub(crate) fn resolve(
        interceptor: &Arc<dyn Interceptor>,
        overrides: &[Arc<dyn InterceptorConfig>],
    ) -> Self {
        let config = overrides
            .iter()
            .find(|cfg| interceptor.matches(&***cfg))
            .cloned();
        Self {
            interceptor: Arc::clone(interceptor),
            config,
        }
    }

    pub(crate) fn interceptor(&self) -> &dyn Interceptor {
        &*self.interceptor
    }

    pub(crate) fn config(&self) -> Option<&dyn InterceptorConfig> {
        self.config.as_deref()
    }

    pub(crate) fn name(&self) -> &'static str {
        self.interceptor.name()
    }
}

impl fmt::Debug for ConfiguredInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfiguredInterceptor")
            .field("interceptor", &self.name())
            .field("config", &self.config)
            .finish()
    }
}
