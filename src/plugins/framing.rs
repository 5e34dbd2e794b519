//! Clickjacking protection through `X-Frame-Options`.
//!
//! Responses are `DENY` by default. A handler can relax that to
//! `SAMEORIGIN` with [`allow_same_origin`], which goes through the setter the
//! interceptor claimed; nothing else can change the header.

use crate::capability::Outcome;
use crate::error::Error;
use crate::flight::ResponseWriter;
use crate::flight_values::FlightKey;
use crate::header::HeaderSetter;
use crate::interceptor::{Interceptor, InterceptorConfig};
use crate::request::IncomingRequest;

const HEADER: &str = "X-Frame-Options";

struct SetterKey;
impl FlightKey for SetterKey {
    type Value = HeaderSetter;
}

/// Turns framing protection off for one handler.
#[derive(Debug, Clone, Copy)]
pub struct AllowFraming;
impl InterceptorConfig for AllowFraming {}

/// Claims `X-Frame-Options` and sets it to `DENY`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Framing {
    _private: (),
}

impl Framing {
    /// Creates the interceptor.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Interceptor for Framing {
    fn before(
        &self,
        w: &mut ResponseWriter<'_>,
        _req: &IncomingRequest,
        cfg: Option<&dyn InterceptorConfig>,
    ) -> Result<Outcome, Error> {
        if cfg.is_some_and(|c| c.is::<AllowFraming>()) {
            return Outcome::not_written();
        }
        let setter = w.header_mut().claim(HEADER)?;
        setter.set(&["DENY"])?;
        w.flight_values_mut().put::<SetterKey>(setter);
        Outcome::not_written()
    }

    fn matches(&self, cfg: &dyn InterceptorConfig) -> bool {
        cfg.is::<AllowFraming>()
    }

    fn name(&self) -> &'static str {
        "framing"
    }
}

/// Allows the current response to be framed by same-origin pages.
///
/// Does nothing when framing protection is off for this handler.
///
/// # Errors
///
/// Cannot fail with the values used here; header errors are propagated.
pub fn allow_same_origin(w: &ResponseWriter<'_>) -> Result<(), Error> {
    if let Some(setter) = w.flight_values().get::<SetterKey>() {
        setter.set(&["SAMEORIGIN"])?;
    }
    Ok(())
}
