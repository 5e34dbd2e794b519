//! Strict, nonce-based Content Security Policy.
//!
//! Every request gets a fresh nonce. Templates read it through the
//! `csp_nonce()` function injected during Commit:
//!
//! ```html
//! <script nonce="{{ csp_nonce() }}">...</script>
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

use crate::capability::Outcome;
use crate::config::{CspSettings, ValidationError};
use crate::error::Error;
use crate::flight::{ResponseHeadersWriter, ResponseWriter};
use crate::flight_values::FlightKey;
use crate::interceptor::{Interceptor, InterceptorConfig};
use crate::request::IncomingRequest;
use crate::response::Response;

const ENFORCE_HEADER: &str = "Content-Security-Policy";
const REPORT_ONLY_HEADER: &str = "Content-Security-Policy-Report-Only";
const NONCE_BYTES: usize = 20;

struct NonceKey;
impl FlightKey for NonceKey {
    type Value = String;
}

/// Turns the CSP interceptor off for one handler.
#[derive(Debug, Clone, Copy)]
pub struct DisableCsp;
impl InterceptorConfig for DisableCsp {}

/// Sets a strict nonce-based policy on every response.
#[derive(Debug, Clone, Default)]
pub struct Csp {
    settings: CspSettings,
}

impl Csp {
    /// Creates the interceptor from settings.
    ///
    /// # Errors
    ///
    /// Returns the [`CspSettings::validate`] error if `report_uri` could inject
    /// extra directives.
    pub fn new(settings: CspSettings) -> Result<Self, ValidationError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    /// Builds the policy for `nonce`.
    pub fn policy(&self, nonce: &str) -> String {
        let mut policy = format!(
            "object-src 'none'; script-src 'unsafe-inline' 'nonce-{nonce}' 'strict-dynamic' https: http:; base-uri 'none'; frame-ancestors 'self'"
        );
        if let Some(uri) = &self.settings.report_uri {
            policy.push_str("; report-uri ");
            policy.push_str(uri);
        }
        policy
    }

    fn header_name(&self) -> &'static str {
        if self.settings.report_only {
            REPORT_ONLY_HEADER
        } else {
            ENFORCE_HEADER
        }
    }
}

/// Returns the nonce of the current request, if the CSP interceptor ran.
pub fn nonce<'w>(w: &'w ResponseWriter<'_>) -> Option<&'w str> {
    w.flight_values().get::<NonceKey>().map(String::as_str)
}

fn generate_nonce() -> String {
    let mut buf = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut buf);
    STANDARD.encode(buf)
}

impl Interceptor for Csp {
    fn before(
        &self,
        w: &mut ResponseWriter<'_>,
        _req: &IncomingRequest,
        cfg: Option<&dyn InterceptorConfig>,
    ) -> Result<Outcome, Error> {
        if cfg.is_some_and(|c| c.is::<DisableCsp>()) {
            return Outcome::not_written();
        }
        let nonce = generate_nonce();
        let setter = w.header_mut().claim(self.header_name())?;
        setter.set(&[self.policy(&nonce).as_str()])?;
        w.flight_values_mut().put::<NonceKey>(nonce);
        Outcome::not_written()
    }

    fn commit(
        &self,
        w: &mut ResponseHeadersWriter<'_, '_>,
        _req: &IncomingRequest,
        resp: &mut Response,
        _cfg: Option<&dyn InterceptorConfig>,
    ) -> Result<(), Error> {
        let (Response::Template(template), Some(nonce)) =
            (resp, w.flight_values().get::<NonceKey>())
        else {
            return Ok(());
        };
        let nonce = nonce.clone();
        template.set_func(
            "csp_nonce",
            // Base64 is attribute-safe; plain strings would get `/` escaped.
            minijinja::Value::from_function(move || {
                minijinja::Value::from_safe_string(nonce.clone())
            }),
        );
        Ok(())
    }

    fn matches(&self, cfg: &dyn InterceptorConfig) -> bool {
        cfg.is::<DisableCsp>()
    }

    fn name(&self) -> &'static str {
        "csp"
    }
}
