//! HTTP Strict Transport Security.

use http::{Method, StatusCode};

use crate::capability::Outcome;
use crate::config::HstsSettings;
use crate::error::Error;
use crate::flight::ResponseWriter;
use crate::interceptor::{Interceptor, InterceptorConfig};
use crate::request::IncomingRequest;

const HEADER: &str = "Strict-Transport-Security";

/// Redirects plain-HTTP requests to HTTPS and sets
/// `Strict-Transport-Security` on secure ones.
///
/// `GET` and `HEAD` are redirected with `301`; other methods with `308` so
/// the body is replayed. When TLS is terminated by a proxy
/// (`behind_proxy`), requests are never redirected and the header is always
/// sent.
///
/// # Examples
///
/// ```
/// use safeflight::plugins::Hsts;
///
/// assert_eq!(Hsts::default().header_value(), "max-age=63072000; includeSubDomains");
/// ```
#[derive(Debug, Clone)]
pub struct Hsts {
    settings: HstsSettings,
}

impl Hsts {
    /// Creates the interceptor from settings.
    pub fn new(settings: HstsSettings) -> Self {
        Self { settings }
    }

    /// Returns the header value this interceptor sends.
    pub fn header_value(&self) -> String {
        let mut value = format!("max-age={}", self.settings.max_age_secs);
        if self.settings.include_subdomains {
            value.push_str("; includeSubDomains");
        }
        if self.settings.preload {
            value.push_str("; preload");
        }
        value
    }
}

impl Default for Hsts {
    fn default() -> Self {
        Self::new(HstsSettings::default())
    }
}

impl Interceptor for Hsts {
    fn before(
        &self,
        w: &mut ResponseWriter<'_>,
        req: &IncomingRequest,
        _cfg: Option<&dyn InterceptorConfig>,
    ) -> Result<Outcome, Error> {
        if !self.settings.behind_proxy && !req.is_tls() {
            let host = req.host();
            if host.is_empty() {
                return Err(Error::aborted("cannot redirect to HTTPS without a host"));
            }
            let path = req
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            let code = if req.method() == Method::GET || req.method() == Method::HEAD {
                StatusCode::MOVED_PERMANENTLY
            } else {
                StatusCode::PERMANENT_REDIRECT
            };
            let target = format!("https://{host}{path}");
            return Ok(w.redirect(req, &target, code)?.into());
        }

        let setter = w.header_mut().claim(HEADER)?;
        setter.set(&[self.header_value().as_str()])?;
        Outcome::not_written()
    }

    fn name(&self) -> &'static str {
        "hsts"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_value_reflects_settings() {
        let hsts = Hsts::new(HstsSettings {
            max_age_secs: 31536000,
            include_subdomains: true,
            preload: true,
            behind_proxy: false,
        });
        assert_eq!(
            hsts.header_value(),
            "max-age=31536000; includeSubDomains; preload"
        );

        let bare = Hsts::new(HstsSettings {
            include_subdomains: false,
            ..HstsSettings::default()
        });
        assert_eq!(bare.header_value(), "max-age=63072000");
    }
}
