//! Routing from `(host, path, method)` to a handler and its interceptors.
//!
//! Routes are registered on a [`ServeMuxConfig`] together with the global
//! interceptor chain; [`ServeMuxConfig::mux`] resolves every interceptor's
//! per-handler override once and produces an immutable [`ServeMux`].
//!
//! Patterns are `[host]/path`. A path ending in `/` matches its whole
//! subtree; any other path matches exactly. Host-specific patterns win over
//! host-less ones, then the longest path wins.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use http::{Method, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::capability::Outcome;
use crate::config::Config;
use crate::cookie::CookieDefaults;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::flight::{process_request, HandlerConfig, ResponseSink, ResponseWriter};
use crate::handler::Handler;
use crate::interceptor::{ConfiguredInterceptor, Interceptor, InterceptorConfig};
use crate::request::IncomingRequest;

/// Error returned when a mux cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// The same pattern and method were registered twice.
    #[error("duplicate route {method} {pattern}")]
    DuplicateRoute {
        /// The normalized pattern
        pattern: String,
        /// The repeated method
        method: Method,
    },
    /// The pattern has no path or an empty host.
    #[error("invalid pattern {0:?}: expected [host]/path")]
    InvalidPattern(String),
}

struct RouteSpec {
    pattern: String,
    method: Method,
    handler: Arc<dyn Handler>,
    overrides: Vec<Arc<dyn InterceptorConfig>>,
}

/// Builder for a [`ServeMux`].
///
/// # Examples
///
/// ```
/// use http::Method;
/// use safeflight::plugins::framing::{AllowFraming, Framing};
/// use safeflight::{handler_fn, DefaultDispatcher, SafeHtml, ServeMuxConfig};
///
/// let mut config = ServeMuxConfig::new(DefaultDispatcher);
/// config.intercept(Framing::new());
/// config.handle("/", Method::GET, handler_fn(|w, _| {
///     Ok(w.write(SafeHtml::from_static("<p>home</p>"))?.into())
/// }));
/// config
///     .handle("/embed", Method::GET, handler_fn(|w, _| Ok(w.no_content()?.into())))
///     .config(AllowFraming);
///
/// let mux = config.mux().unwrap();
/// # let _ = mux;
/// ```
pub struct ServeMuxConfig {
    dispatcher: Arc<dyn Dispatcher>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    routes: Vec<RouteSpec>,
    cookie_defaults: CookieDefaults,
}

impl ServeMuxConfig {
    /// Creates an empty configuration using `dispatcher` for every route.
    pub fn new(dispatcher: impl Dispatcher + 'static) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            interceptors: Vec::new(),
            routes: Vec::new(),
            cookie_defaults: CookieDefaults::default(),
        }
    }

    /// Creates an empty configuration that takes its defaults from `config`.
    pub fn from_config(config: &Config, dispatcher: impl Dispatcher + 'static) -> Self {
        let mut mux = Self::new(dispatcher);
        mux.cookie_defaults = config.cookie_defaults();
        mux
    }

    /// Overrides the cookie defaults handed to every flight.
    pub fn set_cookie_defaults(&mut self, defaults: CookieDefaults) -> &mut Self {
        self.cookie_defaults = defaults;
        self
    }

    /// Appends an interceptor to the global chain.
    ///
    /// The chain applies to every route, including the built-in 404 and 405
    /// responses, in registration order.
    pub fn intercept(&mut self, interceptor: impl Interceptor + 'static) -> &mut Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Registers `handler` for `pattern` and `method`.
    ///
    /// Per-handler interceptor overrides are attached through the returned
    /// [`RouteBuilder`]. Patterns are validated when the mux is built.
    pub fn handle(
        &mut self,
        pattern: &str,
        method: Method,
        handler: impl Handler + 'static,
    ) -> RouteBuilder<'_> {
        self.routes.push(RouteSpec {
            pattern: pattern.to_owned(),
            method,
            handler: Arc::new(handler),
            overrides: Vec::new(),
        });
        let last = self.routes.len() - 1;
        RouteBuilder {
            route: &mut self.routes[last],
        }
    }

    /// Builds the mux.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidPattern`] for malformed patterns and
    /// [`BuildError::DuplicateRoute`] if a pattern and method pair was
    /// registered twice.
    pub fn mux(&self) -> Result<ServeMux, BuildError> {
        let mut seen: HashSet<(String, Method)> = HashSet::new();
        let mut routes: Vec<Route> = Vec::new();

        for spec in &self.routes {
            let pattern = Pattern::parse(&spec.pattern)?;
            let key = pattern.to_string();
            if !seen.insert((key.clone(), spec.method.clone())) {
                return Err(BuildError::DuplicateRoute {
                    pattern: key,
                    method: spec.method.clone(),
                });
            }

            debug!(pattern = %key, method = %spec.method, "registering route");
            let cfg = self.handler_config(Arc::clone(&spec.handler), &spec.overrides);
            match routes.iter_mut().find(|r| r.pattern == pattern) {
                Some(route) => route.methods.push((spec.method.clone(), cfg)),
                None => routes.push(Route {
                    pattern,
                    methods: vec![(spec.method.clone(), cfg)],
                    method_not_allowed: None,
                }),
            }
        }

        for route in &mut routes {
            let allow = route
                .methods
                .iter()
                .map(|(m, _)| m.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            route.method_not_allowed = Some(self.handler_config(
                Arc::new(StatusHandler {
                    code: StatusCode::METHOD_NOT_ALLOWED,
                    allow: Some(allow),
                }),
                &[],
            ));
        }

        routes.sort_by(|a, b| {
            b.pattern
                .host
                .is_some()
                .cmp(&a.pattern.host.is_some())
                .then_with(|| b.pattern.path.len().cmp(&a.pattern.path.len()))
        });

        Ok(ServeMux {
            routes,
            not_found: self.handler_config(
                Arc::new(StatusHandler {
                    code: StatusCode::NOT_FOUND,
                    allow: None,
                }),
                &[],
            ),
        })
    }

    fn handler_config(
        &self,
        handler: Arc<dyn Handler>,
        overrides: &[Arc<dyn InterceptorConfig>],
    ) -> HandlerConfig {
        HandlerConfig {
            handler,
            interceptors: self
                .interceptors
                .iter()
                .map(|it| ConfiguredInterceptor::resolve(it, overrides))
                .collect(),
            dispatcher: Arc::clone(&self.dispatcher),
            cookie_defaults: self.cookie_defaults,
        }
    }
}

impl fmt::Debug for ServeMuxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServeMuxConfig")
            .field(
                "interceptors",
                &self.interceptors.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .field(
                "routes",
                &self
                    .routes
                    .iter()
                    .map(|r| format!("{} {}", r.method, r.pattern))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Attaches interceptor overrides to the route just registered.
pub struct RouteBuilder<'a> {
    route: &'a mut RouteSpec,
}

impl RouteBuilder<'_> {
    /// Adds an override. Each interceptor receives the first override its
    /// [`Interceptor::matches`] accepts.
    pub fn config(self, cfg: impl InterceptorConfig + 'static) -> Self {
        self.route.overrides.push(Arc::new(cfg));
        self
    }
}

impl fmt::Debug for RouteBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteBuilder")
            .field("pattern", &self.route.pattern)
            .field("method", &self.route.method)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pattern {
    host: Option<String>,
    path: String,
}

impl Pattern {
    fn parse(raw: &str) -> Result<Self, BuildError> {
        let invalid = || BuildError::InvalidPattern(raw.to_owned());
        let slash = raw.find('/').ok_or_else(invalid)?;
        let (host, path) = raw.split_at(slash);
        if host.chars().any(|c| c.is_whitespace()) || path.chars().any(|c| c.is_whitespace()) {
            return Err(invalid());
        }
        Ok(Self {
            host: (!host.is_empty()).then(|| host.to_ascii_lowercase()),
            path: path.to_owned(),
        })
    }

    fn matches(&self, req: &IncomingRequest) -> bool {
        if let Some(host) = &self.host {
            let req_host = if host.contains(':') {
                req.host()
            } else {
                req.hostname()
            };
            if !host.eq_ignore_ascii_case(req_host) {
                return false;
            }
        }
        let path = req.path();
        if self.path.ends_with('/') {
            path.starts_with(&self.path)
        } else {
            path == self.path
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.host.as_deref().unwrap_or(""), self.path)
    }
}

struct Route {
    pattern: Pattern,
    methods: Vec<(Method, HandlerConfig)>,
    method_not_allowed: Option<HandlerConfig>,
}

/// An immutable route table.
///
/// Shared by every worker; each call to [`serve`](Self::serve) runs one
/// independent flight.
pub struct ServeMux {
    routes: Vec<Route>,
    not_found: HandlerConfig,
}

impl ServeMux {
    /// Serves one request, delivering at most one response to `sink`.
    ///
    /// Unmatched paths get `404` and unmatched methods `405`, both through
    /// the global interceptor chain.
    ///
    /// # Panics
    ///
    /// A panic raised by a hook or handler is resumed after the response
    /// headers have been discarded.
    pub fn serve(&self, req: &IncomingRequest, sink: &mut dyn ResponseSink) {
        process_request(self.resolve(req), req, sink);
    }

    fn resolve(&self, req: &IncomingRequest) -> &HandlerConfig {
        let Some(route) = self.routes.iter().find(|r| r.pattern.matches(req)) else {
            return &self.not_found;
        };
        route
            .methods
            .iter()
            .find(|(m, _)| m == req.method())
            .map(|(_, cfg)| cfg)
            .or(route.method_not_allowed.as_ref())
            .unwrap_or(&self.not_found)
    }
}

impl fmt::Debug for ServeMux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServeMux")
            .field(
                "routes",
                &self
                    .routes
                    .iter()
                    .map(|r| r.pattern.to_string())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

struct StatusHandler {
    code: StatusCode,
    allow: Option<String>,
}

impl Handler for StatusHandler {
    fn serve(&self, w: &mut ResponseWriter<'_>, _req: &IncomingRequest) -> Result<Outcome, Error> {
        if let Some(allow) = &self.allow {
            w.header_mut().set("Allow", allow)?;
        }
        Ok(w.write_error(self.code)?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DefaultDispatcher;
    use crate::handler::handler_fn;
    use crate::response::SafeHtml;
    use crate::testing::ResponseRecorder;

    fn named(name: &'static str) -> impl Handler {
        handler_fn(move |w, _| Ok(w.write(SafeHtml::from_static(name))?.into()))
    }

    fn serve(mux: &ServeMux, req: http::Request<Vec<u8>>) -> ResponseRecorder {
        let mut rec = ResponseRecorder::new();
        mux.serve(&IncomingRequest::new(req), &mut rec);
        rec
    }

    fn get(uri: &str) -> http::Request<Vec<u8>> {
        http::Request::get(uri).body(Vec::new()).unwrap()
    }

    #[test]
    fn pattern_parsing() {
        assert_eq!(
            Pattern::parse("Example.COM/a").unwrap(),
            Pattern {
                host: Some("example.com".into()),
                path: "/a".into()
            }
        );
        assert!(Pattern::parse("nopath").is_err());
        assert!(Pattern::parse("").is_err());
        assert!(Pattern::parse("/a b").is_err());
    }

    #[test]
    fn longest_match_and_host_precedence() {
        let mut config = ServeMuxConfig::new(DefaultDispatcher);
        config.handle("/", Method::GET, named("root"));
        config.handle("/static/", Method::GET, named("static"));
        config.handle("/static/app.js", Method::GET, named("app"));
        config.handle("admin.example.com/", Method::GET, named("admin"));
        let mux = config.mux().unwrap();

        let body = |uri: &str| serve(&mux, get(uri)).body_string().unwrap();
        assert_eq!(body("http://example.com/"), "root");
        assert_eq!(body("http://example.com/static/css/x.css"), "static");
        assert_eq!(body("http://example.com/static/app.js"), "app");
        assert_eq!(body("http://example.com/unknown"), "root");
        assert_eq!(body("http://admin.example.com:8080/static/app.js"), "admin");
    }

    #[test]
    fn unmatched_path_is_404() {
        let mut config = ServeMuxConfig::new(DefaultDispatcher);
        config.handle("/exact", Method::GET, named("exact"));
        let mux = config.mux().unwrap();

        let rec = serve(&mux, get("/exact/more"));
        assert_eq!(rec.status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn unmatched_method_is_405_with_allow() {
        let mut config = ServeMuxConfig::new(DefaultDispatcher);
        config.handle("/form", Method::GET, named("get"));
        config.handle("/form", Method::POST, named("post"));
        let mux = config.mux().unwrap();

        let rec = serve(&mux, http::Request::delete("/form").body(Vec::new()).unwrap());
        assert_eq!(rec.status(), Some(StatusCode::METHOD_NOT_ALLOWED));
        assert_eq!(rec.header("allow").as_deref(), Some("GET, POST"));

        let rec = serve(&mux, http::Request::post("/form").body(Vec::new()).unwrap());
        assert_eq!(rec.body_string().as_deref(), Some("post"));
    }

    #[test]
    fn duplicate_route_is_rejected() {
        let mut config = ServeMuxConfig::new(DefaultDispatcher);
        config.handle("/a", Method::GET, named("1"));
        config.handle("/a", Method::GET, named("2"));
        assert_eq!(
            config.mux().unwrap_err(),
            BuildError::DuplicateRoute {
                pattern: "/a".into(),
                method: Method::GET
            }
        );
    }

    #[test]
    fn invalid_pattern_is_rejected_at_build() {
        let mut config = ServeMuxConfig::new(DefaultDispatcher);
        config.handle("relative", Method::GET, named("x"));
        assert!(matches!(config.mux(), Err(BuildError::InvalidPattern(p)) if p == "relative"));
    }

    #[test]
    fn from_config_threads_cookie_defaults() {
        let config = Config::from_toml_str("local_dev = true").unwrap();
        let mut mux_config = ServeMuxConfig::from_config(&config, DefaultDispatcher);
        mux_config.handle(
            "/",
            Method::GET,
            handler_fn(|w, _| {
                assert!(!w.cookie_defaults().is_secure());
                Ok(w.no_content()?.into())
            }),
        );
        let rec = serve(&mux_config.mux().unwrap(), get("/"));
        assert_eq!(rec.status(), Some(StatusCode::NO_CONTENT));
    }
}
