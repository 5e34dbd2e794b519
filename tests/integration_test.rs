//! Scenario tests with the reference security plugins installed.

use http::{Method, StatusCode};
use safeflight::plugins::{csp, framing, AllowFraming, Csp, DisableCsp, Framing, Hsts};
use safeflight::testing::{serve_contained, ResponseRecorder};
use safeflight::{
    handler_fn, Config, Cookie, DefaultDispatcher, Error, HeaderErrorKind, IncomingRequest,
    Interceptor, InterceptorConfig, Outcome, ResponseWriter, SafeHtml, ServeMux, ServeMuxConfig,
    TemplateResponse, Templates,
};

fn request(method: Method, uri: &str) -> IncomingRequest {
    IncomingRequest::new(
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Vec::new())
            .unwrap(),
    )
}

fn serve(mux: &ServeMux, req: &IncomingRequest) -> ResponseRecorder {
    let mut rec = ResponseRecorder::new();
    mux.serve(req, &mut rec);
    rec
}

fn hello_mux() -> ServeMux {
    let mut config = ServeMuxConfig::new(DefaultDispatcher);
    config.intercept(Hsts::default());
    config.handle(
        "/",
        Method::GET,
        handler_fn(|w, _| Ok(w.write(SafeHtml::escape("<h1>Hi</h1>"))?.into())),
    );
    config.handle(
        "/submit",
        Method::POST,
        handler_fn(|w, _| Ok(w.no_content()?.into())),
    );
    config.mux().unwrap()
}

#[test]
fn plain_http_is_redirected_to_https() {
    let mux = hello_mux();

    let rec = serve(&mux, &request(Method::GET, "http://example.com/?q=1"));
    assert_eq!(rec.status(), Some(StatusCode::MOVED_PERMANENTLY));
    assert_eq!(
        rec.header("location").as_deref(),
        Some("https://example.com/?q=1")
    );
    assert_eq!(rec.header("strict-transport-security"), None);
    assert!(rec.body().unwrap().is_empty());

    let rec = serve(&mux, &request(Method::POST, "http://example.com/submit"));
    assert_eq!(rec.status(), Some(StatusCode::PERMANENT_REDIRECT));
}

#[test]
fn https_gets_sts_and_escaped_body() {
    let rec = serve(&hello_mux(), &request(Method::GET, "https://example.com/"));

    assert_eq!(rec.status(), Some(StatusCode::OK));
    assert_eq!(
        rec.header("Strict-Transport-Security").as_deref(),
        Some("max-age=63072000; includeSubDomains")
    );
    assert_eq!(
        rec.header("content-type").as_deref(),
        Some("text/html; charset=utf-8")
    );
    assert_eq!(rec.body_string().as_deref(), Some("&lt;h1&gt;Hi&lt;/h1&gt;"));
}

#[test]
fn behind_proxy_never_redirects() {
    let config = Config::from_toml_str("[hsts]\nbehind_proxy = true").unwrap();
    let mut mux_config = ServeMuxConfig::from_config(&config, DefaultDispatcher);
    mux_config.intercept(Hsts::new(config.hsts.clone()));
    mux_config.handle("/", Method::GET, handler_fn(|w, _| Ok(w.no_content()?.into())));

    let rec = serve(
        &mux_config.mux().unwrap(),
        &request(Method::GET, "http://example.com/"),
    );
    assert_eq!(rec.status(), Some(StatusCode::NO_CONTENT));
    assert!(rec.header("strict-transport-security").is_some());
}

#[test]
fn handler_cannot_override_claimed_sts() {
    let mut config = ServeMuxConfig::new(DefaultDispatcher);
    config.intercept(Hsts::default());
    config.handle(
        "/",
        Method::GET,
        handler_fn(|w, _| {
            let err = w
                .header_mut()
                .set("strict-transport-security", "max-age=0")
                .unwrap_err();
            assert_eq!(err.kind(), HeaderErrorKind::Claimed);
            Ok(w.no_content()?.into())
        }),
    );

    let rec = serve(&config.mux().unwrap(), &request(Method::GET, "https://a.test/"));
    assert_eq!(
        rec.header("strict-transport-security").as_deref(),
        Some("max-age=63072000; includeSubDomains")
    );
}

/// Claims `Vary` in its Before hook.
struct ClaimsVary;

impl Interceptor for ClaimsVary {
    fn before(
        &self,
        w: &mut ResponseWriter<'_>,
        _req: &IncomingRequest,
        _cfg: Option<&dyn InterceptorConfig>,
    ) -> Result<Outcome, Error> {
        let setter = w.header_mut().claim("Vary")?;
        setter.set(&["Accept-Encoding"])?;
        Outcome::not_written()
    }
}

#[test]
fn conflicting_claims_produce_a_clean_500() {
    let mut config = ServeMuxConfig::new(DefaultDispatcher);
    config.intercept(Framing::new());
    config.intercept(ClaimsVary);
    config.intercept(ClaimsVary);
    config.handle(
        "/",
        Method::GET,
        handler_fn(|w, _| Ok(w.write(SafeHtml::escape("unreachable"))?.into())),
    );

    let rec = serve(&config.mux().unwrap(), &request(Method::GET, "https://a.test/"));

    assert_eq!(rec.responses().len(), 1);
    assert_eq!(rec.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(rec.header("vary"), None);
    assert_eq!(rec.header("x-frame-options"), None);
}

#[test]
fn panicking_handler_leaks_no_headers() {
    let mut config = ServeMuxConfig::new(DefaultDispatcher);
    config.intercept(Hsts::default());
    config.intercept(Framing::new());
    config.handle(
        "/",
        Method::GET,
        handler_fn(|w, _| {
            w.header_mut().set("X-Debug", "internal")?;
            panic!("handler bug");
        }),
    );

    let mut rec = ResponseRecorder::new();
    let message = serve_contained(
        &config.mux().unwrap(),
        &request(Method::GET, "https://a.test/"),
        &mut rec,
    );

    assert_eq!(message.as_deref(), Some("handler bug"));
    assert_eq!(rec.responses().len(), 1);
    assert_eq!(rec.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    for name in ["x-debug", "strict-transport-security", "x-frame-options"] {
        assert_eq!(rec.header(name), None, "{name} leaked");
    }
}

/// Sets a header in its Before hook, then panics.
struct PanicsInBefore;

impl Interceptor for PanicsInBefore {
    fn before(
        &self,
        w: &mut ResponseWriter<'_>,
        _req: &IncomingRequest,
        _cfg: Option<&dyn InterceptorConfig>,
    ) -> Result<Outcome, Error> {
        w.header_mut().set("X-Half-Done", "1")?;
        panic!("before hook bug");
    }
}

#[test]
fn panicking_before_hook_leaks_no_headers() {
    let mut config = ServeMuxConfig::new(DefaultDispatcher);
    config.intercept(Hsts::default());
    config.intercept(Framing::new());
    config.intercept(PanicsInBefore);
    config.handle(
        "/",
        Method::GET,
        handler_fn(|w, _| Ok(w.write(SafeHtml::escape("unreachable"))?.into())),
    );

    let mut rec = ResponseRecorder::new();
    let message = serve_contained(
        &config.mux().unwrap(),
        &request(Method::GET, "https://a.test/"),
        &mut rec,
    );

    assert_eq!(message.as_deref(), Some("before hook bug"));
    assert_eq!(rec.responses().len(), 1);
    assert_eq!(rec.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    for name in ["x-half-done", "strict-transport-security", "x-frame-options"] {
        assert_eq!(rec.header(name), None, "{name} leaked");
    }
}

#[test]
fn framing_defaults_to_deny_and_can_be_relaxed() {
    let mut config = ServeMuxConfig::new(DefaultDispatcher);
    config.intercept(Framing::new());
    config.handle("/", Method::GET, handler_fn(|w, _| Ok(w.no_content()?.into())));
    config.handle(
        "/widget",
        Method::GET,
        handler_fn(|w, _| {
            framing::allow_same_origin(w)?;
            Ok(w.no_content()?.into())
        }),
    );
    config
        .handle("/embed", Method::GET, handler_fn(|w, _| Ok(w.no_content()?.into())))
        .config(AllowFraming);
    let mux = config.mux().unwrap();

    let xfo = |path: &str| serve(&mux, &request(Method::GET, path)).header("x-frame-options");
    assert_eq!(xfo("/").as_deref(), Some("DENY"));
    assert_eq!(xfo("/widget").as_deref(), Some("SAMEORIGIN"));
    assert_eq!(xfo("/embed"), None);
}

#[test]
fn csp_nonce_reaches_header_and_template() {
    let mut templates = Templates::new();
    templates
        .add_template("page.html", "<script nonce=\"{{ csp_nonce() }}\">{{ msg }}</script>")
        .unwrap();

    let mut config = ServeMuxConfig::new(DefaultDispatcher);
    config.intercept(Csp::default());
    config.handle(
        "/",
        Method::GET,
        handler_fn(move |w, _| {
            assert!(csp::nonce(w).is_some());
            let page = TemplateResponse::new(
                &templates,
                "page.html",
                &serde_json::json!({"msg": "a<b"}),
            )?;
            Ok(w.write(page)?.into())
        }),
    );

    let rec = serve(&config.mux().unwrap(), &request(Method::GET, "/"));

    let policy = rec.header("content-security-policy").unwrap();
    let nonce = policy
        .split("'nonce-")
        .nth(1)
        .and_then(|rest| rest.split('\'').next())
        .unwrap()
        .to_owned();
    assert_eq!(
        rec.body_string().unwrap(),
        format!("<script nonce=\"{nonce}\">a&lt;b</script>")
    );
}

#[test]
fn csp_can_be_disabled_per_handler() {
    let mut config = ServeMuxConfig::new(DefaultDispatcher);
    config.intercept(Csp::default());
    config
        .handle(
            "/legacy",
            Method::GET,
            handler_fn(|w, _| {
                assert!(csp::nonce(w).is_none());
                Ok(w.no_content()?.into())
            }),
        )
        .config(DisableCsp);

    let rec = serve(&config.mux().unwrap(), &request(Method::GET, "/legacy"));
    assert_eq!(rec.status(), Some(StatusCode::NO_CONTENT));
    assert_eq!(rec.header("content-security-policy"), None);
}

#[test]
fn cookies_use_configured_defaults() {
    let config = Config::from_toml_str("local_dev = true").unwrap();
    let mut mux_config = ServeMuxConfig::from_config(&config, DefaultDispatcher);
    mux_config.handle(
        "/login",
        Method::POST,
        handler_fn(|w, req| {
            let form = req.post_form()?;
            let user = form.required("user")?;
            let cookie = Cookie::new("user", user, &w.cookie_defaults())?;
            w.set_cookie(&cookie)?;
            Ok(w.redirect(req, "/", StatusCode::SEE_OTHER)?.into())
        }),
    );
    let mux = mux_config.mux().unwrap();

    let req = IncomingRequest::new(
        http::Request::post("/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(b"user=alice".to_vec())
            .unwrap(),
    );
    let rec = serve(&mux, &req);
    assert_eq!(rec.status(), Some(StatusCode::SEE_OTHER));
    assert_eq!(
        rec.header("set-cookie").as_deref(),
        Some("user=alice; Path=/; HttpOnly; SameSite=Lax")
    );

    let bad = IncomingRequest::new(
        http::Request::post("/login")
            .header("content-type", "text/plain")
            .body(b"user=alice".to_vec())
            .unwrap(),
    );
    assert_eq!(
        serve(&mux, &bad).status(),
        Some(StatusCode::INTERNAL_SERVER_ERROR)
    );
}
