//! The capability that validates and serializes responses.

use std::collections::BTreeMap;
use std::io;

use thiserror::Error;

use crate::response::{Response, TemplateResponse};

/// Prefix written before every JSON body to defeat cross-site script
/// inclusion. Clients must strip it before parsing.
pub const JSON_XSSI_PREFIX: &str = ")]}',\n";

/// Content type for HTML bodies.
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Content type for JSON bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Error returned by a [`Dispatcher`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The response is not a kind this dispatcher will write.
    #[error("{kind} responses cannot be dispatched")]
    Unsupported {
        /// Name of the rejected variant
        kind: &'static str,
    },
    /// Template data did not serialize to a map.
    #[error("template data must serialize to a map")]
    InvalidTemplateData,
    /// JSON serialization failed.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// Template lookup or rendering failed.
    #[error("template: {0}")]
    Template(#[from] minijinja::Error),
    /// Writing the body failed.
    #[error("write: {0}")]
    Io(#[from] io::Error),
}

/// Decides whether a response is safe to send and serializes it.
///
/// The engine calls [`content_type`](Self::content_type) and then
/// [`write`](Self::write) exactly once per successfully completed request,
/// after every Commit hook has run. If either call fails nothing from the
/// response reaches the client.
///
/// Implementations are shared by all concurrent requests.
pub trait Dispatcher: Send + Sync {
    /// Returns the `Content-Type` for `resp`.
    ///
    /// # Errors
    ///
    /// Returns an error if `resp` must not be written.
    fn content_type(&self, resp: &Response) -> Result<String, DispatchError>;

    /// Writes the safe serialization of `resp` to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if `resp` must not be written or serialization fails.
    fn write(&self, out: &mut dyn io::Write, resp: &Response) -> Result<(), DispatchError>;
}

/// Dispatcher for the built-in safe response kinds.
///
/// | Response             | Content-Type                      | Body                         |
/// |----------------------|-----------------------------------|------------------------------|
/// | `Html`               | `text/html; charset=utf-8`        | the escaped HTML             |
/// | `Json`               | `application/json; charset=utf-8` | XSSI prefix + JSON           |
/// | `Template`           | `text/html; charset=utf-8`        | HTML-escaped minijinja output |
///
/// Everything else is rejected.
///
/// # Examples
///
/// ```
/// use safeflight::{DefaultDispatcher, Dispatcher, Response, SafeHtml};
///
/// let resp = Response::from(SafeHtml::escape("<b>"));
/// let mut body = Vec::new();
/// DefaultDispatcher.write(&mut body, &resp).unwrap();
/// assert_eq!(body, b"&lt;b&gt;");
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDispatcher;

impl Dispatcher for DefaultDispatcher {
    fn content_type(&self, resp: &Response) -> Result<String, DispatchError> {
        match resp {
            Response::Html(_) => Ok(HTML_CONTENT_TYPE.to_string()),
            Response::Json(_) => Ok(JSON_CONTENT_TYPE.to_string()),
            Response::Template(_) => Ok(HTML_CONTENT_TYPE.to_string()),
            Response::NoContent
            | Response::Error(_)
            | Response::Redirect(_)
            | Response::External(_) => Err(DispatchError::Unsupported { kind: resp.kind() }),
        }
    }

    fn write(&self, out: &mut dyn io::Write, resp: &Response) -> Result<(), DispatchError> {
        match resp {
            Response::Html(html) => out.write_all(html.as_str().as_bytes())?,
            Response::Json(json) => {
                out.write_all(JSON_XSSI_PREFIX.as_bytes())?;
                serde_json::to_writer(&mut *out, json.data())?;
            }
            Response::Template(t) => {
                let rendered = render_template(t)?;
                out.write_all(rendered.as_bytes())?;
            }
            Response::NoContent
            | Response::Error(_)
            | Response::Redirect(_)
            | Response::External(_) => {
                return Err(DispatchError::Unsupported { kind: resp.kind() })
            }
        }
        Ok(())
    }
}

// Templates forces HTML escaping, so the output is safe whatever the name.
fn render_template(t: &TemplateResponse) -> Result<String, DispatchError> {
    let template = t.templates().env().get_template(t.name())?;

    let mut ctx: BTreeMap<String, minijinja::Value> = BTreeMap::new();
    if let serde_json::Value::Object(map) = t.data() {
        for (key, value) in map {
            ctx.insert(key.clone(), minijinja::Value::from_serialize(value));
        }
    }
    for (name, func) in t.funcs() {
        ctx.insert(name.clone(), func.clone());
    }

    Ok(template.render(ctx)?)
}
