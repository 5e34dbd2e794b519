//! Response envelopes a [`Dispatcher`](crate::Dispatcher) may be asked to render.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use http::StatusCode;
use serde::Serialize;

use crate::dispatcher::DispatchError;
use crate::templates::Templates;

/// HTML that is safe to send to a browser as-is.
///
/// A `SafeHtml` can only be produced by escaping text, from a string literal
/// compiled into the program, or by joining other `SafeHtml` values. There is
/// no way to wrap an arbitrary runtime `String`.
///
/// # Examples
///
/// ```
/// use safeflight::SafeHtml;
///
/// let html = SafeHtml::escape("<h1>Hi</h1>");
/// assert_eq!(html.as_str(), "&lt;h1&gt;Hi&lt;/h1&gt;");
///
/// let page = SafeHtml::concat([SafeHtml::from_static("<p>"), html, SafeHtml::from_static("</p>")]);
/// assert_eq!(page.as_str(), "<p>&lt;h1&gt;Hi&lt;/h1&gt;</p>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeHtml {
    inner: String,
}

impl SafeHtml {
    /// Escapes `text` so it renders as literal text in an HTML body or a
    /// quoted attribute.
    pub fn escape(text: &str) -> Self {
        Self {
            inner: escape_html(text),
        }
    }

    /// Trusts a literal that is part of the program source.
    pub fn from_static(html: &'static str) -> Self {
        Self {
            inner: html.to_owned(),
        }
    }

    /// Joins several safe fragments.
    pub fn concat(parts: impl IntoIterator<Item = SafeHtml>) -> Self {
        Self {
            inner: parts.into_iter().map(|p| p.inner).collect(),
        }
    }

    /// Returns the HTML source.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Consumes the value and returns the HTML source.
    pub fn into_string(self) -> String {
        self.inner
    }
}

impl fmt::Display for SafeHtml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// A JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse {
    data: serde_json::Value,
}

impl JsonResponse {
    /// Serializes `data` into a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Json`] if `data` cannot be represented as JSON.
    pub fn new<T: Serialize + ?Sized>(data: &T) -> Result<Self, DispatchError> {
        Ok(Self {
            data: serde_json::to_value(data)?,
        })
    }

    /// Returns the payload.
    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }
}

/// A template from a [`Templates`] set, the data to render it with, and extra
/// functions made available to the template.
///
/// Interceptors may add functions during their Commit phase, e.g. a CSP
/// nonce accessor.
#[derive(Clone)]
pub struct TemplateResponse {
    templates: Templates,
    name: String,
    data: serde_json::Value,
    funcs: BTreeMap<String, minijinja::Value>,
}

impl TemplateResponse {
    /// Creates a template response.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Json`] if `data` cannot be serialized, or
    /// [`DispatchError::InvalidTemplateData`] if it does not serialize to a
    /// map (or unit).
    pub fn new<T: Serialize + ?Sized>(
        templates: &Templates,
        name: impl Into<String>,
        data: &T,
    ) -> Result<Self, DispatchError> {
        let data = serde_json::to_value(data)?;
        if !(data.is_object() || data.is_null()) {
            return Err(DispatchError::InvalidTemplateData);
        }
        Ok(Self {
            templates: templates.clone(),
            name: name.into(),
            data,
            funcs: BTreeMap::new(),
        })
    }

    /// Returns the template set.
    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    /// Returns the template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the data the template is rendered with.
    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    /// Adds or replaces a function available to the template under `name`.
    ///
    /// Functions take precedence over data entries with the same name.
    pub fn set_func(&mut self, name: impl Into<String>, func: minijinja::Value) {
        self.funcs.insert(name.into(), func);
    }

    /// Returns the registered functions.
    pub fn funcs(&self) -> &BTreeMap<String, minijinja::Value> {
        &self.funcs
    }
}

impl fmt::Debug for TemplateResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateResponse")
            .field("name", &self.name)
            .field("data", &self.data)
            .field("funcs", &self.funcs.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// An error status sent through [`ResponseWriter::write_error`](crate::ResponseWriter::write_error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorResponse {
    code: StatusCode,
}

impl ErrorResponse {
    pub(crate) fn new(code: StatusCode) -> Self {
        Self { code }
    }

    /// Returns the status code.
    pub fn code(&self) -> StatusCode {
        self.code
    }
}

/// A redirect sent through [`ResponseWriter::redirect`](crate::ResponseWriter::redirect).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectResponse {
    location: String,
    code: StatusCode,
}

impl RedirectResponse {
    pub(crate) fn new(location: String, code: StatusCode) -> Self {
        Self { location, code }
    }

    /// Returns the resolved target URL.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Returns the redirect status code.
    pub fn code(&self) -> StatusCode {
        self.code
    }
}

/// The value produced for one request.
///
/// Exactly one variant is active per response. Commit hooks receive the
/// response before it reaches the dispatcher.
pub enum Response {
    /// Pre-escaped HTML.
    Html(SafeHtml),
    /// JSON payload.
    Json(JsonResponse),
    /// Template plus data.
    Template(TemplateResponse),
    /// `204 No Content`.
    NoContent,
    /// Error status.
    Error(ErrorResponse),
    /// Redirect.
    Redirect(RedirectResponse),
    /// A value only a custom dispatcher knows how to render. The default
    /// dispatcher rejects it.
    External(Box<dyn Any + Send>),
}

impl Response {
    /// Short name of the active variant, used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Html(_) => "html",
            Response::Json(_) => "json",
            Response::Template(_) => "template",
            Response::NoContent => "no-content",
            Response::Error(_) => "error",
            Response::Redirect(_) => "redirect",
            Response::External(_) => "external",
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Html(v) => f.debug_tuple("Html").field(v).finish(),
            Response::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Response::Template(v) => f.debug_tuple("Template").field(v).finish(),
            Response::NoContent => f.write_str("NoContent"),
            Response::Error(v) => f.debug_tuple("Error").field(v).finish(),
            Response::Redirect(v) => f.debug_tuple("Redirect").field(v).finish(),
            Response::External(_) => f.write_str("External(..)"),
        }
    }
}

impl From<SafeHtml> for Response {
    fn from(html: SafeHtml) -> Self {
        Response::Html(html)
    }
}

impl From<JsonResponse> for Response {
    fn from(json: JsonResponse) -> Self {
        Response::Json(json)
    }
}

impl From<TemplateResponse> for Response {
    fn from(template: TemplateResponse) -> Self {
        Response::Template(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_covers_html_metacharacters() {
        let html = SafeHtml::escape(r#"<a href="x" title='y'>&</a>"#);
        assert_eq!(
            html.as_str(),
            "&lt;a href=&#34;x&#34; title=&#39;y&#39;&gt;&amp;&lt;/a&gt;"
        );
    }

    #[test]
    fn escape_leaves_plain_text_alone() {
        assert_eq!(SafeHtml::escape("héllo wörld").as_str(), "héllo wörld");
    }

    #[test]
    fn template_data_must_be_a_map() {
        let templates = Templates::new();
        let err = TemplateResponse::new(&templates, "page.html", &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTemplateData));

        assert!(TemplateResponse::new(&templates, "page.html", &()).is_ok());
        assert!(
            TemplateResponse::new(&templates, "page.html", &serde_json::json!({"name": "x"}))
                .is_ok()
        );
    }

    #[test]
    fn response_kind_names_variant() {
        assert_eq!(Response::from(SafeHtml::escape("x")).kind(), "html");
        assert_eq!(Response::NoContent.kind(), "no-content");
        assert_eq!(Response::External(Box::new(5u8)).kind(), "external");
        assert_eq!(format!("{:?}", Response::External(Box::new(5u8))), "External(..)");
    }
}
