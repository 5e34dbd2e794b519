//! Template sets whose output is always HTML-escaped.

use std::fmt;
use std::sync::Arc;

use minijinja::{AutoEscape, Environment};

/// A set of templates rendered with HTML auto-escaping forced on for every
/// template, whatever its name.
///
/// The environment is built here and never handed out mutably, so escaping
/// cannot be switched off after construction. Clones share the compiled
/// templates; adding a template to a shared set copies it first.
///
/// # Examples
///
/// ```
/// use safeflight::{DefaultDispatcher, Dispatcher, Response, TemplateResponse, Templates};
///
/// let mut templates = Templates::new();
/// templates.add_template("note.txt", "<p>{{ msg }}</p>").unwrap();
///
/// let resp = TemplateResponse::new(&templates, "note.txt", &serde_json::json!({"msg": "<b>"})).unwrap();
/// let mut body = Vec::new();
/// DefaultDispatcher.write(&mut body, &Response::from(resp)).unwrap();
/// assert_eq!(body, b"<p>&lt;b&gt;</p>");
/// ```
///
/// A caller-built environment is not accepted:
///
/// ```compile_fail
/// use std::sync::Arc;
/// use safeflight::TemplateResponse;
///
/// let mut env = minijinja::Environment::new();
/// env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);
/// let _ = TemplateResponse::new(Arc::new(env), "page.html", &());
/// ```
#[derive(Clone)]
pub struct Templates {
    env: Arc<Environment<'static>>,
}

impl Templates {
    /// Creates an empty template set.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        Self { env: Arc::new(env) }
    }

    /// Compiles and adds a template.
    ///
    /// # Errors
    ///
    /// Returns the minijinja syntax error if `source` does not compile.
    pub fn add_template(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), minijinja::Error> {
        Arc::make_mut(&mut self.env).add_template_owned(name.into(), source.into())
    }

    pub(crate) fn env(&self) -> &Environment<'static> {
        &self.env
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Templates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Templates").finish_non_exhaustive()
    }
}
