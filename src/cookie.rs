//! Outbound cookies with secure defaults.
//!
//! `Set-Cookie` cannot be written through [`Header`](crate::Header); cookies
//! are built here and attached with
//! [`ResponseWriter::set_cookie`](crate::ResponseWriter::set_cookie).

use std::fmt;

use http::HeaderValue;
use thiserror::Error;

/// Error returned when a cookie fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {value:?}")]
pub struct CookieError {
    kind: CookieErrorKind,
    value: String,
}

impl CookieError {
    fn new(kind: CookieErrorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> CookieErrorKind {
        self.kind
    }
}

/// Kind of cookie error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieErrorKind {
    /// The name is empty or not an HTTP token.
    InvalidName,
    /// The value contains a forbidden byte.
    InvalidValue,
    /// A `Path` or `Domain` attribute contains a forbidden byte.
    InvalidAttribute,
}

impl fmt::Display for CookieErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName => write!(f, "invalid cookie name"),
            Self::InvalidValue => write!(f, "invalid cookie value"),
            Self::InvalidAttribute => write!(f, "invalid cookie attribute"),
        }
    }
}

/// The `SameSite` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// `SameSite=Strict`
    Strict,
    /// `SameSite=Lax`
    Lax,
    /// `SameSite=None`; requires `Secure` in current browsers.
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

/// Defaults applied to every new [`Cookie`].
///
/// Derived from [`Config::local_dev`](crate::Config::local_dev): in local
/// development `Secure` is dropped so cookies work over plain HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieDefaults {
    secure: bool,
}

impl CookieDefaults {
    /// Production defaults: `Secure` is set.
    pub fn secure() -> Self {
        Self { secure: true }
    }

    /// Local development defaults: `Secure` is not set.
    pub fn local_dev() -> Self {
        Self { secure: false }
    }

    /// Returns true if new cookies get `Secure`.
    pub fn is_secure(&self) -> bool {
        self.secure
    }
}

impl Default for CookieDefaults {
    fn default() -> Self {
        Self::secure()
    }
}

/// An outbound cookie.
///
/// New cookies are `Secure` (unless the defaults say otherwise), `HttpOnly`,
/// `SameSite=Lax` and scoped to `Path=/`.
///
/// # Examples
///
/// ```
/// use safeflight::{Cookie, CookieDefaults, SameSite};
///
/// let cookie = Cookie::new("session", "abc123", &CookieDefaults::default())
///     .unwrap()
///     .same_site(SameSite::Strict)
///     .max_age(3600);
/// assert_eq!(
///     cookie.to_string(),
///     "session=abc123; Path=/; Max-Age=3600; Secure; HttpOnly; SameSite=Strict"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    path: Option<String>,
    domain: Option<String>,
    max_age: Option<i64>,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
}

impl Cookie {
    /// Creates a cookie with secure attributes.
    ///
    /// # Errors
    ///
    /// Fails if the name is not a token or the value contains bytes outside
    /// the cookie-octet set.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        defaults: &CookieDefaults,
    ) -> Result<Self, CookieError> {
        let name = name.into();
        let value = value.into();
        if name.is_empty() || !name.bytes().all(is_token_byte) {
            return Err(CookieError::new(CookieErrorKind::InvalidName, name));
        }
        if !value.bytes().all(is_cookie_octet) {
            return Err(CookieError::new(CookieErrorKind::InvalidValue, value));
        }
        Ok(Self {
            name,
            value,
            path: Some("/".to_owned()),
            domain: None,
            max_age: None,
            secure: defaults.is_secure(),
            http_only: true,
            same_site: Some(SameSite::Lax),
        })
    }

    /// Returns the cookie name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the cookie value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Sets the `Path` attribute.
    ///
    /// # Errors
    ///
    /// Fails if `path` contains `;` or control characters.
    pub fn path(mut self, path: impl Into<String>) -> Result<Self, CookieError> {
        let path = path.into();
        check_attribute(&path)?;
        self.path = Some(path);
        Ok(self)
    }

    /// Sets the `Domain` attribute.
    ///
    /// # Errors
    ///
    /// Fails if `domain` contains `;` or control characters.
    pub fn domain(mut self, domain: impl Into<String>) -> Result<Self, CookieError> {
        let domain = domain.into();
        check_attribute(&domain)?;
        self.domain = Some(domain);
        Ok(self)
    }

    /// Sets `Max-Age` in seconds. Zero or negative expires the cookie
    /// immediately.
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Sets or clears `Secure`.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets or clears `HttpOnly`.
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Sets the `SameSite` attribute.
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Returns true if `Secure` is set.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Serializes the cookie as a `Set-Cookie` header value.
    ///
    /// # Errors
    ///
    /// Cannot fail for cookies built through this API; the error is kept for
    /// values that `http` refuses.
    pub fn to_header_value(&self) -> Result<HeaderValue, CookieError> {
        HeaderValue::from_str(&self.to_string())
            .map_err(|_| CookieError::new(CookieErrorKind::InvalidValue, self.value.clone()))
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={}", max_age.max(0))?;
        }
        if self.secure {
            write!(f, "; Secure")?;
        }
        if self.http_only {
            write!(f, "; HttpOnly")?;
        }
        if let Some(same_site) = self.same_site {
            write!(f, "; SameSite={same_site}")?;
        }
        Ok(())
    }
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

// RFC 6265 cookie-octet
fn is_cookie_octet(b: u8) -> bool {
    matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E)
}

fn check_attribute(value: &str) -> Result<(), CookieError> {
    if value.bytes().any(|b| b == b';' || b.is_ascii_control()) {
        return Err(CookieError::new(CookieErrorKind::InvalidAttribute, value));
    }
    Ok(())
}
