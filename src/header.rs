//! Response header collection with claim-based write ownership.
//!
//! [`Header`] wraps the outbound header map of a single request. Any component
//! may read it, but a header name can be *claimed* once: from then on the only
//! way to change it is the [`HeaderSetter`] returned by the claim. This lets a
//! security interceptor guarantee that no later interceptor or handler
//! overrides a value it decided on.
//!
//! `Set-Cookie` is deny-listed. Cookies go through
//! [`ResponseWriter::set_cookie`](crate::ResponseWriter::set_cookie).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use http::header::{HeaderMap, HeaderName, HeaderValue, SET_COOKIE};
use thiserror::Error;

/// Error returned when a header operation is refused.
///
/// # Examples
///
/// ```
/// use safeflight::{HeaderError, HeaderErrorKind};
///
/// let err = HeaderError::new(HeaderErrorKind::Claimed, "strict-transport-security");
/// assert_eq!(err.kind(), HeaderErrorKind::Claimed);
/// assert_eq!(err.name(), "strict-transport-security");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {name:?}")]
pub struct HeaderError {
    kind: HeaderErrorKind,
    name: String,
}

impl HeaderError {
    /// Creates a new header error for the given header name.
    pub fn new(kind: HeaderErrorKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> HeaderErrorKind {
        self.kind
    }

    /// Returns the header name the operation was attempted on.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Kind of header error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderErrorKind {
    /// The name is not a valid HTTP header name.
    InvalidName,
    /// The value contains bytes not allowed in a header value.
    InvalidValue,
    /// The name is permanently reserved for a typed API.
    DenyListed,
    /// The name has been claimed by another component.
    Claimed,
    /// The name has been marked immutable.
    Immutable,
}

impl fmt::Display for HeaderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName => write!(f, "invalid header name"),
            Self::InvalidValue => write!(f, "invalid header value"),
            Self::DenyListed => write!(f, "header is deny-listed"),
            Self::Claimed => write!(f, "header is claimed"),
            Self::Immutable => write!(f, "header is immutable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ownership {
    Claimed,
    Immutable,
}

/// Parses a header name into its canonical form.
///
/// Header names are case-insensitive; the canonical form is the lowercase
/// representation used by [`http::HeaderName`].
///
/// # Errors
///
/// Returns [`HeaderErrorKind::InvalidName`] if `name` is not a valid token.
///
/// # Examples
///
/// ```
/// use safeflight::header::canonicalize;
///
/// assert_eq!(canonicalize("X-Frame-Options").unwrap(), canonicalize("x-fRAME-options").unwrap());
/// assert!(canonicalize("bad header").is_err());
/// ```
pub fn canonicalize(name: &str) -> Result<HeaderName, HeaderError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| HeaderError::new(HeaderErrorKind::InvalidName, name))
}

fn is_deny_listed(name: &HeaderName) -> bool {
    name == SET_COOKIE
}

fn parse_value(name: &HeaderName, value: &str) -> Result<HeaderValue, HeaderError> {
    HeaderValue::from_str(value)
        .map_err(|_| HeaderError::new(HeaderErrorKind::InvalidValue, name.as_str()))
}

/// The outbound header collection of one request.
///
/// Created fresh for every request by the engine and reachable through
/// [`ResponseWriter::header_mut`](crate::ResponseWriter::header_mut) and
/// [`ResponseHeadersWriter::header_mut`](crate::ResponseHeadersWriter::header_mut).
pub struct Header {
    // Shared with the setters handed out by `claim`.
    map: Rc<RefCell<HeaderMap>>,
    owners: HashMap<HeaderName, Ownership>,
}

impl Header {
    pub(crate) fn new() -> Self {
        Self {
            map: Rc::new(RefCell::new(HeaderMap::new())),
            owners: HashMap::new(),
        }
    }

    /// Returns the first value of `name`, if present and valid UTF-8.
    pub fn get(&self, name: &str) -> Option<String> {
        let name = canonicalize(name).ok()?;
        self.map
            .borrow()
            .get(&name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }

    /// Returns a copy of every value of `name`, in insertion order.
    ///
    /// The returned vector is owned by the caller; modifying it has no
    /// effect on the response.
    pub fn values(&self, name: &str) -> Vec<String> {
        let Ok(name) = canonicalize(name) else {
            return Vec::new();
        };
        self.map
            .borrow()
            .get_all(&name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_owned)
            .collect()
    }

    /// Returns true if at least one value is set for `name`.
    pub fn contains(&self, name: &str) -> bool {
        canonicalize(name)
            .map(|name| self.map.borrow().contains_key(&name))
            .unwrap_or(false)
    }

    /// Replaces all values of `name` with `value`.
    ///
    /// # Errors
    ///
    /// Fails if the name or value is invalid, the name is deny-listed, or the
    /// name has been claimed or marked immutable.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), HeaderError> {
        let name = self.writable(name)?;
        let value = parse_value(&name, value)?;
        self.map.borrow_mut().insert(name, value);
        Ok(())
    }

    /// Appends `value` to the values of `name`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`set`](Self::set).
    pub fn add(&mut self, name: &str, value: &str) -> Result<(), HeaderError> {
        let name = self.writable(name)?;
        let value = parse_value(&name, value)?;
        self.map.borrow_mut().append(name, value);
        Ok(())
    }

    /// Removes every value of `name`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`set`](Self::set), except for value validation.
    pub fn del(&mut self, name: &str) -> Result<(), HeaderError> {
        let name = self.writable(name)?;
        self.map.borrow_mut().remove(&name);
        Ok(())
    }

    /// Claims exclusive write ownership of `name`.
    ///
    /// After a successful claim every generic [`set`](Self::set),
    /// [`add`](Self::add) and [`del`](Self::del) on `name` fails. The returned
    /// setter is the only remaining way to change the header.
    ///
    /// # Errors
    ///
    /// Fails if the name is invalid, deny-listed, already claimed or marked
    /// immutable.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let set_sts = w.header_mut().claim("Strict-Transport-Security")?;
    /// set_sts.set(&["max-age=63072000; includeSubDomains"])?;
    ///
    /// // Nobody else can touch it now.
    /// assert!(w.header_mut().set("strict-transport-security", "max-age=0").is_err());
    /// ```
    pub fn claim(&mut self, name: &str) -> Result<HeaderSetter, HeaderError> {
        let name = self.writable(name)?;
        self.owners.insert(name.clone(), Ownership::Claimed);
        Ok(HeaderSetter {
            name,
            map: Rc::clone(&self.map),
        })
    }

    /// Marks `name` read-only without handing out a setter.
    ///
    /// The current values stay as they are and can never change again for the
    /// rest of the request.
    ///
    /// # Errors
    ///
    /// Fails if the name is invalid, deny-listed, already claimed or already
    /// immutable.
    pub fn mark_immutable(&mut self, name: &str) -> Result<(), HeaderError> {
        let name = self.writable(name)?;
        self.owners.insert(name, Ownership::Immutable);
        Ok(())
    }

    /// Returns true if `name` cannot be written through the generic API.
    ///
    /// Deny-listed names count as permanently claimed. Invalid names are never
    /// claimed.
    pub fn is_claimed(&self, name: &str) -> bool {
        match canonicalize(name) {
            Ok(name) => is_deny_listed(&name) || self.owners.contains_key(&name),
            Err(_) => false,
        }
    }

    /// Returns the number of distinct header names currently set.
    pub fn len(&self) -> usize {
        self.map.borrow().keys_len()
    }

    /// Returns true if no header is set.
    pub fn is_empty(&self) -> bool {
        self.map.borrow().is_empty()
    }

    fn writable(&self, name: &str) -> Result<HeaderName, HeaderError> {
        let name = canonicalize(name)?;
        if is_deny_listed(&name) {
            return Err(HeaderError::new(HeaderErrorKind::DenyListed, name.as_str()));
        }
        match self.owners.get(&name) {
            None => Ok(name),
            Some(owner) => {
                let kind = match owner {
                    Ownership::Claimed => HeaderErrorKind::Claimed,
                    Ownership::Immutable => HeaderErrorKind::Immutable,
                };
                tracing::warn!(header = %name, %kind, "refused write to owned header");
                Err(HeaderError::new(kind, name.as_str()))
            }
        }
    }

    /// Engine-only write that bypasses ownership, used for `Content-Type`,
    /// `Location` and other values the engine itself is responsible for.
    pub(crate) fn set_privileged(&self, name: HeaderName, value: HeaderValue) {
        self.map.borrow_mut().insert(name, value);
    }

    pub(crate) fn append_cookie(&self, value: HeaderValue) {
        self.map.borrow_mut().append(SET_COOKIE, value);
    }

    /// Drops every value, including cookies. Ownership records are kept.
    pub(crate) fn clear(&self) {
        self.map.borrow_mut().clear();
    }

    pub(crate) fn snapshot(&self) -> HeaderMap {
        self.map.borrow().clone()
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("map", &self.map.borrow())
            .field("owned", &self.owners.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Exclusive write handle for a claimed header.
///
/// Returned by [`Header::claim`]. Typically an interceptor keeps it in the
/// request's [`FlightValues`](crate::FlightValues) so that a handler can later
/// influence the header only through a function the interceptor exposes.
///
/// A setter is tied to the request that created it and is not `Send`.
pub struct HeaderSetter {
    name: HeaderName,
    map: Rc<RefCell<HeaderMap>>,
}

impl HeaderSetter {
    /// Returns the claimed header name.
    pub fn name(&self) -> &HeaderName {
        &self.name
    }

    /// Replaces the header's values with `values`.
    ///
    /// An empty slice removes the header. Calling this repeatedly with the
    /// same values leaves the header unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderErrorKind::InvalidValue`] if any value is not a valid
    /// header value. Nothing is changed in that case.
    pub fn set(&self, values: &[&str]) -> Result<(), HeaderError> {
        let parsed = values
            .iter()
            .map(|v| parse_value(&self.name, v))
            .collect::<Result<Vec<_>, _>>()?;
        let mut map = self.map.borrow_mut();
        map.remove(&self.name);
        for value in parsed {
            map.append(self.name.clone(), value);
        }
        Ok(())
    }
}

impl fmt::Debug for HeaderSetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderSetter")
            .field("name", &self.name)
            .finish()
    }
}
