//! Parsed `application/x-www-form-urlencoded` parameters.

use std::collections::HashMap;
use std::str::FromStr;

use percent_encoding::percent_decode_str;

use crate::request::RequestError;

/// Form parameters from a query string or a urlencoded body.
///
/// Every name maps to the list of its values in the order they appeared.
/// Typed accessors return the given default when the parameter is missing
/// and an error when it is present but does not parse.
///
/// # Examples
///
/// ```
/// use safeflight::Form;
///
/// let form = Form::parse("page=2&tag=a&tag=b&q=hello+world").unwrap();
/// assert_eq!(form.int64("page", 1).unwrap(), 2);
/// assert_eq!(form.int64("size", 20).unwrap(), 20);
/// assert_eq!(form.string("q", ""), "hello world");
/// assert_eq!(form.slice::<String>("tag").unwrap(), vec!["a", "b"]);
/// assert!(form.int64("q", 0).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    values: HashMap<String, Vec<String>>,
}

impl Form {
    /// Parses a urlencoded string.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::MalformedEncoding`] if a `%` is not followed by
    /// two hex digits or a decoded value is not UTF-8.
    pub fn parse(input: &str) -> Result<Self, RequestError> {
        check_percent_encoding(input)?;
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        for pair in input.split('&').filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let name = decode(name)?;
            let value = decode(value)?;
            values.entry(name).or_default().push(value);
        }
        Ok(Self { values })
    }

    /// Returns the first value of `name`, or `default`.
    pub fn string(&self, name: &str, default: &str) -> String {
        self.first(name).unwrap_or(default).to_owned()
    }

    /// Returns the first value of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::MissingField`] if the parameter is absent.
    pub fn required(&self, name: &str) -> Result<&str, RequestError> {
        self.first(name)
            .ok_or_else(|| RequestError::MissingField(name.to_owned()))
    }

    /// Parses the first value of `name` as `i64`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidField`] if the value is not an integer.
    pub fn int64(&self, name: &str, default: i64) -> Result<i64, RequestError> {
        self.parsed(name, default, "a signed integer")
    }

    /// Parses the first value of `name` as `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidField`] if the value is not an unsigned
    /// integer.
    pub fn uint64(&self, name: &str, default: u64) -> Result<u64, RequestError> {
        self.parsed(name, default, "an unsigned integer")
    }

    /// Parses the first value of `name` as `f64`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidField`] if the value is not a number.
    pub fn float64(&self, name: &str, default: f64) -> Result<f64, RequestError> {
        self.parsed(name, default, "a number")
    }

    /// Parses the first value of `name` as a boolean.
    ///
    /// Accepts `true`, `false`, `1` and `0`; the words are case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidField`] for anything else.
    pub fn bool(&self, name: &str, default: bool) -> Result<bool, RequestError> {
        let Some(raw) = self.first(name) else {
            return Ok(default);
        };
        parse_bool(raw).ok_or_else(|| invalid(name, "a boolean"))
    }

    /// Parses every value of `name` as `T`. A missing parameter yields an
    /// empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidField`] if any value fails to parse.
    pub fn slice<T: FromStr>(&self, name: &str) -> Result<Vec<T>, RequestError> {
        self.values
            .get(name)
            .map(|all| {
                all.iter()
                    .map(|v| v.parse::<T>().map_err(|_| invalid(name, std::any::type_name::<T>())))
                    .collect()
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    /// Returns true if `name` appeared at least once.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Returns the number of distinct parameter names.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn first(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|all| all.first())
            .map(String::as_str)
    }

    fn parsed<T: FromStr>(
        &self,
        name: &str,
        default: T,
        expected: &'static str,
    ) -> Result<T, RequestError> {
        match self.first(name) {
            None => Ok(default),
            Some(raw) => raw.parse::<T>().map_err(|_| invalid(name, expected)),
        }
    }
}

fn invalid(name: &str, expected: &'static str) -> RequestError {
    RequestError::InvalidField {
        field: name.to_owned(),
        expected,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" => Some(true),
        "0" => Some(false),
        _ if raw.eq_ignore_ascii_case("true") => Some(true),
        _ if raw.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn check_percent_encoding(input: &str) -> Result<(), RequestError> {
    let mut rest = input;
    while let Some(at) = rest.find('%') {
        let hex = rest.as_bytes().get(at + 1..at + 3);
        if !hex.is_some_and(|h| h.iter().all(u8::is_ascii_hexdigit)) {
            return Err(RequestError::MalformedEncoding);
        }
        rest = &rest[at + 3..];
    }
    Ok(())
}

// percent_decode passes malformed escapes through, so they are rejected
// up front by check_percent_encoding.
fn decode(part: &str) -> Result<String, RequestError> {
    let spaced = part.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| RequestError::MalformedEncoding)
}
