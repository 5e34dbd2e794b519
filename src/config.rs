//! Deployment configuration.
//!
//! Loaded from TOML; every field has a production-safe default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! local_dev = false
//!
//! [hsts]
//! max_age_secs = 63072000
//! include_subdomains = true
//! preload = false
//! behind_proxy = false
//!
//! [csp]
//! report_uri = "https://csp.example.com/report"
//! report_only = false
//! ```

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::cookie::CookieDefaults;

const ONE_YEAR_SECS: u64 = 365 * 24 * 60 * 60;

/// Error returned when configuration cannot be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    /// The TOML did not parse into a [`Config`].
    #[error("config parse: {0}")]
    Parse(#[from] toml::de::Error),
    /// The values parsed but are inconsistent.
    #[error("config validation failed: {}", join(.0))]
    Invalid(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// One inconsistency found by [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field
    pub field: &'static str,
    /// What is wrong with it
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Relaxes defaults that break plain-HTTP development servers. Never
    /// enable in production.
    pub local_dev: bool,
    /// Strict-Transport-Security settings.
    pub hsts: HstsSettings,
    /// Content-Security-Policy settings.
    pub csp: CspSettings,
}

/// Settings for the HSTS interceptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HstsSettings {
    /// `max-age` in seconds.
    pub max_age_secs: u64,
    /// Adds `includeSubDomains`.
    pub include_subdomains: bool,
    /// Adds `preload`.
    pub preload: bool,
    /// TLS is terminated by a proxy: never redirect plain-HTTP requests,
    /// always send the header.
    pub behind_proxy: bool,
}

impl Default for HstsSettings {
    fn default() -> Self {
        Self {
            max_age_secs: 2 * ONE_YEAR_SECS,
            include_subdomains: true,
            preload: false,
            behind_proxy: false,
        }
    }
}

/// Settings for the CSP interceptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CspSettings {
    /// Adds a `report-uri` directive.
    pub report_uri: Option<String>,
    /// Sends `Content-Security-Policy-Report-Only` instead of enforcing.
    pub report_only: bool,
}

impl CspSettings {
    /// Checks that `report_uri` cannot break out of its directive.
    ///
    /// # Errors
    ///
    /// Fails if the URI is empty or contains `;`, `,` or control characters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.report_uri {
            Some(uri)
                if uri.is_empty()
                    || uri.contains([';', ','])
                    || uri.chars().any(char::is_control) =>
            {
                Err(ValidationError {
                    field: "csp.report_uri",
                    message: format!("{uri:?} is not a usable directive value"),
                })
            }
            _ => Ok(()),
        }
    }
}

impl Config {
    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    ///
    /// # Examples
    ///
    /// ```
    /// use safeflight::Config;
    ///
    /// let config = Config::from_toml_str("local_dev = true\n[hsts]\npreload = true").unwrap();
    /// assert!(config.local_dev);
    /// assert!(config.hsts.preload);
    /// assert_eq!(config.hsts.max_age_secs, 63072000);
    /// ```
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(input)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns every violation found.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.hsts.preload {
            if !self.hsts.include_subdomains {
                errors.push(ValidationError {
                    field: "hsts.preload",
                    message: "preload requires include_subdomains".to_owned(),
                });
            }
            if self.hsts.max_age_secs < ONE_YEAR_SECS {
                errors.push(ValidationError {
                    field: "hsts.preload",
                    message: format!("preload requires max_age_secs >= {ONE_YEAR_SECS}"),
                });
            }
        }

        if let Err(err) = self.csp.validate() {
            errors.push(err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Cookie defaults implied by this configuration.
    pub fn cookie_defaults(&self) -> CookieDefaults {
        if self.local_dev {
            CookieDefaults::local_dev()
        } else {
            CookieDefaults::secure()
        }
    }
}
