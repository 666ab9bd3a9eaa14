//! Environment-based configuration.
//!
//! Every knob comes from the process environment, matching how the
//! application has always been deployed locally: `DATABASE_URL` and
//! `SECRET_KEY` are required, `BASE_URL` and `DEBUG` have development
//! defaults.

use std::fmt;
use std::path::PathBuf;

use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("BASE_URL must start with http:// or https://")]
    BaseUrlScheme,
    #[error("BASE_URL must not end with /")]
    BaseUrlTrailingSlash,
    #[error("unsupported database scheme {0:?}; only sqlite databases are supported")]
    UnsupportedScheme(String),
    #[error("DATABASE_URL has no database path")]
    EmptyDatabasePath,
}

/// The signing key for password hashes. Deliberately opaque in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: PathBuf,
    pub secret_key: SecretKey,
    pub base_url: String,
    pub debug: bool,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary lookup, so tests never have to touch
    /// the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_db = lookup("DATABASE_URL").ok_or(ConfigError::MissingVar("DATABASE_URL"))?;
        let database_path = database_path_from_url(&raw_db)?;

        let secret_key = lookup("SECRET_KEY")
            .map(SecretKey::new)
            .ok_or(ConfigError::MissingVar("SECRET_KEY"))?;

        let base_url = lookup("BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        validate_base_url(&base_url)?;

        let debug = lookup("DEBUG").as_deref() == Some("True");

        Ok(Self {
            database_path,
            secret_key,
            base_url,
            debug,
        })
    }
}

fn validate_base_url(base_url: &str) -> Result<(), ConfigError> {
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::BaseUrlScheme);
    }
    if base_url.ends_with('/') {
        return Err(ConfigError::BaseUrlTrailingSlash);
    }
    Ok(())
}

/// Resolve a `DATABASE_URL` value to a SQLite file path.
///
/// Accepts `sqlite:relative/path.db`, `sqlite:///absolute/path.db`, or a
/// bare filesystem path. Any other URL scheme is rejected: the only bundled
/// driver is SQLite.
pub fn database_path_from_url(raw: &str) -> Result<PathBuf, ConfigError> {
    match Url::parse(raw) {
        Ok(url) if url.scheme() == "sqlite" || url.scheme() == "file" => {
            let path = url.path();
            if path.is_empty() {
                return Err(ConfigError::EmptyDatabasePath);
            }
            Ok(PathBuf::from(path))
        }
        Ok(url) => Err(ConfigError::UnsupportedScheme(url.scheme().to_string())),
        // Not a URL at all: treat it as a plain path.
        Err(_) => {
            if raw.is_empty() {
                return Err(ConfigError::EmptyDatabasePath);
            }
            Ok(PathBuf::from(raw))
        }
    }
}
