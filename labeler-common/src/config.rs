//! Configuration loading and resolution
//!
//! Every setting is resolved with the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Command-line and environment values arrive together as [`ConfigOverrides`]
//! (the binary's argument parser merges those two tiers). Settings are read
//! once at startup and never change for the lifetime of the process.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default number of candidates per session
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Upper bound for the page size (configured or per request)
pub const MAX_PAGE_SIZE: usize = 200;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8000;

/// Default bind address
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default label collection (table) name
pub const DEFAULT_COLLECTION: &str = "labels";

/// Default image root, relative to the working directory
pub const DEFAULT_IMAGE_ROOT: &str = "./images";

/// Default upload root, relative to the working directory
pub const DEFAULT_UPLOAD_ROOT: &str = "./uploads";

/// Default login user name
pub const DEFAULT_USERNAME: &str = "user";

/// Default access token lifetime
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Minimum length of a configured JWT signing secret
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Cross-origin policy for the HTTP surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    /// Any origin, method and header (`*`)
    AllowAny,
    /// Only the listed origins
    AllowList(Vec<String>),
}

impl CorsPolicy {
    /// Build a policy from a list of origins. An empty list or any `*` entry
    /// allows every origin.
    pub fn from_origins<S: AsRef<str>>(origins: &[S]) -> Self {
        let cleaned: Vec<String> = origins
            .iter()
            .map(|o| o.as_ref().trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        if cleaned.is_empty() || cleaned.iter().any(|o| o == "*") {
            CorsPolicy::AllowAny
        } else {
            CorsPolicy::AllowList(cleaned)
        }
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub image_root: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub collection: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub page_size: Option<usize>,
    pub cors_origins: Option<Vec<String>>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub jwt_secret: Option<String>,
    pub token_ttl_secs: Option<u64>,
    pub upload_root: Option<PathBuf>,
    pub batches: Option<PathBuf>,
}

/// Optional TOML config file contents
///
/// All keys are optional; missing keys fall through to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub image_root: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub collection: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub page_size: Option<usize>,
    pub cors_origins: Option<Vec<String>>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub jwt_secret: Option<String>,
    pub token_ttl_secs: Option<u64>,
    pub upload_root: Option<PathBuf>,
    pub batches: Option<PathBuf>,
}

impl TomlConfig {
    /// Load a config file that was named explicitly. A missing or malformed
    /// file is a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory scanned for images and served under `/images/`
    pub image_root: PathBuf,
    /// SQLite database file holding the label collection
    pub database_path: PathBuf,
    /// Table name of the label collection
    pub collection: String,
    pub host: String,
    pub port: u16,
    /// Candidates per session when the request does not override it
    pub page_size: usize,
    pub cors: CorsPolicy,
    /// Login settings; `None` disables authentication
    pub auth: Option<AuthConfig>,
    /// Directory receiving uploaded ZIP archives
    pub upload_root: PathBuf,
    /// TOML file listing predefined batches
    pub batches_path: Option<PathBuf>,
}

/// Login and token settings
///
/// Authentication is on only when a password is configured.
#[derive(Clone)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
    /// HS256 signing secret; `None` means a random per-process secret
    pub jwt_secret: Option<String>,
    pub token_ttl_secs: u64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl ServiceConfig {
    /// Resolve settings from overrides, then the config file, then defaults
    pub fn resolve(overrides: ConfigOverrides, file: Option<TomlConfig>) -> Result<Self> {
        let file = file.unwrap_or_default();

        let config = ServiceConfig {
            image_root: overrides
                .image_root
                .or(file.image_root)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_ROOT)),
            database_path: overrides
                .database
                .or(file.database)
                .unwrap_or_else(default_database_path),
            collection: overrides
                .collection
                .or(file.collection)
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            host: overrides
                .host
                .or(file.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: overrides.port.or(file.port).unwrap_or(DEFAULT_PORT),
            page_size: overrides
                .page_size
                .or(file.page_size)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            cors: overrides
                .cors_origins
                .or(file.cors_origins)
                .map(|origins| CorsPolicy::from_origins(&origins))
                .unwrap_or(CorsPolicy::AllowAny),
            auth: overrides
                .password
                .or(file.password)
                .filter(|p| !p.trim().is_empty())
                .map(|password| AuthConfig {
                    username: non_blank(overrides.username.or(file.username))
                        .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
                    password,
                    jwt_secret: non_blank(overrides.jwt_secret.or(file.jwt_secret)),
                    token_ttl_secs: overrides
                        .token_ttl_secs
                        .or(file.token_ttl_secs)
                        .unwrap_or(DEFAULT_TOKEN_TTL_SECS),
                }),
            upload_root: overrides
                .upload_root
                .or(file.upload_root)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_ROOT)),
            batches_path: overrides.batches.or(file.batches),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that cannot be expressed in the types
    pub fn validate(&self) -> Result<()> {
        validate_page_size(self.page_size)?;

        if !is_valid_collection_name(&self.collection) {
            return Err(Error::Config(format!(
                "Invalid collection name '{}' (expected letters, digits and underscores)",
                self.collection
            )));
        }

        if let Some(auth) = &self.auth {
            if auth.token_ttl_secs == 0 {
                return Err(Error::Config("Token lifetime must be at least 1 second".to_string()));
            }
            if let Some(secret) = &auth.jwt_secret {
                if secret.len() < MIN_JWT_SECRET_LENGTH {
                    return Err(Error::Config(format!(
                        "JWT secret must be at least {} characters (got {})",
                        MIN_JWT_SECRET_LENGTH,
                        secret.len()
                    )));
                }
            }
        }

        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Page size must be within 1..=MAX_PAGE_SIZE
pub fn validate_page_size(page_size: usize) -> Result<()> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(Error::Config(format!(
            "Page size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, page_size
        )));
    }
    Ok(())
}

/// The collection name is interpolated into SQL, so it is restricted to a
/// plain identifier.
pub fn is_valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Get OS-dependent default database path
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("labeler").join("labels.db"))
        .unwrap_or_else(|| PathBuf::from("./labeler_data/labels.db"))
}
