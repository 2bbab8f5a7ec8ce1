//! Service configuration.
//!
//! Loaded from an optional JSON file, then overridden by `KVLOOKUP_*`
//! environment variables, then validated. Anything invalid stops startup.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bigtable::auth::DEFAULT_METADATA_TOKEN_URL;
use crate::bigtable::rest::{DEFAULT_ADMIN_ENDPOINT, DEFAULT_DATA_ENDPOINT};
use crate::bigtable::{BigtableConnector, MemoryConnector, RestConnector, RestSettings, TokenSource};
use crate::http_server::HttpServerConfig;
use crate::observability::LogFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {message}")]
    Read { path: String, message: String },

    #[error("invalid config JSON: {0}")]
    Parse(String),

    #[error("{name} is invalid: {message}")]
    Env { name: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which connector serves the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process tables, lost on exit
    Memory,
    /// Bigtable over its REST API
    #[default]
    Rest,
}

/// How the REST connector authenticates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    None,
    StaticToken,
    #[default]
    Metadata,
}

/// REST connector settings
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestConfig {
    #[serde(default = "default_admin_endpoint")]
    pub admin_endpoint: String,

    #[serde(default = "default_data_endpoint")]
    pub data_endpoint: String,

    #[serde(default)]
    pub auth: AuthMode,

    /// Required when `auth` is `static_token`
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for RestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestConfig")
            .field("admin_endpoint", &self.admin_endpoint)
            .field("data_endpoint", &self.data_endpoint)
            .field("auth", &self.auth)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("metadata_url", &self.metadata_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn default_admin_endpoint() -> String {
    DEFAULT_ADMIN_ENDPOINT.to_string()
}

fn default_data_endpoint() -> String {
    DEFAULT_DATA_ENDPOINT.to_string()
}

fn default_metadata_url() -> String {
    DEFAULT_METADATA_TOKEN_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            admin_endpoint: default_admin_endpoint(),
            data_endpoint: default_data_endpoint(),
            auth: AuthMode::default(),
            access_token: None,
            metadata_url: default_metadata_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// GCP project hosting every instance
    #[serde(default)]
    pub project_id: String,

    /// Instances the registry connects to
    #[serde(default)]
    pub instance_ids: Vec<String>,

    /// Family read by `readCellData` and used when `createTable` omits one
    #[serde(default = "default_column_family")]
    pub column_family: String,

    /// Qualifier read by `readCellData`
    #[serde(default = "default_column_qualifier")]
    pub column_qualifier: String,

    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default)]
    pub rest: RestConfig,

    #[serde(default)]
    pub http: HttpServerConfig,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Upper bound for `countRows?limit=`
    #[serde(default = "default_max_count_limit")]
    pub max_count_limit: u64,
}

fn default_column_family() -> String {
    "cf1".to_string()
}

fn default_column_qualifier() -> String {
    "name".to_string()
}

fn default_max_count_limit() -> u64 {
    10_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            instance_ids: Vec::new(),
            column_family: default_column_family(),
            column_qualifier: default_column_qualifier(),
            backend: BackendKind::default(),
            rest: RestConfig::default(),
            http: HttpServerConfig::default(),
            log_format: LogFormat::default(),
            max_count_limit: default_max_count_limit(),
        }
    }
}

impl AppConfig {
    /// File (if given), then process environment, then validation
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::resolve(path)?;
        config.validate()?;
        Ok(config)
    }

    /// File (if given) and process environment, without validation
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `KVLOOKUP_*` overrides looked up through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name).and_then(|v| {
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
        };

        if let Some(v) = get("KVLOOKUP_PROJECT_ID") {
            self.project_id = v;
        }
        if let Some(v) = get("KVLOOKUP_INSTANCE_IDS") {
            self.instance_ids = split_list(&v);
        }
        if let Some(v) = get("KVLOOKUP_COLUMN_FAMILY") {
            self.column_family = v;
        }
        if let Some(v) = get("KVLOOKUP_COLUMN_QUALIFIER") {
            self.column_qualifier = v;
        }
        if let Some(v) = get("KVLOOKUP_BACKEND") {
            self.backend = match v.to_ascii_lowercase().as_str() {
                "memory" => BackendKind::Memory,
                "rest" => BackendKind::Rest,
                other => return Err(env_error("KVLOOKUP_BACKEND", format!("unknown backend '{}'", other))),
            };
        }
        if let Some(v) = get("KVLOOKUP_ADMIN_ENDPOINT") {
            self.rest.admin_endpoint = v;
        }
        if let Some(v) = get("KVLOOKUP_DATA_ENDPOINT") {
            self.rest.data_endpoint = v;
        }
        if let Some(v) = get("KVLOOKUP_AUTH_MODE") {
            self.rest.auth = match v.to_ascii_lowercase().as_str() {
                "none" => AuthMode::None,
                "static_token" => AuthMode::StaticToken,
                "metadata" => AuthMode::Metadata,
                other => return Err(env_error("KVLOOKUP_AUTH_MODE", format!("unknown auth mode '{}'", other))),
            };
        }
        if let Some(v) = get("KVLOOKUP_ACCESS_TOKEN") {
            self.rest.access_token = Some(v);
        }
        if let Some(v) = get("KVLOOKUP_METADATA_URL") {
            self.rest.metadata_url = v;
        }
        if let Some(v) = get("KVLOOKUP_REQUEST_TIMEOUT_SECS") {
            self.rest.request_timeout_secs = parse_number("KVLOOKUP_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("KVLOOKUP_HOST") {
            self.http.host = v;
        }
        if let Some(v) = get("KVLOOKUP_PORT") {
            self.http.port = parse_number("KVLOOKUP_PORT", &v)?;
        }
        if let Some(v) = get("KVLOOKUP_CORS_ORIGINS") {
            self.http.cors_origins = split_list(&v);
        }
        if let Some(v) = get("KVLOOKUP_LOG_FORMAT") {
            self.log_format = v
                .parse()
                .map_err(|message| env_error("KVLOOKUP_LOG_FORMAT", message))?;
        }
        if let Some(v) = get("KVLOOKUP_MAX_COUNT_LIMIT") {
            self.max_count_limit = parse_number("KVLOOKUP_MAX_COUNT_LIMIT", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::Invalid("project_id is required".to_string()));
        }
        if self.instance_ids.is_empty() {
            return Err(ConfigError::Invalid(
                "instance_ids must list at least one instance".to_string(),
            ));
        }
        if self.column_family.trim().is_empty() {
            return Err(ConfigError::Invalid("column_family must not be blank".to_string()));
        }
        if self.column_qualifier.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "column_qualifier must not be blank".to_string(),
            ));
        }
        self.http
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.max_count_limit == 0 {
            return Err(ConfigError::Invalid("max_count_limit must be > 0".to_string()));
        }
        if self.backend == BackendKind::Rest {
            if self.rest.request_timeout_secs == 0 {
                return Err(ConfigError::Invalid(
                    "rest.request_timeout_secs must be > 0".to_string(),
                ));
            }
            if self.rest.auth == AuthMode::StaticToken
                && self
                    .rest
                    .access_token
                    .as_deref()
                    .map_or(true, |t| t.trim().is_empty())
            {
                return Err(ConfigError::Invalid(
                    "rest.access_token is required when rest.auth is static_token".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Connector for the configured backend
    pub fn connector(&self) -> Result<Box<dyn BigtableConnector>, ConfigError> {
        match self.backend {
            BackendKind::Memory => Ok(Box::new(MemoryConnector::new())),
            BackendKind::Rest => {
                let tokens = match self.rest.auth {
                    AuthMode::None => TokenSource::Anonymous,
                    AuthMode::StaticToken => {
                        TokenSource::Static(self.rest.access_token.clone().unwrap_or_default())
                    }
                    AuthMode::Metadata => TokenSource::metadata(self.rest.metadata_url.clone()),
                };
                let settings = RestSettings {
                    admin_endpoint: self.rest.admin_endpoint.clone(),
                    data_endpoint: self.rest.data_endpoint.clone(),
                    tokens,
                    request_timeout: Duration::from_secs(self.rest.request_timeout_secs),
                };
                let connector =
                    RestConnector::new(settings).map_err(|e| ConfigError::Invalid(e.to_string()))?;
                Ok(Box::new(connector))
            }
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| env_error(name, e.to_string()))
}

fn env_error(name: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Env {
        name: name.to_string(),
        message: message.into(),
    }
}
