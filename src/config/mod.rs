//! Configuration loaded once from the environment
//!
//! All settings are collected into an explicit [`Config`] struct at startup and
//! passed by reference into each component. Environment access goes through a
//! lookup function so tests can supply their own variables without touching
//! process state.

use crate::error::{Error, Result};
use crate::resolver::parse_timestamp;
use chrono::{DateTime, Utc};

/// Purge endpoint settings
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Purge target URL
    pub endpoint: String,
    /// Optional basic-auth credentials
    pub username: Option<String>,
    pub password: Option<String>,
    /// Tag purged alongside any named entry, covering the unnamed cache partition
    pub default_entry_name: String,
    /// HTTP header carrying the purge tag
    pub tag_header: String,
    /// Also purge URL-encoded forms of each dataset IRI
    pub support_url_encoded: bool,
}

/// SPARQL endpoint settings
#[derive(Debug, Clone)]
pub struct SparqlConfig {
    pub endpoint_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Object-store connection settings for checkpoint persistence
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub ssl_enabled: bool,
    pub force_path_style: bool,
}

impl S3Config {
    /// Endpoint URL with the scheme implied by the TLS flag when none is given
    pub fn endpoint_url(&self) -> Option<String> {
        self.endpoint.as_ref().map(|endpoint| {
            if endpoint.contains("://") {
                endpoint.clone()
            } else if self.ssl_enabled {
                format!("https://{endpoint}")
            } else {
                format!("http://{endpoint}")
            }
        })
    }
}

/// Checkpoint persistence settings
#[derive(Debug, Clone)]
pub struct CheckpointConfig {
    /// Whether the checkpoint is persisted between runs at all
    pub enabled: bool,
    pub s3: S3Config,
    /// Object key holding the last-run timestamp (plain text)
    pub last_timestamp_key: String,
    /// Object key holding the date-only watch map (JSON)
    pub date_only_watch_key: String,
}

/// Complete configuration for one reconciliation pass
#[derive(Debug, Clone)]
pub struct Config {
    pub cache: CacheConfig,
    pub sparql: SparqlConfig,
    pub checkpoint: CheckpointConfig,
    /// Override for the previous-date fallback used when no checkpoint is found
    pub default_previous_date: Option<DateTime<Utc>>,
}

impl Config {
    /// Build the configuration from process environment variables.
    ///
    /// Fails fast when a required endpoint is missing, before any work starts.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let var_or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());
        let flag = |key: &str, default: bool| match var(key) {
            Some(value) => value == "true",
            None => default,
        };

        let cache_endpoint = var("CACHE_ENDPOINT")
            .ok_or_else(|| Error::Config("CACHE_ENDPOINT is required".to_string()))?;
        let sparql_endpoint_url = var("SPARQL_ENDPOINT_URL")
            .ok_or_else(|| Error::Config("SPARQL_ENDPOINT_URL is required".to_string()))?;

        let default_previous_date = match var("DEFAULT_PREVIOUS_DATE") {
            Some(value) => Some(parse_timestamp(&value).ok_or_else(|| {
                Error::Config(format!("DEFAULT_PREVIOUS_DATE is not a valid timestamp: {value}"))
            })?),
            None => None,
        };

        Ok(Self {
            cache: CacheConfig {
                endpoint: cache_endpoint,
                username: var("CACHE_ENDPOINT_USERNAME"),
                password: var("CACHE_ENDPOINT_PASSWORD"),
                default_entry_name: var_or("CACHE_DEFAULT_ENTRY_NAME", "default"),
                tag_header: var_or("CACHE_TAG_HEADER", "xkey"),
                support_url_encoded: flag("SUPPORT_URL_ENCODED", true),
            },
            sparql: SparqlConfig {
                endpoint_url: sparql_endpoint_url,
                username: var("SPARQL_USERNAME"),
                password: var("SPARQL_PASSWORD"),
            },
            checkpoint: CheckpointConfig {
                enabled: flag("S3_ENABLED", false),
                s3: S3Config {
                    bucket: var_or("S3_BUCKET", "default"),
                    region: var_or("S3_REGION", "default"),
                    endpoint: var("S3_ENDPOINT"),
                    access_key_id: var("S3_ACCESS_KEY_ID"),
                    secret_access_key: var("S3_SECRET_ACCESS_KEY"),
                    ssl_enabled: flag("S3_SSL_ENABLED", false),
                    force_path_style: flag("S3_FORCE_PATH_STYLE", false),
                },
                last_timestamp_key: var_or("S3_LAST_TIMESTAMP_KEY", "last_timestamp.txt"),
                date_only_watch_key: var_or(
                    "S3_SIMPLE_DATE_WORKAROUND_KEY",
                    "simple_date_workaround.txt",
                ),
            },
            default_previous_date,
        })
    }
}
