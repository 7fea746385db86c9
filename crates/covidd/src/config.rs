//! Configuration management for covidd.
//!
//! Loads settings from /etc/covidd/config.toml or uses defaults. A few values
//! can also come from the environment the hosting platform provides.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/covidd/config.toml";

/// Port override set by serverless hosts
pub const PORT_ENV: &str = "PORT";

/// Project fallbacks, checked in order
pub const PROJECT_ENVS: &[&str] = &["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT", "GCP_PROJECT"];

/// Bearer token fallback
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum accepted webhook body size
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// BigQuery access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BigQueryConfig {
    /// Project billed for the queries (the dataset itself is public)
    #[serde(default)]
    pub project_id: String,

    /// REST API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Metadata server used to mint access tokens when none is configured
    #[serde(default = "default_metadata_base")]
    pub metadata_base: String,

    /// Static bearer token; empty means ask the metadata server
    #[serde(default)]
    pub access_token: String,
}

fn default_api_base() -> String {
    "https://bigquery.googleapis.com/bigquery/v2".to_string()
}

fn default_metadata_base() -> String {
    "http://metadata.google.internal/computeMetadata/v1".to_string()
}

impl Default for BigQueryConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            api_base: default_api_base(),
            metadata_base: default_metadata_base(),
            access_token: String::new(),
        }
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub bigquery: BigQueryConfig,
}

impl Config {
    /// Load config from `path`; a missing or broken file falls back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Config::default();
        }
        Self::load_from_path(path).unwrap_or_else(|e| {
            warn!("Invalid config at {}, using defaults: {}", path.display(), e);
            Config::default()
        })
    }

    /// Load config from specific path
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Fill gaps from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(PORT_ENV).filter(|p| !p.is_empty()) {
            self.server.bind = with_port(&self.server.bind, &port);
        }

        if self.bigquery.project_id.is_empty() {
            if let Some(project) = PROJECT_ENVS
                .iter()
                .filter_map(|key| lookup(key))
                .find(|v| !v.is_empty())
            {
                self.bigquery.project_id = project;
            }
        }

        if self.bigquery.access_token.is_empty() {
            if let Some(token) = lookup(ACCESS_TOKEN_ENV).filter(|t| !t.is_empty()) {
                self.bigquery.access_token = token;
            }
        }
    }
}

/// Replace the port of a `host:port` address
fn with_port(bind: &str, port: &str) -> String {
    let host = bind.rsplit_once(':').map(|(h, _)| h).unwrap_or(bind);
    format!("{}:{}", host, port)
}
