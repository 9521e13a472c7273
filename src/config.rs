//! Settings parsing, environment overlay, and validation.
//!
//! Settings are built once at process start: TOML file (optional), then
//! environment variables, then validation. Credentials are never read from
//! the TOML file.

use std::env;
use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use tracing::debug;

use crate::{AppError, Result};

/// Search/analytics store connectivity.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StoreConfig {
    /// Explicit cluster URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Elastic Cloud deployment id, used when `url` is absent.
    #[serde(default)]
    pub cloud_id: Option<String>,
    /// API key (populated at runtime from `ELASTIC_API_KEY`).
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Index receiving one document per run.
    #[serde(default = "default_incidents_index")]
    pub incidents_index: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            cloud_id: None,
            api_key: None,
            incidents_index: default_incidents_index(),
        }
    }
}

/// Workflow-execution webhook connectivity.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WebhookConfig {
    /// Base URL; must be `http` or `https` with a host.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bearer token (populated at runtime from `WEBHOOK_API_KEY`).
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Route appended to `base_url`.
    #[serde(default = "default_webhook_route")]
    pub route: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            route: default_webhook_route(),
        }
    }
}

fn default_incidents_index() -> String {
    "incidents-logs".into()
}

fn default_webhook_route() -> String {
    "/api/incident/execute".into()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_http_port() -> u16 {
    8000
}

/// Immutable process-wide settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    /// Store connectivity.
    #[serde(default)]
    pub store: StoreConfig,
    /// Webhook connectivity.
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Timeout applied to every outbound request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Port of the HTTP front door.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            webhook: WebhookConfig::default(),
            request_timeout_seconds: default_request_timeout(),
            http_port: default_http_port(),
        }
    }
}

impl Settings {
    /// Load settings from an optional TOML file, overlaid by the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read, contains
    /// invalid TOML, an environment value is malformed, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
                toml::from_str(&raw)?
            }
            None => Self::default(),
        };
        settings.normalize();
        settings.apply_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the environment alone.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if an environment value is malformed or
    /// validation fails.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Parse settings from a TOML string without consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut settings: Self = toml::from_str(raw)?;
        settings.normalize();
        settings.validate()?;
        Ok(settings)
    }

    /// Whether the store has both a credential and an endpoint.
    #[must_use]
    pub fn store_enabled(&self) -> bool {
        self.store.api_key.is_some() && (self.store.url.is_some() || self.store.cloud_id.is_some())
    }

    /// Whether the webhook has both a base URL and a credential.
    #[must_use]
    pub fn webhook_enabled(&self) -> bool {
        self.webhook.base_url.is_some() && self.webhook.api_key.is_some()
    }

    /// Resolved store base URL; `url` wins over `cloud_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the cloud id cannot be decoded.
    pub fn store_endpoint(&self) -> Result<Option<String>> {
        if let Some(url) = &self.store.url {
            return Ok(Some(url.trim_end_matches('/').to_owned()));
        }
        self.store.cloud_id.as_deref().map(decode_cloud_id).transpose()
    }

    fn apply_env(&mut self) -> Result<()> {
        overlay(&mut self.store.url, "ELASTIC_URL");
        overlay(&mut self.store.cloud_id, "ELASTIC_CLOUD_ID");
        overlay(&mut self.store.api_key, "ELASTIC_API_KEY");
        if let Some(index) = env_value("ELASTIC_INCIDENTS_INDEX") {
            self.store.incidents_index = index;
        }

        overlay(&mut self.webhook.base_url, "WEBHOOK_BASE_URL");
        overlay(&mut self.webhook.api_key, "WEBHOOK_API_KEY");
        if let Some(route) = env_value("WEBHOOK_ROUTE") {
            self.webhook.route = route;
        }

        if let Some(raw) = env_value("REQUEST_TIMEOUT_SECONDS") {
            self.request_timeout_seconds = raw.parse().map_err(|err| {
                AppError::Config(format!("REQUEST_TIMEOUT_SECONDS invalid: {err}"))
            })?;
        }
        if let Some(raw) = env_value("HTTP_PORT") {
            self.http_port = raw
                .parse()
                .map_err(|err| AppError::Config(format!("HTTP_PORT invalid: {err}")))?;
        }

        debug!(
            store_enabled = self.store_enabled(),
            webhook_enabled = self.webhook_enabled(),
            "environment overlay applied"
        );
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.request_timeout_seconds == 0 {
            return Err(AppError::Config(
                "request_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.store.incidents_index.trim().is_empty() {
            return Err(AppError::Config("incidents_index must not be empty".into()));
        }

        self.store_endpoint()?;
        Ok(())
    }

    /// Treat blank TOML strings as absent, like blank env vars.
    fn normalize(&mut self) {
        for slot in [
            &mut self.store.url,
            &mut self.store.cloud_id,
            &mut self.webhook.base_url,
        ] {
            if slot.as_deref().is_some_and(|value| value.trim().is_empty()) {
                *slot = None;
            }
        }
    }
}

/// Replace `slot` when `key` holds a non-empty value.
fn overlay(slot: &mut Option<String>, key: &str) {
    if let Some(value) = env_value(key) {
        *slot = Some(value);
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Decode an Elastic Cloud id (`name:base64(host$es_uuid$kibana_uuid)`).
///
/// # Errors
///
/// Returns `AppError::Config` if the id is not in the expected shape.
pub fn decode_cloud_id(cloud_id: &str) -> Result<String> {
    let invalid = |detail: &str| AppError::Config(format!("invalid cloud_id: {detail}"));

    let (_, encoded) = cloud_id
        .rsplit_once(':')
        .ok_or_else(|| invalid("missing ':' separator"))?;
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|err| invalid(&err.to_string()))?;
    let decoded = String::from_utf8(decoded).map_err(|err| invalid(&err.to_string()))?;

    let mut parts = decoded.split('$');
    let host = parts.next().filter(|h| !h.is_empty());
    let es_uuid = parts.next().filter(|u| !u.is_empty());
    let (Some(host), Some(es_uuid)) = (host, es_uuid) else {
        return Err(invalid("expected host$es_uuid"));
    };

    let (domain, port) = match host.split_once(':') {
        Some((domain, port)) => (domain, format!(":{port}")),
        None => (host, String::new()),
    };
    Ok(format!("https://{es_uuid}.{domain}{port}"))
}
