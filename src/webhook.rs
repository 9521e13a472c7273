//! Best-effort relay of each run to the workflow-execution webhook.
//!
//! One POST per run. Every outcome, including configuration problems and
//! transport failures, comes back as a [`DispatchReport`] tagged with the
//! configured route.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use url::Url;

use crate::config::Settings;
use crate::models::incident::IncidentInput;
use crate::models::report::{
    DispatchFailure, DispatchReport, DispatchSuccess, WebhookDelivery, REASON_INVALID_BASE_URL,
};
use crate::models::run::{IncidentRunResult, WorkflowView};
use crate::{AppError, Result};

/// Maximum characters of a remote error body kept in a report.
pub const ERROR_BODY_LIMIT: usize = 500;

/// Marker opening `error_body` when the error response could not be read.
pub const UNREADABLE_BODY_PREFIX: &str = "<unreadable: ";

/// Request body sent to the webhook.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    incident: &'a IncidentInput,
    workflow: WorkflowView<'a>,
}

/// Posts incident runs to the configured workflow endpoint.
pub struct WebhookDispatcher {
    http: Client,
    base_url: Option<String>,
    api_key: Option<String>,
    route: String,
    timeout_seconds: u64,
}

impl WebhookDispatcher {
    /// Build the dispatcher from settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Webhook` if the HTTP client cannot be built.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()
            .map_err(|err| AppError::Webhook(format!("failed to build client: {err}")))?;

        let enabled = settings.webhook_enabled();
        if !enabled {
            info!("webhook not configured; dispatch will be skipped");
        }

        Ok(Self {
            http,
            base_url: settings.webhook.base_url.clone().filter(|_| enabled),
            api_key: settings.webhook.api_key.clone().filter(|_| enabled),
            route: settings.webhook.route.clone(),
            timeout_seconds: settings.request_timeout_seconds,
        })
    }

    /// Whether both a base URL and a credential are configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some()
    }

    /// Configured route, as echoed in every report.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Relay one run. Never fails; see the report for the outcome.
    pub async fn dispatch(
        &self,
        incident: &IncidentInput,
        result: &IncidentRunResult,
    ) -> DispatchReport {
        let report = match (&self.base_url, &self.api_key) {
            (Some(base_url), Some(api_key)) => {
                let span = info_span!("webhook_dispatch", incident_id = %result.incident_id);
                self.deliver(base_url, api_key, incident, result)
                    .instrument(span)
                    .await
            }
            _ => DispatchReport::not_configured(),
        };
        report.with_integration_path(self.route.clone())
    }

    async fn deliver(
        &self,
        base_url: &str,
        api_key: &str,
        incident: &IncidentInput,
        result: &IncidentRunResult,
    ) -> DispatchReport {
        let Some(endpoint) = build_endpoint(base_url, &self.route) else {
            warn!("webhook base URL is not an http(s) URL with a host");
            return DispatchReport::error(DispatchFailure::invalid_configuration(
                REASON_INVALID_BASE_URL,
            ));
        };

        let payload = WebhookPayload {
            incident,
            workflow: result.workflow(),
        };
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(err) => {
                return DispatchReport::error(DispatchFailure::unexpected(
                    Some(endpoint),
                    format!("failed to serialize payload: {err}"),
                ));
            }
        };
        let payload_bytes = body.len();

        let sent = self
            .http
            .post(&endpoint)
            .bearer_auth(api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(err) if err.is_connect() || err.is_timeout() || err.is_request() => {
                warn!(%endpoint, %err, "webhook unreachable");
                return DispatchReport::error(DispatchFailure::connection(
                    endpoint,
                    &err.to_string(),
                ));
            }
            Err(err) => {
                warn!(%endpoint, %err, "webhook dispatch failed");
                return DispatchReport::error(DispatchFailure::unexpected(
                    Some(endpoint),
                    err.to_string(),
                ));
            }
        };

        let status = response.status();
        if status.is_success() {
            info!(%endpoint, status = status.as_u16(), payload_bytes, "webhook accepted run");
            return DispatchReport::ok(DispatchSuccess::Webhook(WebhookDelivery {
                endpoint,
                response_status: status.as_u16(),
                timeout_seconds: self.timeout_seconds,
                payload_bytes,
            }));
        }

        let reason = status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_owned();
        let error_body = match response.text().await {
            Ok(text) if text.is_empty() => None,
            Ok(text) => Some(truncate_body(&text)),
            Err(err) => {
                warn!(%endpoint, %err, "webhook error body unreadable");
                Some(format!("{UNREADABLE_BODY_PREFIX}{err}>"))
            }
        };
        warn!(%endpoint, status = status.as_u16(), %reason, "webhook rejected run");
        DispatchReport::error(DispatchFailure::http(
            endpoint,
            status.as_u16(),
            reason,
            error_body,
        ))
    }
}

/// Join `base_url` and `route`, or `None` if the base is not a usable
/// http(s) URL with a host.
#[must_use]
pub fn build_endpoint(base_url: &str, route: &str) -> Option<String> {
    let parsed = Url::parse(base_url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return None;
    }

    let base = base_url.trim_end_matches('/');
    let route = if route.starts_with('/') {
        route.to_owned()
    } else {
        format!("/{route}")
    };
    Some(format!("{base}{route}"))
}

/// Keep at most [`ERROR_BODY_LIMIT`] characters, marking the cut with `...`.
#[must_use]
pub fn truncate_body(body: &str) -> String {
    if body.chars().count() <= ERROR_BODY_LIMIT {
        return body.to_owned();
    }
    let mut truncated: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    truncated.push_str("...");
    truncated
}
