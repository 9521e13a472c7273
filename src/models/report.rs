//! Outcome reports attached by the store and webhook dispatchers.
//!
//! Both collaborators share one report shape: a top-level `enabled` flag,
//! a `status` tag (`skipped`, `ok`, `error`) and status-specific fields.
//! Reports are plain data; a failed dispatch never becomes an `Err`.

use serde::Serialize;
use serde_json::Value;

/// Skip reason used when a collaborator lacks endpoint or credentials.
pub const REASON_NOT_CONFIGURED: &str = "not_configured";

/// Error reason used when the webhook base URL cannot be used.
pub const REASON_INVALID_BASE_URL: &str = "invalid_base_url";

/// Discriminant of [`DispatchOutcome`].
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    /// Collaborator disabled by configuration; nothing attempted.
    Skipped,
    /// Every step succeeded.
    Ok,
    /// A step failed; see [`DispatchFailure`].
    Error,
}

/// Named step of the store call sequence.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorePhase {
    /// Liveness check.
    Ping,
    /// Idempotent index creation.
    CreateIndex,
    /// Write of the run document.
    IndexDocument,
    /// Recent history for the same service.
    SearchRecent,
    /// Count aggregation by service and severity.
    RunQuery,
}

impl StorePhase {
    /// Phases in execution order.
    pub const SEQUENCE: [Self; 5] = [
        Self::Ping,
        Self::CreateIndex,
        Self::IndexDocument,
        Self::SearchRecent,
        Self::RunQuery,
    ];

    /// Wire name of the phase.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::CreateIndex => "create_index",
            Self::IndexDocument => "index_document",
            Self::SearchRecent => "search_recent",
            Self::RunQuery => "run_query",
        }
    }
}

/// Classification of a failed dispatch.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Collaborator configured with an unusable endpoint.
    InvalidConfiguration,
    /// A named store phase failed.
    PhaseError,
    /// Remote answered with a non-2xx status.
    HttpError,
    /// No response: refused, unreachable or timed out.
    ConnectionError,
    /// Anything else.
    UnexpectedError,
}

/// Details of a failed dispatch. Only the fields relevant to `kind` are set.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DispatchFailure {
    /// Failure classification.
    pub kind: FailureKind,
    /// Machine-readable cause of a configuration failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Store phase that failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<StorePhase>,
    /// Full URL that was called.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// HTTP status of a non-2xx answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status: Option<u16>,
    /// Human-readable error text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Remote error body, truncated; omitted when empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_body: Option<String>,
    /// Milliseconds from dispatch start to the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

impl DispatchFailure {
    fn of_kind(kind: FailureKind) -> Self {
        Self {
            kind,
            reason: None,
            phase: None,
            endpoint: None,
            response_status: None,
            error: None,
            error_body: None,
            duration_ms: None,
        }
    }

    /// Unusable collaborator configuration, detected before any call.
    #[must_use]
    pub fn invalid_configuration(reason: &str) -> Self {
        Self {
            reason: Some(reason.to_owned()),
            ..Self::of_kind(FailureKind::InvalidConfiguration)
        }
    }

    /// A store phase failed after `duration_ms` of the sequence.
    #[must_use]
    pub fn phase(phase: StorePhase, error: String, duration_ms: f64) -> Self {
        Self {
            phase: Some(phase),
            error: Some(error),
            duration_ms: Some(duration_ms),
            ..Self::of_kind(FailureKind::PhaseError)
        }
    }

    /// Remote answered with a non-2xx status.
    #[must_use]
    pub fn http(endpoint: String, status: u16, error: String, error_body: Option<String>) -> Self {
        Self {
            endpoint: Some(endpoint),
            response_status: Some(status),
            error: Some(error),
            error_body,
            ..Self::of_kind(FailureKind::HttpError)
        }
    }

    /// Transport-level failure without a response code.
    #[must_use]
    pub fn connection(endpoint: String, detail: &str) -> Self {
        Self {
            endpoint: Some(endpoint),
            error: Some(format!("connection_error: {detail}")),
            ..Self::of_kind(FailureKind::ConnectionError)
        }
    }

    /// Catch-all failure.
    #[must_use]
    pub fn unexpected(endpoint: Option<String>, error: String) -> Self {
        Self {
            endpoint,
            error: Some(error),
            ..Self::of_kind(FailureKind::UnexpectedError)
        }
    }
}

/// `create_index` response digest.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreateIndexSummary {
    /// `None` when the index already existed.
    pub acknowledged: Option<bool>,
    /// Index name answered by the store, or the configured one.
    pub index: String,
}

/// `index_document` response digest.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IndexDocumentSummary {
    /// `created` or `updated`.
    pub result: Option<String>,
    /// Document id echoed by the store.
    pub id: Option<String>,
}

/// `search_recent` response digest.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchSummary {
    /// Number of hits returned.
    pub hit_count: usize,
    /// Incident ids of the hits, newest first, skipping hits without one.
    pub latest_incident_ids: Vec<String>,
}

/// `run_query` response digest.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuerySummary {
    /// Query text sent to the store.
    pub query: String,
    /// Column descriptors as returned.
    pub columns: Vec<Value>,
    /// Result rows as returned.
    pub values: Vec<Value>,
}

/// Successful store sequence.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreSummary {
    /// Index every phase ran against.
    pub index: String,
    /// Milliseconds for the whole sequence.
    pub duration_ms: f64,
    /// `create_index` digest.
    pub create_result: CreateIndexSummary,
    /// `index_document` digest.
    pub index_result: IndexDocumentSummary,
    /// `search_recent` digest.
    pub search: SearchSummary,
    /// `run_query` digest.
    pub query: QuerySummary,
}

/// Successful webhook delivery.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WebhookDelivery {
    /// Full URL that accepted the run.
    pub endpoint: String,
    /// 2xx status answered.
    pub response_status: u16,
    /// Request timeout in effect.
    pub timeout_seconds: u64,
    /// Size of the serialized request body.
    pub payload_bytes: usize,
}

/// Collaborator-specific success payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum DispatchSuccess {
    /// Store sequence digest.
    Store(StoreSummary),
    /// Webhook delivery details.
    Webhook(WebhookDelivery),
}

/// Status-tagged body of a report.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Nothing attempted.
    Skipped {
        /// Why the dispatch was skipped.
        reason: String,
    },
    /// Dispatch succeeded.
    Ok(DispatchSuccess),
    /// Dispatch failed.
    Error(DispatchFailure),
}

/// Outcome of one best-effort dispatch.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DispatchReport {
    /// `false` only when the collaborator is not configured.
    pub enabled: bool,
    /// Status tag and status-specific fields.
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
    /// Configured webhook route; echoed on every webhook outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integration_path: Option<String>,
}

impl DispatchReport {
    /// Collaborator not configured; nothing was attempted.
    #[must_use]
    pub fn not_configured() -> Self {
        Self {
            enabled: false,
            outcome: DispatchOutcome::Skipped {
                reason: REASON_NOT_CONFIGURED.to_owned(),
            },
            integration_path: None,
        }
    }

    /// Every step succeeded.
    #[must_use]
    pub fn ok(success: DispatchSuccess) -> Self {
        Self {
            enabled: true,
            outcome: DispatchOutcome::Ok(success),
            integration_path: None,
        }
    }

    /// A step failed.
    #[must_use]
    pub fn error(failure: DispatchFailure) -> Self {
        Self {
            enabled: true,
            outcome: DispatchOutcome::Error(failure),
            integration_path: None,
        }
    }

    /// Tag the report with the configured webhook route.
    #[must_use]
    pub fn with_integration_path(mut self, path: impl Into<String>) -> Self {
        self.integration_path = Some(path.into());
        self
    }

    /// Status discriminant.
    #[must_use]
    pub fn status(&self) -> DispatchStatus {
        match self.outcome {
            DispatchOutcome::Skipped { .. } => DispatchStatus::Skipped,
            DispatchOutcome::Ok(_) => DispatchStatus::Ok,
            DispatchOutcome::Error(_) => DispatchStatus::Error,
        }
    }

    /// Failure details, if the dispatch failed.
    #[must_use]
    pub fn failure(&self) -> Option<&DispatchFailure> {
        match &self.outcome {
            DispatchOutcome::Error(failure) => Some(failure),
            _ => None,
        }
    }

    /// Store digest, if the store sequence succeeded.
    #[must_use]
    pub fn store_summary(&self) -> Option<&StoreSummary> {
        match &self.outcome {
            DispatchOutcome::Ok(DispatchSuccess::Store(summary)) => Some(summary),
            _ => None,
        }
    }

    /// Webhook delivery, if the webhook call succeeded.
    #[must_use]
    pub fn webhook_delivery(&self) -> Option<&WebhookDelivery> {
        match &self.outcome {
            DispatchOutcome::Ok(DispatchSuccess::Webhook(delivery)) => Some(delivery),
            _ => None,
        }
    }
}
