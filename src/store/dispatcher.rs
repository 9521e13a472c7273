//! Phase-tagged call sequence against the store.
//!
//! Phases run strictly in [`StorePhase::SEQUENCE`] order. The first failure
//! ends the sequence and is reported with the name of the failing phase;
//! nothing after it is attempted.

use std::sync::Arc;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{info, info_span, warn, Instrument};

use super::{
    incident_count_query, incident_mappings, recent_search_body, ElasticStoreClient, StoreClient,
};
use crate::config::Settings;
use crate::models::incident::IncidentInput;
use crate::models::report::{
    CreateIndexSummary, DispatchFailure, DispatchReport, DispatchSuccess, IndexDocumentSummary,
    QuerySummary, SearchSummary, StorePhase, StoreSummary,
};
use crate::models::run::IncidentRunResult;
use crate::{AppError, Result};

/// Error text when the liveness probe answers but reports unhealthy.
pub const PING_FAILED: &str = "store_ping_failed";

/// Records each run in the store and reads back recent history.
pub struct StoreDispatcher {
    index: String,
    client: Option<Arc<dyn StoreClient>>,
}

impl StoreDispatcher {
    /// Build the dispatcher, with an Elasticsearch client when enabled.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the endpoint cannot be resolved or the
    /// HTTP client cannot be built.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        if !settings.store_enabled() {
            info!("store not configured; dispatch will be skipped");
            return Ok(Self::disabled(&settings.store.incidents_index));
        }

        let endpoint = settings
            .store_endpoint()?
            .ok_or_else(|| AppError::Config("store endpoint missing".into()))?;
        let api_key = settings.store.api_key.clone().unwrap_or_default();
        let client = ElasticStoreClient::new(&endpoint, api_key, settings.request_timeout_seconds)?;
        info!(endpoint = client.base_url(), "store client ready");

        Ok(Self::new(settings, Arc::new(client)))
    }

    /// Wrap an existing client. The client is dropped unless the settings
    /// enable the store, so a disabled dispatcher never touches it.
    #[must_use]
    pub fn new(settings: &Settings, client: Arc<dyn StoreClient>) -> Self {
        Self {
            index: settings.store.incidents_index.clone(),
            client: settings.store_enabled().then_some(client),
        }
    }

    /// A dispatcher that always skips.
    #[must_use]
    pub fn disabled(index: &str) -> Self {
        Self {
            index: index.to_owned(),
            client: None,
        }
    }

    /// Whether a client is attached.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Index name used by every phase.
    #[must_use]
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Run the five phases for one incident run.
    ///
    /// Never fails: the outcome, including the failing phase, is the report.
    pub async fn record_and_analyze(
        &self,
        incident: &IncidentInput,
        result: &IncidentRunResult,
    ) -> DispatchReport {
        let Some(client) = self.client.as_deref() else {
            return DispatchReport::not_configured();
        };

        let span = info_span!(
            "store_dispatch",
            incident_id = %result.incident_id,
            index = %self.index
        );
        async move {
            let started = Instant::now();
            match self.run_phases(client, incident, result, started).await {
                Ok(summary) => {
                    info!(
                        hits = summary.search.hit_count,
                        duration_ms = summary.duration_ms,
                        "store dispatch complete"
                    );
                    DispatchReport::ok(DispatchSuccess::Store(summary))
                }
                Err(failure) => {
                    warn!(
                        phase = ?failure.phase,
                        error = failure.error.as_deref().unwrap_or_default(),
                        "store dispatch failed"
                    );
                    DispatchReport::error(failure)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_phases(
        &self,
        client: &dyn StoreClient,
        incident: &IncidentInput,
        result: &IncidentRunResult,
        started: Instant,
    ) -> std::result::Result<StoreSummary, DispatchFailure> {
        // ── ping ────────────────────────────────────────────
        let alive = client
            .ping()
            .await
            .map_err(failed_at(StorePhase::Ping, started))?;
        if !alive {
            return Err(DispatchFailure::phase(
                StorePhase::Ping,
                PING_FAILED.into(),
                elapsed_ms(started),
            ));
        }

        // ── create_index ────────────────────────────────────
        let mappings = incident_mappings();
        let created = client
            .create_index(&self.index, &mappings)
            .await
            .map_err(failed_at(StorePhase::CreateIndex, started))?;

        // ── index_document ──────────────────────────────────
        let document = incident_document(incident, result);
        let indexed = client
            .index_document(&self.index, &result.incident_id, &document)
            .await
            .map_err(failed_at(StorePhase::IndexDocument, started))?;

        // ── search_recent ───────────────────────────────────
        let search_body = recent_search_body(&incident.service);
        let found = client
            .search(&self.index, &search_body)
            .await
            .map_err(failed_at(StorePhase::SearchRecent, started))?;

        // ── run_query ───────────────────────────────────────
        let query = incident_count_query(&self.index);
        let params = [
            Value::from(incident.service.as_str()),
            Value::from(incident.severity.as_str()),
        ];
        let counted = client
            .query(&query, &params)
            .await
            .map_err(failed_at(StorePhase::RunQuery, started))?;

        Ok(StoreSummary {
            index: self.index.clone(),
            duration_ms: elapsed_ms(started),
            create_result: CreateIndexSummary {
                acknowledged: created.get("acknowledged").and_then(Value::as_bool),
                index: created
                    .get("index")
                    .and_then(Value::as_str)
                    .unwrap_or(&self.index)
                    .to_owned(),
            },
            index_result: IndexDocumentSummary {
                result: string_field(&indexed, "result"),
                id: string_field(&indexed, "_id"),
            },
            search: summarize_hits(&found),
            query: QuerySummary {
                query,
                columns: array_field(&counted, "columns"),
                values: array_field(&counted, "values"),
            },
        })
    }
}

/// Document written for one run.
fn incident_document(incident: &IncidentInput, result: &IncidentRunResult) -> Value {
    json!({
        "incident_id": result.incident_id,
        "service": incident.service,
        "severity": incident.severity,
        "summary": incident.summary,
        "status": result.status,
        "signals": incident.signals,
        "recommendation": result.recommendation,
        "stakeholder_update": result.stakeholder_update,
        "created_at": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

fn summarize_hits(body: &Value) -> SearchSummary {
    let hits = body
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let latest_incident_ids = hits
        .iter()
        .filter_map(|hit| hit.pointer("/_source/incident_id").and_then(Value::as_str))
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .collect();

    SearchSummary {
        hit_count: hits.len(),
        latest_incident_ids,
    }
}

fn string_field(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn array_field(body: &Value, key: &str) -> Vec<Value> {
    body.get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn failed_at(phase: StorePhase, started: Instant) -> impl FnOnce(AppError) -> DispatchFailure {
    move |err| DispatchFailure::phase(phase, err.to_string(), elapsed_ms(started))
}

/// Milliseconds since `started`, rounded to two decimals.
fn elapsed_ms(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0
}
