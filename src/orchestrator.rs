//! Composition of the pipeline with both dispatchers.

use tracing::{info, info_span, Instrument};

use crate::config::Settings;
use crate::models::incident::IncidentInput;
use crate::models::run::IncidentRunResult;
use crate::pipeline;
use crate::store::StoreDispatcher;
use crate::webhook::WebhookDispatcher;
use crate::Result;

/// Runs one incident end to end: pipeline, then both dispatches.
pub struct IncidentOrchestrator {
    store: StoreDispatcher,
    webhook: WebhookDispatcher,
}

impl IncidentOrchestrator {
    /// Assemble from pre-built dispatchers.
    #[must_use]
    pub fn new(store: StoreDispatcher, webhook: WebhookDispatcher) -> Self {
        Self { store, webhook }
    }

    /// Build both dispatchers from settings.
    ///
    /// # Errors
    ///
    /// Returns the first dispatcher construction error.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let store = StoreDispatcher::from_settings(settings)?;
        let webhook = WebhookDispatcher::from_settings(settings)?;
        info!(
            store_enabled = store.is_enabled(),
            index = store.index(),
            webhook_enabled = webhook.is_enabled(),
            route = webhook.route(),
            "incident orchestrator ready"
        );
        Ok(Self::new(store, webhook))
    }

    /// Run the pipeline and attach both dispatch reports.
    ///
    /// The dispatches run concurrently and independently; the returned
    /// result is always complete, whatever the collaborators did.
    pub async fn run(&self, incident: IncidentInput) -> IncidentRunResult {
        let mut result = pipeline::run(&incident);
        let span = info_span!(
            "incident_run",
            incident_id = %result.incident_id,
            service = %incident.service,
            severity = %incident.severity
        );

        let (store_report, webhook_report) = async {
            tokio::join!(
                self.store.record_and_analyze(&incident, &result),
                self.webhook.dispatch(&incident, &result),
            )
        }
        .instrument(span.clone())
        .await;

        span.in_scope(|| {
            info!(
                status = ?result.status,
                store = ?store_report.status(),
                webhook = ?webhook_report.status(),
                "incident run complete"
            );
        });

        result.store_report = Some(store_report);
        result.webhook_report = Some(webhook_report);
        result
    }
}
