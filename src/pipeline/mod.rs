//! Deterministic four-stage decision pipeline.
//!
//! Stages run in the fixed order of [`stages::STAGES`], each one seeing the
//! incident and the step emitted just before it. The pipeline performs no
//! I/O and cannot fail: every branch is total over the validated input.

pub mod stages;

use uuid::Uuid;

use crate::models::incident::IncidentInput;
use crate::models::run::{IncidentRunResult, RunStatus};
use crate::models::step::AgentStep;

/// Run every stage and compose the result. Dispatch reports are left empty.
#[must_use]
pub fn run(incident: &IncidentInput) -> IncidentRunResult {
    let mut timeline: Vec<AgentStep> = Vec::with_capacity(stages::STAGES.len());
    for stage in stages::STAGES {
        let step = stage(incident, timeline.last());
        timeline.push(step);
    }

    let status = if incident.severity.is_elevated() {
        RunStatus::Investigating
    } else {
        RunStatus::Mitigated
    };

    let stakeholder_update = timeline
        .iter()
        .find_map(|step| step.output.message())
        .unwrap_or_default()
        .to_owned();

    let mut result = IncidentRunResult {
        incident_id: Uuid::new_v4().to_string(),
        service: incident.service.clone(),
        severity: incident.severity,
        status,
        timeline,
        recommendation: String::new(),
        stakeholder_update,
        store_report: None,
        webhook_report: None,
    };
    let action = result
        .runbook_action()
        .map_or_else(|| "none".to_owned(), |action| action.to_string());
    result.recommendation =
        format!("Execute {action} and validate latency/error recovery over 10 minutes.");
    result
}
