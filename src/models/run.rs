//! Composed result of one incident run.

use serde::Serialize;

use super::incident::Severity;
use super::report::DispatchReport;
use super::step::{AgentOutput, AgentStep, RunbookAction};

/// Incident lifecycle status reported to the caller.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Reported but not yet worked. No current rule produces it.
    Open,
    /// Elevated incident still under active investigation.
    Investigating,
    /// Remediation is expected to resolve the incident.
    Mitigated,
}

/// Pipeline output plus the reports attached by both dispatchers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IncidentRunResult {
    /// Fresh identifier for this run; never derived from input.
    pub incident_id: String,
    /// Affected service, echoed from the input.
    pub service: String,
    /// Reported severity, echoed from the input.
    pub severity: Severity,
    /// Lifecycle status derived from severity.
    pub status: RunStatus,
    /// Exactly four steps: triage, diagnosis, remediation, communication.
    pub timeline: Vec<AgentStep>,
    /// Operator-facing next step naming the runbook action.
    pub recommendation: String,
    /// Same text as the communication stage message.
    pub stakeholder_update: String,
    /// Store dispatch outcome, attached after the pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_report: Option<DispatchReport>,
    /// Webhook dispatch outcome, attached after the pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_report: Option<DispatchReport>,
}

impl IncidentRunResult {
    /// Runbook action chosen by the remediation stage.
    #[must_use]
    pub fn runbook_action(&self) -> Option<RunbookAction> {
        self.timeline
            .iter()
            .find_map(|step| step.output.runbook_action())
    }

    /// Output of the stage at `index`, if present.
    #[must_use]
    pub fn output_at(&self, index: usize) -> Option<&AgentOutput> {
        self.timeline.get(index).map(|step| &step.output)
    }

    /// Borrowed view of the pipeline fields, without dispatch reports.
    #[must_use]
    pub fn workflow(&self) -> WorkflowView<'_> {
        WorkflowView {
            incident_id: &self.incident_id,
            service: &self.service,
            severity: self.severity,
            status: self.status,
            timeline: &self.timeline,
            recommendation: &self.recommendation,
            stakeholder_update: &self.stakeholder_update,
        }
    }
}

/// Pipeline fields of a run, as relayed to the workflow webhook.
#[derive(Debug, Clone, Copy, Serialize)]
#[allow(missing_docs)]
pub struct WorkflowView<'a> {
    pub incident_id: &'a str,
    pub service: &'a str,
    pub severity: Severity,
    pub status: RunStatus,
    pub timeline: &'a [AgentStep],
    pub recommendation: &'a str,
    pub stakeholder_update: &'a str,
}
