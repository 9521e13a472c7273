//! Timeline entries produced by the decision pipeline stages.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use super::incident::Severity;

/// Pipeline stage that produced a step.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Agent {
    /// Classifies the incident and names suspects.
    Triage,
    /// Forms a root-cause hypothesis.
    Diagnosis,
    /// Picks a runbook action.
    Remediation,
    /// Drafts the stakeholder update.
    Communication,
}

impl Agent {
    /// Stage order of every pipeline run.
    pub const ORDER: [Self; 4] = [
        Self::Triage,
        Self::Diagnosis,
        Self::Remediation,
        Self::Communication,
    ];
}

/// Symbolic action performed by a stage.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Triage output.
    ClassifyIncident,
    /// Diagnosis output.
    GenerateRootCauseHypothesis,
    /// Remediation output.
    ProposeRunbookAction,
    /// Communication output.
    ComposeStakeholderUpdate,
}

/// Triage confidence in its classification.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Low and medium severities.
    Medium,
    /// High and critical severities.
    High,
}

/// Likely trigger named by triage.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Suspect {
    /// A deploy SHA accompanied the report.
    RecentDeploy,
    /// No deploy; assume load.
    TrafficSpike,
}

/// Runbook action chosen by remediation.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunbookAction {
    /// Revert the most recent deploy.
    RollbackLatestDeploy,
    /// Add replicas to absorb load.
    ScaleServiceReplicas,
}

impl RunbookAction {
    /// Wire name of the action.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RollbackLatestDeploy => "rollback_latest_deploy",
            Self::ScaleServiceReplicas => "scale_service_replicas",
        }
    }
}

impl Display for RunbookAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational risk of a runbook action.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Risk {
    /// Safe to apply without review.
    Low,
    /// Needs an operator watching.
    Medium,
}

/// Output of the triage stage.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TriageOutput {
    /// Confidence in the classification.
    pub confidence: Confidence,
    /// Likely triggers, most likely first.
    pub suspects: Vec<Suspect>,
    /// Echo of the reported severity.
    pub priority: Severity,
}

/// Output of the diagnosis stage.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DiagnosisOutput {
    /// Root-cause hypothesis.
    pub hypothesis: String,
    /// ES|QL queries an operator would run to confirm it.
    pub query_plan: Vec<String>,
    /// Incident signals, verbatim.
    pub signals_seen: Vec<String>,
}

/// Output of the remediation stage.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RemediationOutput {
    /// Chosen action.
    pub runbook_action: RunbookAction,
    /// Risk of applying it.
    pub risk: Risk,
    /// Diagnosis hypothesis backing the choice.
    pub justification: String,
}

/// Output of the communication stage.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommunicationOutput {
    /// Destination channel.
    pub channel: String,
    /// Update text.
    pub message: String,
    /// Minutes until the next update.
    pub next_update_eta_min: u32,
}

/// Per-stage output, serialized as a plain string-keyed map.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AgentOutput {
    /// Output of [`Agent::Triage`].
    Triage(TriageOutput),
    /// Output of [`Agent::Diagnosis`].
    Diagnosis(DiagnosisOutput),
    /// Output of [`Agent::Remediation`].
    Remediation(RemediationOutput),
    /// Output of [`Agent::Communication`].
    Communication(CommunicationOutput),
}

impl AgentOutput {
    /// Triage suspects, empty for any other stage.
    #[must_use]
    pub fn suspects(&self) -> &[Suspect] {
        match self {
            Self::Triage(out) => &out.suspects,
            _ => &[],
        }
    }

    /// Diagnosis hypothesis, if this is a diagnosis output.
    #[must_use]
    pub fn hypothesis(&self) -> Option<&str> {
        match self {
            Self::Diagnosis(out) => Some(&out.hypothesis),
            _ => None,
        }
    }

    /// Chosen runbook action, if this is a remediation output.
    #[must_use]
    pub fn runbook_action(&self) -> Option<RunbookAction> {
        match self {
            Self::Remediation(out) => Some(out.runbook_action),
            _ => None,
        }
    }

    /// Stakeholder message, if this is a communication output.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Communication(out) => Some(&out.message),
            _ => None,
        }
    }
}

/// One entry in the incident timeline.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AgentStep {
    /// Stage that produced the step.
    pub agent: Agent,
    /// Action the stage performed.
    pub action: StepAction,
    /// Stage-specific output.
    pub output: AgentOutput,
}
