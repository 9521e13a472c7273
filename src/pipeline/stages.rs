//! The four pipeline stages.
//!
//! Each stage is a pure function of the incident and the step emitted by
//! the stage immediately before it. Triage is first and receives `None`.

use crate::models::incident::IncidentInput;
use crate::models::step::{
    Agent, AgentOutput, AgentStep, CommunicationOutput, Confidence, DiagnosisOutput,
    RemediationOutput, Risk, RunbookAction, StepAction, Suspect, TriageOutput,
};

/// Hypothesis when triage suspects the latest deploy.
pub const HYPOTHESIS_REGRESSION: &str = "Regression introduced in recent deploy";
/// Hypothesis when triage suspects load.
pub const HYPOTHESIS_CAPACITY: &str = "Capacity saturation due to abnormal traffic";
/// Justification when no hypothesis reached remediation.
pub const JUSTIFICATION_FALLBACK: &str = "insufficient data";

/// Stakeholder channel for every update.
pub const UPDATE_CHANNEL: &str = "#incidents";
/// Minutes until the next stakeholder update.
pub const NEXT_UPDATE_ETA_MIN: u32 = 15;

const LOG_QUERY: &str = "FROM logs-* | WHERE service == ? AND @timestamp > NOW()-15m";
const METRICS_QUERY: &str = "FROM metrics-* | STATS p95=percentile(latency_ms,95) BY service";

/// Transition function of a single stage.
pub type Stage = fn(&IncidentInput, Option<&AgentStep>) -> AgentStep;

/// Stages in execution order.
pub const STAGES: [Stage; 4] = [triage, diagnose, remediate, communicate];

/// Classify confidence, suspects and priority.
#[must_use]
pub fn triage(incident: &IncidentInput, _previous: Option<&AgentStep>) -> AgentStep {
    let confidence = if incident.severity.is_elevated() {
        Confidence::High
    } else {
        Confidence::Medium
    };
    let suspect = if incident.has_recent_deploy() {
        Suspect::RecentDeploy
    } else {
        Suspect::TrafficSpike
    };

    AgentStep {
        agent: Agent::Triage,
        action: StepAction::ClassifyIncident,
        output: AgentOutput::Triage(TriageOutput {
            confidence,
            suspects: vec![suspect],
            priority: incident.severity,
        }),
    }
}

/// Turn triage suspects into a root-cause hypothesis and query plan.
#[must_use]
pub fn diagnose(incident: &IncidentInput, triage: Option<&AgentStep>) -> AgentStep {
    let deploy_suspected = triage
        .is_some_and(|step| step.output.suspects().contains(&Suspect::RecentDeploy));
    let hypothesis = if deploy_suspected {
        HYPOTHESIS_REGRESSION
    } else {
        HYPOTHESIS_CAPACITY
    };

    AgentStep {
        agent: Agent::Diagnosis,
        action: StepAction::GenerateRootCauseHypothesis,
        output: AgentOutput::Diagnosis(DiagnosisOutput {
            hypothesis: hypothesis.to_owned(),
            query_plan: vec![LOG_QUERY.to_owned(), METRICS_QUERY.to_owned()],
            signals_seen: incident.signals.clone(),
        }),
    }
}

/// Pick a runbook action by severity, justified by the hypothesis.
#[must_use]
pub fn remediate(incident: &IncidentInput, diagnosis: Option<&AgentStep>) -> AgentStep {
    let (runbook_action, risk) = if incident.severity.is_elevated() {
        (RunbookAction::RollbackLatestDeploy, Risk::Medium)
    } else {
        (RunbookAction::ScaleServiceReplicas, Risk::Low)
    };
    let justification = diagnosis
        .and_then(|step| step.output.hypothesis())
        .unwrap_or(JUSTIFICATION_FALLBACK);

    AgentStep {
        agent: Agent::Remediation,
        action: StepAction::ProposeRunbookAction,
        output: AgentOutput::Remediation(RemediationOutput {
            runbook_action,
            risk,
            justification: justification.to_owned(),
        }),
    }
}

/// Draft the stakeholder update naming the applied action.
#[must_use]
pub fn communicate(incident: &IncidentInput, remediation: Option<&AgentStep>) -> AgentStep {
    let action = remediation
        .and_then(|step| step.output.runbook_action())
        .map_or("none", RunbookAction::as_str);

    AgentStep {
        agent: Agent::Communication,
        action: StepAction::ComposeStakeholderUpdate,
        output: AgentOutput::Communication(CommunicationOutput {
            channel: UPDATE_CHANNEL.to_owned(),
            message: format!(
                "Investigating {}. Applied action: {action}.",
                incident.service
            ),
            next_update_eta_min: NEXT_UPDATE_ETA_MIN,
        }),
    }
}
