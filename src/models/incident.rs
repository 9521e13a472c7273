//! Incident report submitted for triage.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

const SERVICE_LEN: (usize, usize) = (2, 80);
const SUMMARY_LEN: (usize, usize) = (5, 240);
const DEPLOY_SHA_MAX_LEN: usize = 40;

/// Reported incident severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Minor degradation.
    Low,
    /// Noticeable degradation without customer-facing outage.
    Medium,
    /// Customer-facing degradation.
    High,
    /// Full outage or data-loss risk.
    Critical,
}

impl Severity {
    /// All severities in ascending order.
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    /// Wire name of the severity.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Whether the severity calls for the aggressive playbook (`high`, `critical`).
    #[must_use]
    pub fn is_elevated(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reported service-health event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct IncidentInput {
    /// Affected service name.
    pub service: String,
    /// Reported severity.
    pub severity: Severity,
    /// Free-form description of the symptom.
    pub summary: String,
    /// Observed signals, in reporting order.
    #[serde(default)]
    pub signals: Vec<String>,
    /// Commit SHA of the most recent deploy, if one is suspected.
    #[serde(default)]
    pub recent_deploy_sha: Option<String>,
}

impl IncidentInput {
    /// Check field length bounds (counted in characters).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        check_len("service", &self.service, SERVICE_LEN)?;
        check_len("summary", &self.summary, SUMMARY_LEN)?;

        if let Some(sha) = &self.recent_deploy_sha {
            if sha.chars().count() > DEPLOY_SHA_MAX_LEN {
                return Err(AppError::Validation(format!(
                    "recent_deploy_sha must be at most {DEPLOY_SHA_MAX_LEN} characters"
                )));
            }
        }

        Ok(())
    }

    /// Whether a recent deploy was reported alongside the incident.
    #[must_use]
    pub fn has_recent_deploy(&self) -> bool {
        self.recent_deploy_sha
            .as_deref()
            .is_some_and(|sha| !sha.is_empty())
    }
}

fn check_len(field: &str, value: &str, (min, max): (usize, usize)) -> Result<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::Validation(format!(
            "{field} must be between {min} and {max} characters, got {len}"
        )));
    }
    Ok(())
}
