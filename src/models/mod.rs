//! Domain model module declarations.

pub mod incident;
pub mod report;
pub mod run;
pub mod step;

pub use incident::{IncidentInput, Severity};
pub use report::{DispatchReport, DispatchStatus, StorePhase};
pub use run::{IncidentRunResult, RunStatus};
pub use step::{AgentOutput, AgentStep};
