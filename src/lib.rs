#![forbid(unsafe_code)]

//! Deterministic incident triage with best-effort store and webhook relay.

pub mod config;
pub mod errors;
pub mod http;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod store;
pub mod webhook;

pub use config::Settings;
pub use errors::{AppError, Result};
pub use orchestrator::IncidentOrchestrator;
