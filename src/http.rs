//! HTTP front door.
//!
//! `GET /health` answers `{"status":"ok"}`; `POST /incidents/run` takes an
//! incident report and returns the composed run result. Integration
//! trouble never fails the request; it only shows up in the attached
//! dispatch reports.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::incident::IncidentInput;
use crate::orchestrator::IncidentOrchestrator;
use crate::{AppError, Result};

/// Build the router around a shared orchestrator.
pub fn router(orchestrator: Arc<IncidentOrchestrator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/incidents/run", post(run_incident))
        .with_state(orchestrator)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn run_incident(
    State(orchestrator): State<Arc<IncidentOrchestrator>>,
    payload: std::result::Result<Json<IncidentInput>, JsonRejection>,
) -> Response {
    let incident = match payload {
        Ok(Json(incident)) => incident,
        Err(rejection) => {
            warn!(%rejection, "incident body rejected");
            return validation_error(rejection.status(), &rejection.body_text());
        }
    };

    if let Err(err) = incident.validate() {
        warn!(%err, service = %incident.service, "incident rejected");
        return validation_error(StatusCode::UNPROCESSABLE_ENTITY, &err.to_string());
    }

    Json(orchestrator.run(incident).await).into_response()
}

fn validation_error(status: StatusCode, detail: &str) -> Response {
    (
        status,
        Json(json!({ "error": "validation_error", "detail": detail })),
    )
        .into_response()
}

/// Serve the front door on `0.0.0.0:{port}` until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Io` if the listener cannot bind or the server fails.
pub async fn serve(
    orchestrator: Arc<IncidentOrchestrator>,
    port: u16,
    ct: CancellationToken,
) -> Result<()> {
    let bind = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Io(format!("failed to bind {bind}: {err}")))?;
    serve_on(listener, orchestrator, ct).await
}

/// Serve the front door on an already-bound listener.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails.
pub async fn serve_on(
    listener: TcpListener,
    orchestrator: Arc<IncidentOrchestrator>,
    ct: CancellationToken,
) -> Result<()> {
    let local = listener.local_addr()?;
    info!(%local, "incident front door listening");

    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("server error: {err}")))?;

    info!("incident front door shut down");
    Ok(())
}
