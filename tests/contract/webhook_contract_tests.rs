//! Contract tests for the workflow webhook relay.
//!
//! Each test runs a local receiver on an ephemeral port and checks the
//! report produced for one dispatch outcome.

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::Value;

use incident_commander::models::report::{DispatchStatus, FailureKind};
use incident_commander::models::DispatchReport;
use incident_commander::pipeline;
use incident_commander::webhook::{WebhookDispatcher, ERROR_BODY_LIMIT, UNREADABLE_BODY_PREFIX};
use incident_commander::Settings;

use super::test_helpers::{
    checkout_incident, closed_base_url, spawn_receiver, spawn_stalled_receiver, webhook_settings,
    WEBHOOK_ROUTE,
};

async fn dispatch(settings: &Settings) -> DispatchReport {
    let incident = checkout_incident();
    let result = pipeline::run(&incident);
    let dispatcher = WebhookDispatcher::from_settings(settings).expect("dispatcher");
    dispatcher.dispatch(&incident, &result).await
}

// ── Configuration ───────────────────────────────────────────

#[tokio::test]
async fn unconfigured_webhook_is_skipped_with_route() {
    let report = dispatch(&Settings::default()).await;

    assert_eq!(report.status(), DispatchStatus::Skipped);
    assert!(!report.enabled);
    assert_eq!(report.integration_path.as_deref(), Some(WEBHOOK_ROUTE));
}

#[tokio::test]
async fn missing_credential_is_skipped() {
    let receiver = spawn_receiver(StatusCode::OK, "{}", Duration::ZERO).await;
    let mut settings = webhook_settings(&receiver.base_url, 5);
    settings.webhook.api_key = None;

    let report = dispatch(&settings).await;

    assert_eq!(report.status(), DispatchStatus::Skipped);
    assert_eq!(receiver.hits(), 0);
}

#[tokio::test]
async fn invalid_base_url_is_reported_without_request() {
    let receiver = spawn_receiver(StatusCode::OK, "{}", Duration::ZERO).await;

    let host_port = receiver
        .base_url
        .strip_prefix("http://")
        .expect("http receiver");
    let bases = [
        format!("ftp://{host_port}"),
        format!("ws://{host_port}"),
        host_port.to_owned(),
        "not-a-url".to_owned(),
    ];

    for base in &bases {
        let report = dispatch(&webhook_settings(base, 5)).await;

        assert!(report.enabled, "{base}");
        assert_eq!(report.status(), DispatchStatus::Error, "{base}");
        let failure = report.failure().expect("failure details");
        assert_eq!(failure.kind, FailureKind::InvalidConfiguration);
        assert_eq!(failure.reason.as_deref(), Some("invalid_base_url"));
        assert_eq!(report.integration_path.as_deref(), Some(WEBHOOK_ROUTE));
    }
    assert_eq!(receiver.hits(), 0);
}

// ── Success ─────────────────────────────────────────────────

#[tokio::test]
async fn accepted_run_reports_delivery() {
    let receiver = spawn_receiver(StatusCode::OK, r#"{"accepted":true}"#, Duration::ZERO).await;
    let report = dispatch(&webhook_settings(&receiver.base_url, 7)).await;

    assert_eq!(report.status(), DispatchStatus::Ok);
    let delivery = report.webhook_delivery().expect("delivery");
    assert_eq!(delivery.endpoint, format!("{}{WEBHOOK_ROUTE}", receiver.base_url));
    assert_eq!(delivery.response_status, 200);
    assert_eq!(delivery.timeout_seconds, 7);
    assert!(delivery.payload_bytes > 0);
    assert_eq!(report.integration_path.as_deref(), Some(WEBHOOK_ROUTE));
    assert_eq!(receiver.hits(), 1);
}

#[tokio::test]
async fn trailing_slash_on_base_url_is_ignored() {
    let receiver = spawn_receiver(StatusCode::ACCEPTED, "", Duration::ZERO).await;
    let base = format!("{}/", receiver.base_url);

    let report = dispatch(&webhook_settings(&base, 5)).await;

    assert_eq!(report.status(), DispatchStatus::Ok);
    assert_eq!(report.webhook_delivery().unwrap().response_status, 202);
}

#[tokio::test]
async fn request_carries_bearer_token_and_workflow_payload() {
    let receiver = spawn_receiver(StatusCode::OK, "{}", Duration::ZERO).await;
    let report = dispatch(&webhook_settings(&receiver.base_url, 5)).await;
    assert_eq!(report.status(), DispatchStatus::Ok);

    let captured = receiver.captured();
    assert_eq!(captured.len(), 1);
    let request = &captured[0];
    assert_eq!(
        request.headers["authorization"].to_str().unwrap(),
        "Bearer token"
    );
    assert_eq!(
        request.headers["content-type"].to_str().unwrap(),
        "application/json"
    );

    let body: Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body["incident"]["service"], "checkout-api");
    assert_eq!(body["incident"]["recent_deploy_sha"], "abc1234");
    let workflow = &body["workflow"];
    assert_eq!(workflow["status"], "investigating");
    assert_eq!(workflow["timeline"].as_array().unwrap().len(), 4);
    assert!(workflow.get("store_report").is_none());
    assert!(workflow.get("webhook_report").is_none());

    let delivery = report.webhook_delivery().unwrap();
    assert_eq!(delivery.payload_bytes, request.body.len());
}

// ── Failure ─────────────────────────────────────────────────

#[tokio::test]
async fn rejected_run_reports_status_and_truncated_body() {
    let long_body = "x".repeat(650);
    let receiver = spawn_receiver(StatusCode::BAD_GATEWAY, &long_body, Duration::ZERO).await;

    let report = dispatch(&webhook_settings(&receiver.base_url, 5)).await;

    assert_eq!(report.status(), DispatchStatus::Error);
    let failure = report.failure().expect("failure details");
    assert_eq!(failure.kind, FailureKind::HttpError);
    assert_eq!(failure.response_status, Some(502));
    assert_eq!(failure.error.as_deref(), Some("Bad Gateway"));
    let body = failure.error_body.as_deref().expect("error body");
    assert_eq!(body.chars().count(), ERROR_BODY_LIMIT + 3);
    assert!(body.ends_with("..."));
    assert_eq!(report.integration_path.as_deref(), Some(WEBHOOK_ROUTE));
}

#[tokio::test]
async fn short_error_body_is_kept_verbatim() {
    let receiver =
        spawn_receiver(StatusCode::UNAUTHORIZED, r#"{"error":"bad token"}"#, Duration::ZERO).await;

    let report = dispatch(&webhook_settings(&receiver.base_url, 5)).await;

    let failure = report.failure().expect("failure details");
    assert_eq!(failure.response_status, Some(401));
    assert_eq!(failure.error_body.as_deref(), Some(r#"{"error":"bad token"}"#));
}

#[tokio::test]
async fn empty_error_body_is_omitted() {
    let receiver = spawn_receiver(StatusCode::INTERNAL_SERVER_ERROR, "", Duration::ZERO).await;

    let report = dispatch(&webhook_settings(&receiver.base_url, 5)).await;

    let failure = report.failure().expect("failure details");
    assert_eq!(failure.response_status, Some(500));
    assert!(failure.error_body.is_none());

    let value = serde_json::to_value(&report).unwrap();
    assert!(value.get("error_body").is_none());
}

#[tokio::test]
async fn unreadable_error_body_is_marked_not_dropped() {
    let base = spawn_stalled_receiver().await;

    let report = dispatch(&webhook_settings(&base, 1)).await;

    assert_eq!(report.status(), DispatchStatus::Error);
    let failure = report.failure().expect("failure details");
    assert_eq!(failure.kind, FailureKind::HttpError);
    assert_eq!(failure.response_status, Some(500));
    let body = failure.error_body.as_deref().expect("error body marker");
    assert!(body.starts_with(UNREADABLE_BODY_PREFIX), "{body}");
    assert!(body.ends_with('>'));
}

#[tokio::test]
async fn refused_connection_reports_connection_error() {
    let base = closed_base_url().await;

    let report = dispatch(&webhook_settings(&base, 2)).await;

    assert_eq!(report.status(), DispatchStatus::Error);
    let failure = report.failure().expect("failure details");
    assert_eq!(failure.kind, FailureKind::ConnectionError);
    assert!(failure.response_status.is_none());
    assert!(failure
        .error
        .as_deref()
        .is_some_and(|err| err.starts_with("connection_error")));
    assert_eq!(failure.endpoint.as_deref(), Some(&*format!("{base}{WEBHOOK_ROUTE}")));
}

#[tokio::test]
async fn slow_receiver_times_out_as_connection_error() {
    let receiver = spawn_receiver(StatusCode::OK, "{}", Duration::from_secs(3)).await;

    let report = dispatch(&webhook_settings(&receiver.base_url, 1)).await;

    let failure = report.failure().expect("failure details");
    assert_eq!(failure.kind, FailureKind::ConnectionError);
    assert!(failure.response_status.is_none());
}
