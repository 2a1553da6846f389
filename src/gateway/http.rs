//! HTTP ingress: the aggregator webhook and a liveness probe, built on axum
//! the same way the agent this gateway descends from wires its own message
//! gateway — a shared `Arc<AppState>`, a small validation function ahead of
//! the handler, and graceful shutdown on SIGINT/SIGTERM.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::engine::{self, AppState, TurnInput};
use crate::error::EngineError;
use crate::observability::SessionEvent;
use crate::response::Frame;

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    pub msisdn: String,
    #[serde(default)]
    pub input: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "networkCode")]
    pub network_code: String,
    #[serde(rename = "newRequest", default)]
    pub new_request: Option<String>,
}

fn validate_webhook_query(query: &WebhookQuery) -> Result<(), (StatusCode, String)> {
    if query.msisdn.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "msisdn is required".to_string()));
    }
    if query.session_id.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "sessionId is required".to_string()));
    }
    if query.network_code.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "networkCode is required".to_string()));
    }
    Ok(())
}

async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WebhookQuery>,
) -> Response {
    if let Err((status, message)) = validate_webhook_query(&query) {
        return (status, message).into_response();
    }

    // An unrecognized network code fails fast, before the engine touches the
    // session store: no turn should mutate state for a request this gateway
    // can never frame a response for.
    if !matches!(query.network_code.as_str(), "MTN" | "MTN2" | "AIRTEL") {
        tracing::error!(
            event = SessionEvent::NetworkCodeUnrecognized.as_str(),
            code = %query.network_code
        );
        return (StatusCode::BAD_REQUEST, "invalid network code").into_response();
    }

    let network_code = query.network_code.clone();
    let turn = TurnInput {
        session_id: query.session_id,
        msisdn: query.msisdn,
        input: query.input,
        network_code: network_code.clone(),
    };

    let outcome = match engine::run_turn(&state, turn).await {
        Ok(outcome) => outcome,
        Err(EngineError::InvalidNetworkCode(code)) => {
            tracing::error!(event = SessionEvent::NetworkCodeUnrecognized.as_str(), code);
            return (StatusCode::BAD_REQUEST, "invalid network code").into_response();
        }
        Err(err) => {
            tracing::error!(error = %err, "turn failed with an unhandled engine error");
            let lang = "en";
            crate::engine::TurnOutput {
                text: err.user_message(&state.localizer, lang),
                end_session: err.ends_session(),
            }
        }
    };

    match crate::response::frame(&network_code, outcome.text, outcome.end_session) {
        Ok(Frame::Json { action, message }) => Json(JsonFrameBody { action, message }).into_response(),
        Ok(Frame::HeaderBody { freeflow, body }) => {
            let mut response = body.into_response();
            response
                .headers_mut()
                .insert("Freeflow", HeaderValue::from_static(freeflow));
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            response
        }
        Err(_) => (StatusCode::BAD_REQUEST, "invalid network code").into_response(),
    }
}

#[derive(Serialize)]
struct JsonFrameBody {
    action: &'static str,
    message: String,
}

#[derive(Serialize)]
pub struct ServiceStatusResponse {
    pub status: &'static str,
}

async fn handle_service_status() -> Json<ServiceStatusResponse> {
    Json(ServiceStatusResponse { status: "ok" })
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ussd/api/v1/webhook", get(handle_webhook))
        .route("/ussd/api/v1/service-status", get(handle_service_status))
        .with_state(state)
}

pub async fn run_http(state: Arc<AppState>, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(bind, "ussd gateway listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    #[allow(clippy::expect_used)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
