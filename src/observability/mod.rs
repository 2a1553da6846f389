//! Structured logging conventions shared across the gateway.
//!
//! Mirrors the event-name-as-enum pattern used by the session store in the
//! agent this gateway is descended from: instead of ad hoc string literals
//! scattered through `tracing::debug!`/`tracing::warn!` calls, lifecycle
//! events are named once here and referenced via [`SessionEvent::as_str`].

use uuid::Uuid;

/// Named lifecycle events logged at session/turn boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    TurnStarted,
    SessionCreated,
    SessionLoaded,
    SessionSaved,
    SessionExpiredOrMissing,
    StoreValkeyConnected,
    StoreValkeyCommandRetrySucceeded,
    StoreValkeyCommandRetryFailed,
    StoreFallbackToMemory,
    UpstreamLoginStarted,
    UpstreamLoginSucceeded,
    UpstreamLoginFailed,
    UpstreamRetryAfterAuthError,
    UpstreamCallFailed,
    StepResolved,
    StepUnknown,
    ActionDispatched,
    ActionFailed,
    ResponsePaginated,
    NetworkCodeUnrecognized,
}

impl SessionEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionEvent::TurnStarted => "turn_started",
            SessionEvent::SessionCreated => "session_created",
            SessionEvent::SessionLoaded => "session_loaded",
            SessionEvent::SessionSaved => "session_saved",
            SessionEvent::SessionExpiredOrMissing => "session_expired_or_missing",
            SessionEvent::StoreValkeyConnected => "store_valkey_connected",
            SessionEvent::StoreValkeyCommandRetrySucceeded => {
                "store_valkey_command_retry_succeeded"
            }
            SessionEvent::StoreValkeyCommandRetryFailed => "store_valkey_command_retry_failed",
            SessionEvent::StoreFallbackToMemory => "store_fallback_to_memory",
            SessionEvent::UpstreamLoginStarted => "upstream_login_started",
            SessionEvent::UpstreamLoginSucceeded => "upstream_login_succeeded",
            SessionEvent::UpstreamLoginFailed => "upstream_login_failed",
            SessionEvent::UpstreamRetryAfterAuthError => "upstream_retry_after_auth_error",
            SessionEvent::UpstreamCallFailed => "upstream_call_failed",
            SessionEvent::StepResolved => "step_resolved",
            SessionEvent::StepUnknown => "step_unknown",
            SessionEvent::ActionDispatched => "action_dispatched",
            SessionEvent::ActionFailed => "action_failed",
            SessionEvent::ResponsePaginated => "response_paginated",
            SessionEvent::NetworkCodeUnrecognized => "network_code_unrecognized",
        }
    }
}

/// A fresh per-turn trace id, attached as a tracing span field so a
/// critical-severity log line can be correlated with the sanitized message
/// shown to the end user.
pub fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Initializes the global tracing subscriber. Idempotent — safe to call
/// more than once (e.g. from tests); subsequent calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ussd_gateway=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
