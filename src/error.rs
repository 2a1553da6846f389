//! Error taxonomy for a single USSD turn.
//!
//! The source system encoded outcomes as plain strings (`"err:..."`,
//! `"fail:..."`) threaded through a dynamic return value. Here every
//! failure mode is a variant with its own sanitized, user-facing rendering,
//! so a handler author cannot accidentally leak an internal message onto
//! the USSD channel.

use thiserror::Error;

/// Everything that can go wrong while serving one USSD turn.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The user's input didn't match any option on the current step.
    #[error("invalid input")]
    InvalidInput,

    /// A handler reported a soft, user-visible failure (continues the session).
    #[error("soft failure: {0}")]
    Soft(String),

    /// The step graph references a step id that isn't loaded.
    #[error("unknown step: {0}")]
    UnknownStep(String),

    /// The step graph references an action/validation id with no registered handler.
    #[error("unknown handler: {0}")]
    UnknownHandler(String),

    /// A non-terminal step produced no next step.
    #[error("step {0} has no next step and is not terminal")]
    DanglingStep(String),

    /// The upstream backend rejected the call (post-auth-retry).
    #[error("backend error (status {status}): {message}")]
    Backend { status: u16, message: String },

    /// The upstream backend could not be reached at all, or was misconfigured.
    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),

    /// The session/extras store failed to persist state.
    #[error("session store error: {0}")]
    Store(String),

    /// A Postgres query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Aggregator sent a `networkCode` we don't know how to frame a response for.
    #[error("invalid network code: {0}")]
    InvalidNetworkCode(String),

    /// Any other invariant violation that should never happen in a correctly
    /// configured deployment.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// The single sanitized string shown to the end user over USSD.
    ///
    /// Never includes raw backend payloads, stack traces, or SQL errors —
    /// those are logged at `error`/`warn` severity instead, correlated by
    /// trace id (see [`crate::observability`]).
    pub fn user_message(&self, localizer: &crate::localization::Localizer, lang: &str) -> String {
        match self {
            EngineError::InvalidInput => localizer.get(lang, "invalid_input", None),
            EngineError::Soft(text) => {
                if crate::localization::is_key_shaped(text) {
                    localizer.get(lang, text, None)
                } else {
                    text.clone()
                }
            }
            EngineError::Backend { .. }
            | EngineError::BackendUnreachable(_)
            | EngineError::Store(_)
            | EngineError::Database(_)
            | EngineError::UnknownStep(_)
            | EngineError::UnknownHandler(_)
            | EngineError::DanglingStep(_)
            | EngineError::InvalidNetworkCode(_)
            | EngineError::Internal(_) => localizer.get(lang, "system_error", None),
        }
    }

    /// Whether this error, surfaced mid-turn, should end the USSD session.
    ///
    /// `InvalidInput` and `Soft` failures are recoverable: the caller stays
    /// on the same logical step and may retry. Everything else is fatal to
    /// the turn.
    pub fn ends_session(&self) -> bool {
        !matches!(self, EngineError::InvalidInput | EngineError::Soft(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
