//! Per-turn orchestrator: the single algorithm described for the session
//! engine — resolve the session, resolve the step, match input, dispatch the
//! bound action, compute the next step's content, and hand the result to the
//! response framer.

use std::sync::Arc;

use sqlx::PgPool;

use crate::db;
use crate::error::{EngineError, EngineResult};
use crate::handlers::{ActionContext, ActionOutcome, HandlerRegistry};
use crate::localization::Localizer;
use crate::observability::SessionEvent;
use crate::response;
use crate::session::{SessionState, SessionStore};
use crate::stepgraph::{Content, StepGraph};
use crate::upstream::UpstreamClient;

pub struct AppState {
    pub step_graph: StepGraph,
    pub localizer: Localizer,
    pub session_store: SessionStore,
    pub upstream: UpstreamClient,
    pub handlers: HandlerRegistry,
    pub pool: PgPool,
    pub turn_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct TurnInput {
    pub session_id: String,
    pub msisdn: String,
    pub input: String,
    pub network_code: String,
}

#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub text: String,
    pub end_session: bool,
}

/// Runs one USSD turn to completion, bounded by `turn_timeout_secs`.
pub async fn run_turn(state: &Arc<AppState>, req: TurnInput) -> EngineResult<TurnOutput> {
    let timeout = std::time::Duration::from_secs(state.turn_timeout_secs);
    match tokio::time::timeout(timeout, run_turn_inner(state, req)).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Internal("turn exceeded its time budget".to_string())),
    }
}

async fn run_turn_inner(state: &Arc<AppState>, req: TurnInput) -> EngineResult<TurnOutput> {
    let trace_id = crate::observability::new_trace_id();
    tracing::info!(event = SessionEvent::TurnStarted.as_str(), trace_id, session_id = %req.session_id);

    let existing = state.session_store.load(&req.session_id).await?;

    // Session previously completed: generic end-of-session acknowledgement.
    if let Some(ref session) = existing {
        if session.step_id.is_empty() {
            return Ok(TurnOutput {
                text: state.localizer.get(&session.language, "action_done", None),
                end_session: true,
            });
        }
    }

    let mut session = match existing {
        Some(session) => session,
        None => {
            let mut fresh = SessionState::new(&req.session_id, &req.msisdn);
            enrich_with_customer(state, &mut fresh).await;
            state.session_store.save(&fresh).await?;
            tracing::info!(event = SessionEvent::SessionCreated.as_str(), session_id = %req.session_id);
            let home = state
                .step_graph
                .get(StepGraph::HOME)
                .ok_or_else(|| EngineError::UnknownStep(StepGraph::HOME.to_string()))?;
            let text = match &home.content {
                Content::LocalizationKey(key) => state.localizer.get(&fresh.language, key, None),
                Content::DynamicAction(_) => {
                    return Err(EngineError::Internal("home step must not be dynamic".to_string()));
                }
            };
            return Ok(TurnOutput {
                text,
                end_session: home.is_end_session,
            });
        }
    };

    if session.customer_id.is_none() {
        enrich_with_customer(state, &mut session).await;
    }

    let lang = session.language.clone();

    // Pagination continuation: typing "n" replays the stashed remainder.
    if session.has_pending_continuation() && req.input == "n" {
        let text = session.pending_continuation.clone();
        session.pending_continuation.clear();
        session.last_response = text.clone();
        state.session_store.save(&session).await?;
        tracing::debug!(event = SessionEvent::ResponsePaginated.as_str(), session_id = %req.session_id, continued = true);
        return Ok(TurnOutput { text, end_session: false });
    }

    let current_step = state
        .step_graph
        .get(&session.step_id)
        .ok_or_else(|| {
            tracing::error!(event = SessionEvent::StepUnknown.as_str(), step_id = %session.step_id);
            EngineError::UnknownStep(session.step_id.clone())
        })?;

    let matched = current_step
        .resolve_input(&req.input)
        .ok_or(EngineError::InvalidInput)?;
    let matched = matched.clone();

    tracing::debug!(event = SessionEvent::StepResolved.as_str(), step_id = %session.step_id, next_step = %matched.next_step);

    session.step_id = matched.next_step.clone();

    let mut extras = state.session_store.load_extras(&req.session_id).await?;

    let customer_name_owned = session.customer_name.clone();
    let mut ctx = ActionContext {
        session_id: &req.session_id,
        msisdn: &req.msisdn,
        language: &lang,
        input: &req.input,
        matched_value: &matched.value,
        customer_id: session.customer_id,
        customer_name: customer_name_owned.as_deref(),
        pool: &state.pool,
        upstream: &state.upstream,
        localizer: &state.localizer,
        extras: &mut extras,
    };

    if !matched.validation.is_empty() {
        let handler = state
            .handlers
            .get(&matched.validation)
            .ok_or_else(|| EngineError::UnknownHandler(matched.validation.clone()))?;
        let _ = handler.call(&mut ctx).await;
    }

    let mut ends_session_now = false;
    let mut message_override: Option<String> = None;

    if matched.action == "end_session" {
        message_override = Some(state.localizer.get(&lang, "thank_you", None));
        ends_session_now = true;
    } else if !matched.action.is_empty() {
        let handler = state
            .handlers
            .get(&matched.action)
            .ok_or_else(|| EngineError::UnknownHandler(matched.action.clone()))?;
        tracing::debug!(event = SessionEvent::ActionDispatched.as_str(), action = %matched.action);
        match handler.call(&mut ctx).await {
            ActionOutcome::Proceed => {}
            ActionOutcome::Render(key) => {
                message_override = Some(state.localizer.get(&lang, &key, None));
            }
            ActionOutcome::RenderParams(key, params) => {
                message_override = Some(state.localizer.get(&lang, &key, Some(&params)));
            }
            ActionOutcome::Text(text) => {
                message_override = Some(text);
            }
            ActionOutcome::Soft(text) => {
                tracing::info!(event = SessionEvent::ActionFailed.as_str(), action = %matched.action, kind = "soft");
                let rendered = if crate::localization::is_key_shaped(&text) {
                    state.localizer.get(&lang, &text, None)
                } else {
                    text
                };
                message_override = Some(rendered);
            }
            ActionOutcome::Internal(detail) => {
                tracing::error!(event = SessionEvent::ActionFailed.as_str(), action = %matched.action, kind = "internal", detail);
                message_override = Some(state.localizer.get(&lang, "system_error", None));
                ends_session_now = true;
            }
        }
    }

    state.session_store.save_extras(&req.session_id, &extras).await?;

    let final_text = if let Some(text) = message_override {
        text
    } else if ends_session_now || current_step.is_end_session {
        state.localizer.get(&lang, "action_done", None)
    } else {
        render_next_step_content(state, &mut session, &lang).await?
    };

    // The resolved next step (assigned to `session.step_id` above) governs
    // end-of-session, not the step the user answered from: a confirm step
    // whose action reports success lands on a terminal "done" step and must
    // signal end-of-session even though the confirm step itself isn't terminal.
    let next_step_terminal = session.step_id.is_empty()
        || state
            .step_graph
            .get(&session.step_id)
            .map(|step| step.is_end_session)
            .unwrap_or(false);

    let end_session = ends_session_now || current_step.is_end_session || next_step_terminal;

    if end_session {
        session.step_id.clear();
    }

    let (text, continuation) = response::paginate(&final_text, &state.localizer, &lang);
    session.pending_continuation = continuation;
    session.last_input = req.input.clone();
    session.last_response = text.clone();
    state.session_store.save(&session).await?;

    Ok(TurnOutput { text, end_session })
}

async fn render_next_step_content(
    state: &Arc<AppState>,
    session: &mut SessionState,
    lang: &str,
) -> EngineResult<String> {
    if session.step_id.is_empty() {
        tracing::error!(event = SessionEvent::StepUnknown.as_str(), "next_step is empty on a non-terminal step");
        return Err(EngineError::Internal("next_step is empty on a non-terminal step".to_string()));
    }
    let next = state
        .step_graph
        .get(&session.step_id)
        .ok_or_else(|| EngineError::UnknownStep(session.step_id.clone()))?;

    match &next.content {
        Content::LocalizationKey(key) => Ok(state.localizer.get(lang, key, None)),
        Content::DynamicAction(action_id) => {
            let handler = state
                .handlers
                .get(action_id)
                .ok_or_else(|| EngineError::UnknownHandler(action_id.clone()))?;
            let mut extras = state.session_store.load_extras(&session.session_id).await?;
            let customer_name_owned = session.customer_name.clone();
            let mut ctx = ActionContext {
                session_id: &session.session_id,
                msisdn: &session.msisdn,
                language: lang,
                input: "",
                matched_value: "",
                customer_id: session.customer_id,
                customer_name: customer_name_owned.as_deref(),
                pool: &state.pool,
                upstream: &state.upstream,
                localizer: &state.localizer,
                extras: &mut extras,
            };
            let outcome = handler.call(&mut ctx).await;
            state.session_store.save_extras(&session.session_id, &extras).await?;
            match outcome {
                ActionOutcome::Text(text) => Ok(text),
                ActionOutcome::Render(key) => Ok(state.localizer.get(lang, &key, None)),
                ActionOutcome::RenderParams(key, params) => {
                    Ok(state.localizer.get(lang, &key, Some(&params)))
                }
                ActionOutcome::Soft(text) | ActionOutcome::Internal(text) => Ok(text),
                ActionOutcome::Proceed => {
                    Err(EngineError::Internal(format!("dynamic content action {action_id} returned Proceed")))
                }
            }
        }
    }
}

async fn enrich_with_customer(state: &Arc<AppState>, session: &mut SessionState) {
    match db::find_user_by_msisdn(&state.pool, &session.msisdn).await {
        Ok(Some(user)) => {
            session.customer_id = Some(user.id);
            session.customer_name = Some(user.full_names);
        }
        Ok(None) => {}
        Err(err) => tracing::warn!(error = %err, "user lookup failed"),
    }
    match db::find_user_locale(&state.pool, &session.msisdn).await {
        Ok(Some(locale)) if !locale.is_empty() => session.language = locale,
        Ok(_) => {}
        Err(err) => tracing::warn!(error = %err, "locale lookup failed"),
    }
}
