//! Action and validation handler registry.
//!
//! The source dispatched step actions by reflecting over a method name
//! string at runtime. Here every action is a concrete type implementing
//! [`Handler`], registered once under its id in a plain `HashMap` — an
//! unknown id is a startup-time authoring mistake, not a runtime surprise.

pub mod airtime;
pub mod common;
pub mod electricity;
pub mod merchant;
pub mod rra;
pub mod tv;

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::localization::Localizer;
use crate::session::SessionExtras;
use crate::upstream::UpstreamClient;

/// Everything a handler needs about the turn it's running inside.
pub struct ActionContext<'a> {
    pub session_id: &'a str,
    pub msisdn: &'a str,
    pub language: &'a str,
    /// Raw text the caller typed this turn.
    pub input: &'a str,
    /// The matched `Input.value` field — the echoed meaning of their choice.
    pub matched_value: &'a str,
    pub customer_id: Option<i64>,
    pub customer_name: Option<&'a str>,
    pub pool: &'a PgPool,
    pub upstream: &'a UpstreamClient,
    pub localizer: &'a Localizer,
    pub extras: &'a mut SessionExtras,
}

/// What a handler reports back to the engine. See `EngineError` for why
/// this replaces the source's `"err:"`/`"fail:"` string convention.
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    /// Proceed to `next_step` with no message override.
    Proceed,
    /// Render `key` (a localization key) as this turn's message.
    Render(String),
    /// Render `key` with named-parameter substitution (e.g. `{{Amount}}`,
    /// `{{Account}}`) — used by confirm steps to show the backend's
    /// authoritative amount/account name rather than a generic prompt.
    RenderParams(String, std::collections::HashMap<String, String>),
    /// Soft, user-visible failure; session continues. If `payload` is
    /// key-shaped it's translated, otherwise shown verbatim.
    Soft(String),
    /// Internal failure; session ends with the sanitized system message.
    Internal(String),
    /// Pre-rendered literal text, used by `action:fn` dynamic step content
    /// providers — never passed through localization lookup.
    Text(String),
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &mut ActionContext<'_>) -> ActionOutcome;
}

pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl HandlerRegistry {
    pub(crate) fn get(&self, id: &str) -> Option<&dyn Handler> {
        self.handlers.get(id).map(|b| b.as_ref())
    }
}

/// Builds the process-wide action/validation registry. Called once at
/// startup; the resulting table is read-only for the life of the process.
pub fn registry() -> HandlerRegistry {
    let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();

    handlers.insert("set_language_en", Box::new(common::SetLanguageEn));
    handlers.insert("set_language_rw", Box::new(common::SetLanguageRw));

    electricity::register(&mut handlers);
    airtime::register(&mut handlers);
    tv::register(&mut handlers);
    merchant::register(&mut handlers);
    rra::register(&mut handlers);

    HandlerRegistry { handlers }
}

pub(crate) type HandlerMap = HashMap<&'static str, Box<dyn Handler>>;
