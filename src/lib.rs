//! USSD session gateway: aggregator webhook to payments backend.
//!
//! - **Step graph** (`stepgraph`): declarative menu states loaded from JSON.
//! - **Session store** (`session`): Redis-or-memory, 120s TTL refreshed on write.
//! - **Engine** (`engine`): one turn in, one response out.
//! - **Upstream client** (`upstream`): authenticated calls to the payments backend.
//! - **Gateway** (`gateway`): the axum webhook + health routes.

#![allow(missing_docs)]

mod config;
mod db;
mod engine;
mod error;
mod gateway;
mod handlers;
mod localization;
mod observability;
mod response;
mod session;
mod stepgraph;
mod upstream;

pub use config::{
    BackendSettings, PostgresSettings, RedisSettings, RuntimeSettings, load_runtime_settings,
    set_config_home_override,
};
pub use db::connect as connect_db;
pub use engine::{AppState, TurnInput, TurnOutput, run_turn};
pub use error::{EngineError, EngineResult};
pub use gateway::{router, run_http};
pub use handlers::{HandlerRegistry, registry as handler_registry};
pub use localization::Localizer;
pub use observability::init_tracing;
pub use session::{SessionExtras, SessionState, SessionStore};
pub use stepgraph::StepGraph;
pub use upstream::{InitiatePayload, InitiateResult, UpstreamClient};
