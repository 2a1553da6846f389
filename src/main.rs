//! ussd-gateway CLI: serve the webhook, or validate configuration and exit.
//!
//! Logging: set `RUST_LOG=ussd_gateway=info` (or `debug`) to see gateway logs
//! on stderr.

mod cli;

use std::sync::Arc;

use clap::Parser;

use ussd_gateway::{
    AppState, StepGraph, UpstreamClient, connect_db, handler_registry, init_tracing,
    load_runtime_settings, run_http, set_config_home_override, Localizer, SessionStore,
};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Some(conf_dir) = cli.conf.clone() {
        set_config_home_override(conf_dir);
    }

    init_tracing();

    let settings = load_runtime_settings();
    let backend_url = settings.validate_backend_url()?.to_string();

    match cli.command {
        Command::CheckConfig => {
            tracing::info!("configuration is valid");
            Ok(())
        }
        Command::Serve { bind } => {
            let pool = connect_db(&settings.postgres_db.database_url()).await?;
            let step_graph = StepGraph::load(&settings.step_graph_path_or_default())?;
            let localizer = Localizer::load(&settings.localization_dir_or_default())?;
            let session_store =
                SessionStore::from_settings(&settings.redis, settings.session_ttl_secs_or_default());
            let upstream = UpstreamClient::new(
                &backend_url,
                settings.backend_auth.username.clone(),
                settings.backend_auth.password.clone(),
            )?;

            let state = Arc::new(AppState {
                step_graph,
                localizer,
                session_store,
                upstream,
                handlers: handler_registry(),
                pool,
                turn_timeout_secs: settings.turn_timeout_secs_or_default(),
            });

            let bind = bind.unwrap_or_else(|| format!("0.0.0.0:{}", settings.port_or_default()));
            run_http(state, &bind).await
        }
    }
}
