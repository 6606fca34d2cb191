// src/main.rs
mod api;
mod bridge;
mod config;
mod geometry;
mod layers;
mod model;
mod placement;
mod protocol;
mod session;
mod store;
mod types;

use std::process::ExitCode;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use api::ApiState;
use bridge::ExternalPacker;
use config::AppConfig;
use session::Session;

const DEFAULT_LOG_FILTER: &str = "pack_live=info,tower_http=info";

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before the subscriber so RUST_LOG from the file applies.
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            tracing::warn!(error = %err, "could not load .env");
        }
    }

    let app_config = AppConfig::from_env();
    let packer = ExternalPacker::new(&app_config.packer);
    let (session, _session_task) = Session::spawn(&app_config.session, packer.clone());

    tracing::info!("packing session service starting");
    match api::start_api_server(app_config.api, ApiState { session, packer }).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "server terminated with an error");
            ExitCode::FAILURE
        }
    }
}
