//! Streak Squad Back binary entrypoint wiring the REST surface, the
//! submission oracle, the scheduler, and the MongoDB layer.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dao;
mod dto;
mod error;
mod oracle;
mod routes;
mod services;
mod state;

use config::AppConfig;
use oracle::alfa::AlfaSubmissionOracle;
use services::{notifier::LogNotifier, scheduler};
use state::{AppState, SharedState};

/// Public alfa-leetcode-api deployment used when no override is supplied.
const DEFAULT_ORACLE_API_BASE: &str = "https://alfa-leetcode-api.onrender.com";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();

    let oracle_base =
        env::var("ORACLE_API_BASE").unwrap_or_else(|_| DEFAULT_ORACLE_API_BASE.into());
    let oracle = AlfaSubmissionOracle::new(&oracle_base, config.oracle_timeout)
        .context("building oracle client")?;

    let app_state = AppState::new(config, Arc::new(oracle));

    #[cfg(feature = "mongo-store")]
    tokio::spawn(run_storage_supervisor(app_state.clone()));

    tokio::spawn(scheduler::run(app_state.clone(), Arc::new(LogNotifier)));

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Keep a MongoDB group store installed, reconnecting in the background and
/// toggling degraded mode when connectivity changes.
#[cfg(feature = "mongo-store")]
async fn run_storage_supervisor(state: SharedState) {
    use dao::group_store::{GroupStore, mongodb::{MongoConfig, MongoGroupStore}};

    services::storage_supervisor::run(state, || async {
        let config = MongoConfig::from_env().await?;
        let store = MongoGroupStore::connect(config).await?;
        Ok(Arc::new(store) as Arc<dyn GroupStore>)
    })
    .await;
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
