pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod store;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use axum::{extract::Request, ServiceExt};

use crate::core::clock::SystemClock;
use crate::core::config::{Settings, StoreBackend};
use crate::core::shutdown::ShutdownNotifier;
use crate::core::{state::AppState, telemetry};
use crate::store::{ExamStore, MemoryStore, PgExamStore};

async fn build_state(settings: Settings) -> anyhow::Result<AppState> {
    let store: Arc<dyn ExamStore> = match settings.database().store {
        StoreBackend::Postgres => {
            let db_pool = db::init_pool(&settings).await?;
            db::run_migrations(&db_pool).await?;
            Arc::new(PgExamStore::new(db_pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    Ok(AppState::new(settings, store, Arc::new(SystemClock)))
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let state = build_state(settings).await?;

    let (notifier, shutdown_rx) = ShutdownNotifier::new();
    let sweep = state
        .settings()
        .exam()
        .expiry_sweep_enabled
        .then(|| tasks::scheduler::spawn_expiry_sweep(state.clone(), shutdown_rx));

    let app = api::router::app(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        store = state.settings().database().store.as_str(),
        "Examhall API listening"
    );

    let result = axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(core::shutdown::shutdown_signal())
        .await;

    notifier.notify();
    if let Some(handle) = sweep {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Expiry sweep join failed");
        }
    }

    result?;

    Ok(())
}

pub async fn run_worker() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let state = build_state(settings).await?;
    tasks::scheduler::run(state).await
}
