use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) const ATTEMPTS_STARTED: &str = "attempts_started_total";
pub(crate) const ATTEMPTS_CLOSED: &str = "attempts_closed_total";
pub(crate) const ANSWERS_SAVED: &str = "answers_saved_total";
pub(crate) const EXPIRED_ATTEMPTS_CLOSED: &str = "expired_attempts_closed_total";

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);

    metrics::describe_counter!(ATTEMPTS_STARTED, "Exam attempts created");
    metrics::describe_counter!(ATTEMPTS_CLOSED, "Exam attempts moved to a terminal status");
    metrics::describe_counter!(ANSWERS_SAVED, "Answers written while an attempt was open");
    metrics::describe_counter!(
        EXPIRED_ATTEMPTS_CLOSED,
        "Attempts closed by the periodic expiry sweep"
    );
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
