use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::shutdown::{shutdown_signal, ShutdownNotifier};
use crate::core::state::AppState;
use crate::services::expiry_reaper;

/// Worker process entry: sweeps until a shutdown signal arrives.
pub(crate) async fn run(state: AppState) -> Result<()> {
    let (notifier, shutdown_rx) = ShutdownNotifier::new();
    let handle = spawn_expiry_sweep(state, shutdown_rx);

    shutdown_signal().await;
    notifier.notify();

    if let Err(err) = handle.await {
        tracing::error!(error = %err, "Background task join failed");
    }

    Ok(())
}

pub(crate) fn spawn_expiry_sweep(
    state: AppState,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(expiry_sweep_loop(state, shutdown))
}

async fn expiry_sweep_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = Duration::from_secs(state.settings().exam().expiry_sweep_interval_seconds);
    tracing::info!(interval_seconds = period.as_secs(), "Expiry sweep started");

    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = expiry_reaper::sweep(&state).await {
                    tracing::error!(error = %err, "Expiry sweep failed");
                }
            }
        }
    }

    tracing::info!("Expiry sweep stopped");
}

#[cfg(test)]
mod tests {
    use time::Duration as TimeDuration;
    use tokio::time::{sleep, timeout, Duration};

    use super::spawn_expiry_sweep;
    use crate::core::shutdown::ShutdownNotifier;
    use crate::db::types::AttemptStatus;
    use crate::store::ExamStore;
    use crate::test_support::{self, fixtures};

    #[tokio::test]
    async fn sweep_loop_closes_expired_attempts_and_stops_on_shutdown() {
        let ctx = test_support::setup_test_context().await;
        fixtures::seed_published_exam(&ctx).await;
        let attempt = fixtures::attempt("attempt-1", "exam-1", "student-1");
        assert!(ctx.store.create_attempt(&attempt).await.expect("create"));
        ctx.clock.advance(TimeDuration::minutes(90));

        let (notifier, shutdown_rx) = ShutdownNotifier::new();
        let handle = spawn_expiry_sweep(ctx.state.clone(), shutdown_rx);

        let closed = timeout(Duration::from_secs(5), async {
            loop {
                let current = ctx
                    .store
                    .find_attempt("exam-1", "student-1")
                    .await
                    .expect("find")
                    .expect("attempt");
                if current.status != AttemptStatus::InProgress {
                    return current;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("sweep ran");
        assert_eq!(closed.status, AttemptStatus::AutoSubmitted);

        notifier.notify();
        timeout(Duration::from_secs(5), handle).await.expect("loop stopped").expect("join");
    }
}
