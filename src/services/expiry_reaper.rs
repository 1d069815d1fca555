use crate::core::metrics::EXPIRED_ATTEMPTS_CLOSED;
use crate::core::state::AppState;
use crate::services::attempt_lifecycle::{self, remaining_within_budget, FinalizeMode, Finalized};
use crate::services::errors::ExamResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SweepReport {
    pub(crate) examined: usize,
    pub(crate) closed: usize,
}

/// Closes every in-progress attempt whose budget is spent.
///
/// Safe to run next to organic traffic: each close is the same
/// compare-and-swap the request path uses, so a lost race is skipped.
pub(crate) async fn sweep(state: &AppState) -> ExamResult<SweepReport> {
    let now = state.clock().now();
    let candidates = state.store().list_expiry_candidates(now).await?;
    let mut report = SweepReport { examined: candidates.len(), closed: 0 };

    for candidate in candidates {
        if remaining_within_budget(&candidate.attempt, candidate.duration_minutes, now) > 0 {
            continue;
        }
        match attempt_lifecycle::finalize(state, &candidate.attempt, FinalizeMode::AutoDeadline, now)
            .await
        {
            Ok(Finalized::Closed(_)) => report.closed += 1,
            Ok(Finalized::AlreadyClosed(_)) => {}
            Err(err) => tracing::error!(
                attempt_id = %candidate.attempt.id,
                error = %err,
                "Failed to auto-submit expired attempt"
            ),
        }
    }

    if report.closed > 0 {
        metrics::counter!(EXPIRED_ATTEMPTS_CLOSED).increment(report.closed as u64);
        tracing::info!(
            examined = report.examined,
            closed = report.closed,
            "Expired attempts auto-submitted"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::db::types::AttemptStatus;
    use crate::store::ExamStore;
    use crate::test_support::{self, fixtures};

    #[tokio::test]
    async fn sweep_closes_only_spent_attempts() {
        let ctx = test_support::setup_test_context().await;
        fixtures::seed_published_exam(&ctx).await;
        ctx.store.add_batch_member("batch-1", "student-2", fixtures::t0()).await.expect("member");

        attempt_lifecycle::start(&ctx.state, "exam-1", "student-1").await.expect("early");
        ctx.clock.advance(Duration::minutes(30));
        attempt_lifecycle::start(&ctx.state, "exam-1", "student-2").await.expect("late");
        ctx.clock.advance(Duration::minutes(31));

        let report = sweep(&ctx.state).await.expect("sweep");
        assert_eq!(report, SweepReport { examined: 1, closed: 1 });

        let early = ctx.store.find_attempt("exam-1", "student-1").await.expect("find").expect("early");
        let late = ctx.store.find_attempt("exam-1", "student-2").await.expect("find").expect("late");
        assert_eq!(early.status, AttemptStatus::AutoSubmitted);
        assert_eq!(late.status, AttemptStatus::InProgress);
    }

    #[tokio::test]
    async fn sweep_is_idempotent() {
        let ctx = test_support::setup_test_context().await;
        fixtures::seed_published_exam(&ctx).await;
        attempt_lifecycle::start(&ctx.state, "exam-1", "student-1").await.expect("start");
        ctx.clock.advance(Duration::minutes(120));

        assert_eq!(sweep(&ctx.state).await.expect("first").closed, 1);
        assert_eq!(sweep(&ctx.state).await.expect("second"), SweepReport::default());
    }

    #[tokio::test]
    async fn sweep_leaves_manual_submissions_alone() {
        let ctx = test_support::setup_test_context().await;
        fixtures::seed_published_exam(&ctx).await;
        attempt_lifecycle::start(&ctx.state, "exam-1", "student-1").await.expect("start");
        attempt_lifecycle::submit(&ctx.state, "exam-1", "student-1").await.expect("submit");
        ctx.clock.advance(Duration::minutes(120));

        assert_eq!(sweep(&ctx.state).await.expect("sweep").closed, 0);
        let stored = ctx.store.find_attempt("exam-1", "student-1").await.expect("find").expect("attempt");
        assert_eq!(stored.status, AttemptStatus::Submitted);
    }
}
