//! Runner tests: budgets, panics and cleanup guarantees.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use boundary_probe::cli::block_on_bounded;
use boundary_probe::outcome::RawResult;
use boundary_probe::probe::{Category, Probe};
use boundary_probe::runner::{CleanupStatus, ProbeRunner, RunnerConfig};
use boundary_probe::{HarnessFault, OutcomeKind};
use common::{denied, Script, Scripted};

fn fast_runner() -> ProbeRunner {
    ProbeRunner::new(RunnerConfig {
        cleanup_grace: Duration::from_millis(50),
        cleanup_bound: Duration::from_millis(200),
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn denied_operation_is_blocked_and_cleaned_up() {
    let probe = Arc::new(Scripted::new("fs", Category::Filesystem, Script::Return(denied("EACCES"))));
    let execution = fast_runner()
        .execute(probe.clone() as Arc<dyn Probe>, Duration::from_secs(1))
        .await;

    assert_eq!(execution.outcome().kind, OutcomeKind::Blocked);
    assert_eq!(execution.cleanup, CleanupStatus::Completed);
    assert!(execution.fault.is_none());
    assert_eq!(probe.runs(), 1);
    assert_eq!(probe.cleanups(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cooperative_probe_stops_at_budget() {
    let probe = Arc::new(Scripted::new(
        "slow",
        Category::Filesystem,
        Script::Sleep(Duration::from_secs(30)),
    ));
    let budget = Duration::from_millis(100);
    let started = Instant::now();
    let execution = fast_runner().execute(probe.clone() as Arc<dyn Probe>, budget).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(execution.raw, RawResult::TimedOut { budget_ms: 100 });
    assert_eq!(execution.outcome().kind, OutcomeKind::Inconclusive);
    assert_eq!(probe.cleanups(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocked_syscall_is_abandoned_after_grace() {
    let probe = Arc::new(Scripted::new(
        "egress",
        Category::Network,
        Script::BlockFor(Duration::from_secs(3)),
    ));
    let started = Instant::now();
    let execution = fast_runner()
        .execute(probe.clone() as Arc<dyn Probe>, Duration::from_millis(50))
        .await;

    // budget + grace + cleanup bound, with scheduling slack
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(matches!(execution.raw, RawResult::TimedOut { .. }));
    assert_eq!(execution.outcome().kind, OutcomeKind::Blocked);
    assert_eq!(probe.cleanups(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_action_is_crashed_with_cleanup() {
    let probe = Arc::new(Scripted::new("boom", Category::Memory, Script::Panic("allocator exploded")));
    let execution = fast_runner()
        .execute(probe.clone() as Arc<dyn Probe>, Duration::from_secs(1))
        .await;

    let outcome = execution.outcome();
    assert_eq!(outcome.kind, OutcomeKind::Crashed);
    assert!(outcome.explanation.contains("allocator exploded"));
    assert_eq!(probe.cleanups(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_cleanup_is_reported_and_settles() {
    let probe = Arc::new(
        Scripted::new("fs", Category::Filesystem, Script::Return(denied("EROFS")))
            .slow_cleanup(Duration::from_millis(500)),
    );
    let mut execution = fast_runner()
        .execute(probe.clone() as Arc<dyn Probe>, Duration::from_secs(1))
        .await;

    assert_eq!(execution.cleanup, CleanupStatus::Overran);
    assert!(matches!(execution.fault, Some(HarnessFault::CleanupOverran { bound_ms: 200 })));
    // The action's own result still stands.
    assert_eq!(execution.outcome().kind, OutcomeKind::Blocked);
    assert!(execution.has_pending_cleanup());

    execution.settle().await;
    assert!(!execution.has_pending_cleanup());
    assert_eq!(probe.cleanups(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn probe_is_reusable_after_execution() {
    let probe = Arc::new(Scripted::new("fs", Category::Filesystem, Script::Return(denied("EACCES"))));
    let runner = fast_runner();
    for _ in 0..3 {
        let execution = runner
            .execute(probe.clone() as Arc<dyn Probe>, Duration::from_secs(1))
            .await;
        assert_eq!(execution.outcome().kind, OutcomeKind::Blocked);
    }
    assert_eq!(probe.runs(), 3);
    assert_eq!(probe.cleanups(), 3);
}

#[test]
fn runtime_shutdown_does_not_wait_for_abandoned_action() {
    let probe = Arc::new(Scripted::new(
        "stuck",
        Category::Network,
        Script::BlockFor(Duration::from_secs(4)),
    ));
    let started = Instant::now();
    let kind = block_on_bounded(
        async move {
            fast_runner()
                .execute(probe as Arc<dyn Probe>, Duration::from_millis(100))
                .await
                .outcome()
                .kind
        },
        Duration::from_millis(100),
    )
    .unwrap();

    assert_eq!(kind, OutcomeKind::Blocked);
    // The action still sleeps for seconds; only the bounded shutdown returns this fast.
    assert!(started.elapsed() < Duration::from_secs(2));
}
