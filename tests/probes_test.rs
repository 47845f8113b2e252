//! Built-in probe scenarios against deterministic resource sources.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use boundary_probe::outcome::{classify, FaultKind, ProbeValue, RawResult};
use boundary_probe::probe::{
    Category, CommandProbe, FdLimitProbe, FsWriteProbe, ListenProbe, MemoryProbe, Probe, ProbeContext,
    ScratchProbe,
};
use boundary_probe::runner::ProbeRunner;
use boundary_probe::scheduler::{ScheduledProbe, Suite, SuiteOptions, SuiteScheduler};
use boundary_probe::verdict::Verdict;
use boundary_probe::OutcomeKind;
use common::{CappedAllocator, CountingSource};
use tokio_util::sync::CancellationToken;

const MIB: u64 = 1024 * 1024;

fn ctx() -> ProbeContext {
    ProbeContext::new(Duration::from_secs(10), CancellationToken::new())
}

#[test]
fn memory_probe_stops_at_enforced_ceiling() {
    let probe = MemoryProbe::with_allocator(64 * MIB, Box::new(CappedAllocator::new(32 * MIB)))
        .chunk_bytes((4 * MIB) as usize);

    let raw = probe.run(&ctx());
    assert_eq!(
        raw,
        RawResult::Value(ProbeValue::Exhaustion {
            unit: "bytes".into(),
            acquired: 32 * MIB,
            target: 64 * MIB,
            stopped_by: Some(FaultKind::ResourceExhausted),
            basis: None,
        })
    );
    assert_eq!(classify(Category::Memory, &raw, Duration::ZERO).kind, OutcomeKind::Blocked);
    assert_eq!(probe.held_bytes(), 32 * MIB);

    probe.cleanup();
    assert_eq!(probe.held_bytes(), 0);
}

#[test]
fn memory_probe_reaching_target_is_a_violation() {
    let probe = MemoryProbe::with_allocator(8 * MIB, Box::new(CappedAllocator::new(u64::MAX)))
        .chunk_bytes(MIB as usize);
    let raw = probe.run(&ctx());
    assert_eq!(classify(Category::Memory, &raw, Duration::ZERO).kind, OutcomeKind::Succeeded);
    probe.cleanup();
}

#[test]
fn fd_probe_blocked_before_soft_limit() {
    let source = CountingSource::new(Some(201));
    let live = source.live.clone();
    let probe = FdLimitProbe::with_source(Box::new(source)).soft_limit(256).margin(10);

    let raw = probe.run(&ctx());
    match &raw {
        RawResult::Value(ProbeValue::Exhaustion { acquired, target, .. }) => {
            assert_eq!(*acquired, 200);
            assert_eq!(*target, 266);
        }
        other => panic!("unexpected: {other:?}"),
    }
    let outcome = classify(Category::ResourceLimit, &raw, Duration::ZERO);
    assert_eq!(outcome.kind, OutcomeKind::Blocked);
    assert_eq!(live.load(Ordering::SeqCst), 200);

    probe.cleanup();
    assert_eq!(live.load(Ordering::SeqCst), 0);
    assert_eq!(probe.held_count(), 0);
}

#[test]
fn fd_probe_past_soft_limit_is_a_violation() {
    let source = CountingSource::new(None);
    let live = source.live.clone();
    let probe = FdLimitProbe::with_source(Box::new(source)).soft_limit(256).margin(10);

    let raw = probe.run(&ctx());
    let outcome = classify(Category::ResourceLimit, &raw, Duration::ZERO);
    assert_eq!(outcome.kind, OutcomeKind::Succeeded);
    assert!(outcome.explanation.contains("266 of 266"));
    assert!(outcome.explanation.contains("target: declared ceiling 256 + margin 10"));

    probe.cleanup();
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fs_write_into_writable_dir_is_violation_and_cleaned() {
    let dir = tempfile::tempdir().unwrap();
    let probe = Arc::new(FsWriteProbe::new(vec![dir.path().to_path_buf()]));

    let execution = ProbeRunner::default()
        .execute(probe.clone() as Arc<dyn Probe>, Duration::from_secs(5))
        .await;

    assert_eq!(execution.outcome().kind, OutcomeKind::Succeeded);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(probe.created_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn command_probe_signal_death_is_crashed() {
    let probe = Arc::new(
        CommandProbe::new("self-kill", Category::Filesystem, "sh")
            .args(vec!["-c".into(), "kill -9 $$".into()]),
    );
    let execution = ProbeRunner::default()
        .execute(probe as Arc<dyn Probe>, Duration::from_secs(5))
        .await;

    assert_eq!(execution.raw, RawResult::Signaled { signal: 9 });
    assert_eq!(execution.outcome().kind, OutcomeKind::Crashed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn command_probe_missing_program_is_inconclusive() {
    let probe = Arc::new(CommandProbe::new(
        "missing",
        Category::PrivilegedSyscall,
        "/nonexistent/boundary-probe-tool",
    ));
    let execution = ProbeRunner::default()
        .execute(probe as Arc<dyn Probe>, Duration::from_secs(5))
        .await;

    match &execution.raw {
        RawResult::Error(fault) => assert_eq!(fault.kind, FaultKind::Unavailable),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(execution.outcome().kind, OutcomeKind::Inconclusive);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn misspelled_command_never_reports_held() {
    let probe = Arc::new(CommandProbe::new("typo", Category::Network, "/nonexistent/curll"));
    let suite = Suite::new(
        vec![ScheduledProbe::new(probe as Arc<dyn Probe>, Duration::from_secs(5))],
        SuiteOptions::default(),
    )
    .unwrap();

    let mut scheduler = SuiteScheduler::new(ProbeRunner::default());
    let report = scheduler.run(&suite).await;
    assert_eq!(report.verdict(), Verdict::IndeterminateResults);
    assert_eq!(report.counts().blocked, 0);
    assert!(report.entries()[0].outcome.explanation.contains("could not be attempted"));
}

fn child_allocation(script: &str) -> Arc<MemoryProbe> {
    Arc::new(
        MemoryProbe::new(64 * MIB).in_child("sh", vec!["-c".into(), script.into(), "sh".into()]),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oom_killed_allocation_child_is_blocked_and_harness_survives() {
    let probe = child_allocation(r#"echo '{"acquired":33554432}'; kill -KILL $$"#);
    let execution = ProbeRunner::default()
        .execute(probe.clone() as Arc<dyn Probe>, Duration::from_secs(5))
        .await;

    let outcome = execution.outcome();
    assert_eq!(outcome.kind, OutcomeKind::Blocked);
    assert!(outcome.explanation.contains("33554432"));
    assert_eq!(probe.running_children(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn allocation_child_crash_is_crashed() {
    let probe = child_allocation("kill -ABRT $$");
    let execution = ProbeRunner::default()
        .execute(probe as Arc<dyn Probe>, Duration::from_secs(5))
        .await;

    assert_eq!(execution.raw, RawResult::Signaled { signal: 6 });
    assert_eq!(execution.outcome().kind, OutcomeKind::Crashed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scratch_control_passes_without_counting_as_violation() {
    let scratch = tempfile::tempdir().unwrap();
    let protected = tempfile::tempdir().unwrap();
    let control = Arc::new(ScratchProbe::new(vec![scratch.path().to_path_buf()]));
    let blocked = Arc::new(FsWriteProbe::new(vec![protected.path().join("absent")]));
    let suite = Suite::new(
        vec![
            ScheduledProbe::new(control as Arc<dyn Probe>, Duration::from_secs(5)),
            ScheduledProbe::new(blocked as Arc<dyn Probe>, Duration::from_secs(5)),
        ],
        SuiteOptions::default(),
    )
    .unwrap();

    let report = SuiteScheduler::new(ProbeRunner::default()).run(&suite).await;
    assert_eq!(report.entries()[0].outcome.kind, OutcomeKind::Succeeded);
    assert_eq!(report.entries()[0].expectation_met, Some(true));
    assert_eq!(report.verdict(), Verdict::AllBoundariesHeld);
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_control_makes_held_verdict_indeterminate() {
    let missing = tempfile::tempdir().unwrap();
    let control = Arc::new(ScratchProbe::new(vec![missing.path().join("gone")]));
    let blocked = Arc::new(FsWriteProbe::new(vec![missing.path().join("absent")]));
    let suite = Suite::new(
        vec![
            ScheduledProbe::new(control as Arc<dyn Probe>, Duration::from_secs(5)),
            ScheduledProbe::new(blocked as Arc<dyn Probe>, Duration::from_secs(5)),
        ],
        SuiteOptions::default(),
    )
    .unwrap();

    let report = SuiteScheduler::new(ProbeRunner::default()).run(&suite).await;
    assert_eq!(report.counts().blocked, 1);
    assert_eq!(report.verdict(), Verdict::IndeterminateResults);
    assert!(report.notes().iter().any(|n| n.contains("control fs-writable")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listener_is_closed_after_run() {
    let probe = Arc::new(ListenProbe::new("127.0.0.1:0"));
    let execution = ProbeRunner::default()
        .execute(probe.clone() as Arc<dyn Probe>, Duration::from_secs(5))
        .await;

    assert_eq!(execution.outcome().kind, OutcomeKind::Succeeded);
    assert_eq!(probe.open_listeners(), 0);
}
