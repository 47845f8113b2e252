//! Scheduler tests: ordering, isolation of failures, concurrency, journaling.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use boundary_probe::journal::JsonLinesSink;
use boundary_probe::probe::{Category, Probe};
use boundary_probe::runner::{ProbeRunner, RunnerConfig};
use boundary_probe::{ConfigError, OutcomeKind, ScheduledProbe, Suite, SuiteOptions, SuiteScheduler, Verdict};
use common::{denied, exited, Script, Scripted};

fn runner() -> ProbeRunner {
    ProbeRunner::new(RunnerConfig {
        cleanup_grace: Duration::from_millis(50),
        cleanup_bound: Duration::from_millis(500),
    })
}

fn scheduler() -> SuiteScheduler {
    SuiteScheduler::new(runner()).capture_host(false)
}

fn schedule(probe: &Arc<Scripted>, budget: Duration) -> ScheduledProbe {
    ScheduledProbe::new(probe.clone() as Arc<dyn Probe>, budget)
}

fn five_with_third_hanging() -> Vec<Arc<Scripted>> {
    (0..5)
        .map(|i| {
            let script = if i == 2 {
                Script::Sleep(Duration::from_secs(30))
            } else {
                Script::Return(denied("EACCES"))
            };
            Arc::new(Scripted::new(&format!("probe-{i}"), Category::Filesystem, script))
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_timeout_does_not_stop_the_suite() {
    let probes = five_with_third_hanging();
    let scheduled = probes
        .iter()
        .map(|p| schedule(p, Duration::from_millis(200)))
        .collect();
    let suite = Suite::new(scheduled, SuiteOptions::default()).unwrap();

    let report = scheduler().run(&suite).await;

    let names: Vec<&str> = report.entries().iter().map(|e| e.probe.name.as_str()).collect();
    assert_eq!(names, ["probe-0", "probe-1", "probe-2", "probe-3", "probe-4"]);
    assert_eq!(report.entries()[2].outcome.kind, OutcomeKind::Inconclusive);
    for i in [0, 1, 3, 4] {
        assert_eq!(report.entries()[i].outcome.kind, OutcomeKind::Blocked);
    }
    assert_eq!(report.counts().blocked, 4);
    assert_eq!(report.verdict(), Verdict::AllBoundariesHeld);
    for probe in &probes {
        assert_eq!(probe.runs(), 1);
        assert_eq!(probe.cleanups(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn crash_is_isolated_to_its_probe() {
    let probes = [
        Arc::new(Scripted::new("a", Category::Filesystem, Script::Return(denied("EACCES")))),
        Arc::new(Scripted::new("b", Category::Memory, Script::Panic("boom"))),
        Arc::new(Scripted::new("c", Category::Filesystem, Script::Return(denied("EROFS")))),
    ];
    let scheduled = probes.iter().map(|p| schedule(p, Duration::from_secs(1))).collect();
    let suite = Suite::new(scheduled, SuiteOptions::default()).unwrap();

    let report = scheduler().run(&suite).await;

    assert_eq!(report.entries()[1].outcome.kind, OutcomeKind::Crashed);
    assert_eq!(report.entries()[2].outcome.kind, OutcomeKind::Blocked);
    assert_eq!(report.verdict(), Verdict::IndeterminateResults);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mode_keeps_list_order() {
    let probes: Vec<Arc<Scripted>> = (0..4)
        .map(|i| {
            Arc::new(
                Scripted::new(&format!("free-{i}"), Category::Network, Script::Sleep(Duration::from_millis(150)))
                    .free(),
            )
        })
        .chain(std::iter::once(Arc::new(Scripted::new(
            "mutating",
            Category::Filesystem,
            Script::Return(denied("EACCES")),
        ))))
        .collect();
    let scheduled = probes.iter().map(|p| schedule(p, Duration::from_secs(2))).collect();
    let suite = Suite::new(
        scheduled,
        SuiteOptions {
            concurrent: true,
            max_workers: 4,
        },
    )
    .unwrap();

    let started = Instant::now();
    let report = scheduler().run(&suite).await;

    // Four 150ms probes on four workers finish well under their serial time.
    assert!(started.elapsed() < Duration::from_millis(550));
    let names: Vec<&str> = report.entries().iter().map(|e| e.probe.name.as_str()).collect();
    assert_eq!(names, ["free-0", "free-1", "free-2", "free-3", "mutating"]);
    // A completed network action with no denial is a crossing.
    assert_eq!(report.counts().succeeded, 4);
    assert_eq!(report.verdict(), Verdict::BoundaryViolationsFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn journal_receives_each_entry_then_verdict() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.jsonl");
    let probes = [
        Arc::new(Scripted::new("a", Category::Filesystem, Script::Return(denied("EACCES")))),
        Arc::new(Scripted::new("b", Category::ProcessControl, Script::Return(exited(0)))),
    ];
    let scheduled = probes.iter().map(|p| schedule(p, Duration::from_secs(1))).collect();
    let suite = Suite::new(scheduled, SuiteOptions::default()).unwrap();

    let mut scheduler = scheduler().with_journal(Box::new(JsonLinesSink::open(&path).unwrap()));
    let report = scheduler.run(&suite).await;

    let lines: Vec<serde_json::Value> = std::fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["entry"]["probe"]["name"], "a");
    assert_eq!(lines[1]["entry"]["outcome"]["kind"], "Succeeded");
    assert_eq!(lines[2]["record"], "verdict");
    assert_eq!(lines[2]["run_id"], report.run_id().to_string());
    assert_eq!(report.verdict(), Verdict::BoundaryViolationsFound);
}

#[test]
fn suite_construction_rejects_bad_input() {
    assert!(matches!(
        Suite::new(Vec::new(), SuiteOptions::default()),
        Err(ConfigError::EmptySuite)
    ));

    let a = Arc::new(Scripted::new("same", Category::Filesystem, Script::Return(denied("x"))));
    let b = Arc::new(Scripted::new("same", Category::Memory, Script::Return(denied("x"))));
    let dup = vec![schedule(&a, Duration::from_secs(1)), schedule(&b, Duration::from_secs(1))];
    assert!(matches!(
        Suite::new(dup, SuiteOptions::default()),
        Err(ConfigError::DuplicateProbe(name)) if name == "same"
    ));

    let zero = vec![schedule(&a, Duration::ZERO)];
    assert!(matches!(
        Suite::new(zero, SuiteOptions::default()),
        Err(ConfigError::InvalidValue { .. })
    ));

    let workers = vec![schedule(&a, Duration::from_secs(1))];
    let options = SuiteOptions {
        concurrent: true,
        max_workers: 0,
    };
    assert!(Suite::new(workers, options).is_err());
}
