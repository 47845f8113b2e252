//! Classification of raw results per boundary category.

use std::time::Duration;

use boundary_probe::outcome::{Attempt, FaultKind, ProbeFault, ProbeValue, RawResult};
use boundary_probe::{classify, Category, OutcomeKind};

const T: Duration = Duration::from_millis(1);

fn kind(category: Category, raw: RawResult) -> OutcomeKind {
    classify(category, &raw, T).kind
}

#[test]
fn timeouts_depend_on_category() {
    let raw = RawResult::TimedOut { budget_ms: 100 };
    let expected = [
        (Category::Network, OutcomeKind::Blocked),
        (Category::ResourceLimit, OutcomeKind::Blocked),
        (Category::Memory, OutcomeKind::Inconclusive),
        (Category::Filesystem, OutcomeKind::Inconclusive),
        (Category::ProcessControl, OutcomeKind::Inconclusive),
        (Category::PrivilegedSyscall, OutcomeKind::Inconclusive),
    ];
    assert_eq!(expected.len(), Category::ALL.len());
    for (category, want) in expected {
        let outcome = classify(category, &raw, T);
        assert_eq!(outcome.kind, want, "{category}");
        assert!(outcome.explanation.contains("100ms"), "{category}");
    }
}

#[test]
fn unknown_effect_timeouts_are_explained() {
    let raw = RawResult::TimedOut { budget_ms: 250 };
    for category in [Category::Filesystem, Category::PrivilegedSyscall] {
        assert!(classify(category, &raw, T).explanation.contains("effect unknown"));
    }
}

#[test]
fn missing_tooling_is_inconclusive_not_blocked() {
    let raw = RawResult::Error(ProbeFault::new(FaultKind::Unavailable, "spawn /nonexistent/curll: ENOENT").with_code(2));
    for category in Category::ALL {
        assert_eq!(kind(category, raw.clone()), OutcomeKind::Inconclusive, "{category}");
    }
}

#[test]
fn signals_crash_except_process_control() {
    let raw = RawResult::Signaled { signal: 9 };
    assert_eq!(kind(Category::Memory, raw.clone()), OutcomeKind::Crashed);
    assert_eq!(kind(Category::ProcessControl, raw), OutcomeKind::Succeeded);
}

#[test]
fn panics_always_crash() {
    for category in Category::ALL {
        let raw = RawResult::Panicked { message: "boom".into() };
        assert_eq!(kind(category, raw), OutcomeKind::Crashed);
    }
}

#[test]
fn denial_faults_block_their_category() {
    let eacces = RawResult::Error(ProbeFault::new(FaultKind::PermissionDenied, "EACCES").with_code(13));
    for category in Category::ALL {
        assert_eq!(kind(category, eacces.clone()), OutcomeKind::Blocked, "{category}");
    }
    let refused = RawResult::Error(ProbeFault::new(FaultKind::ConnectionRefused, "ECONNREFUSED"));
    assert_eq!(kind(Category::Network, refused.clone()), OutcomeKind::Blocked);
    assert_eq!(kind(Category::Filesystem, refused), OutcomeKind::Inconclusive);
}

#[test]
fn any_succeeded_attempt_is_a_violation() {
    let raw = RawResult::Value(ProbeValue::Attempts {
        attempts: vec![
            Attempt::blocked("mount", "EPERM"),
            Attempt::succeeded("chroot", "entered /"),
        ],
    });
    let outcome = classify(Category::PrivilegedSyscall, &raw, T);
    assert_eq!(outcome.kind, OutcomeKind::Succeeded);
    assert!(outcome.explanation.contains("chroot"));
    assert_eq!(outcome.raw, raw);
}

#[test]
fn signal_counts() {
    let signals = |visible, signaled, denied| {
        RawResult::Value(ProbeValue::Signals {
            visible,
            signaled,
            denied,
        })
    };
    assert_eq!(kind(Category::ProcessControl, signals(0, 0, 0)), OutcomeKind::Inconclusive);
    assert_eq!(kind(Category::ProcessControl, signals(5, 1, 4)), OutcomeKind::Succeeded);
    assert_eq!(kind(Category::ProcessControl, signals(5, 0, 5)), OutcomeKind::Blocked);
}

#[test]
fn elapsed_is_carried_through() {
    let outcome = classify(Category::Network, &RawResult::TimedOut { budget_ms: 5 }, Duration::from_millis(7));
    assert_eq!(outcome.elapsed, Duration::from_millis(7));
}
