// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Suite Scheduler: runs an ordered list of probes and collects one report
//! entry per probe, in list order.
//!
//! Sequential by default. In concurrent mode the side-effect-free probes run
//! first on a bounded worker pool, then the remaining probes run one at a
//! time in list order, so no two resource-mutating probes ever overlap.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, Span};
use uuid::Uuid;

use crate::config::{EnvConfig, SandboxLimits, SuiteDefinition};
use crate::environment::HostSnapshot;
use crate::error::{ConfigError, HarnessFault};
use crate::journal::ReportSink;
use crate::outcome::OutcomeKind;
use crate::probe::{build_probe, Category, Probe, ProbeDescriptor};
use crate::runner::{Execution, ProbeRunner};
use crate::telemetry::{log_security_event, ProbeSpan, SecurityEvent, SpanExt};
use crate::verdict::{ReportEntry, SuiteReport};

/// A probe with its budget and the descriptor reported for it.
#[derive(Clone)]
pub struct ScheduledProbe {
    probe: Arc<dyn Probe>,
    descriptor: ProbeDescriptor,
    budget: Duration,
}

impl std::fmt::Debug for ScheduledProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledProbe")
            .field("descriptor", &self.descriptor)
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

impl ScheduledProbe {
    pub fn new(probe: Arc<dyn Probe>, budget: Duration) -> Self {
        let descriptor = probe.describe();
        Self {
            probe,
            descriptor,
            budget,
        }
    }

    /// Override the probe's expected-outcome hint.
    pub fn expecting(mut self, expected: Option<OutcomeKind>) -> Self {
        self.descriptor.expected = expected;
        self
    }

    pub fn descriptor(&self) -> &ProbeDescriptor {
        &self.descriptor
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuiteOptions {
    pub concurrent: bool,
    pub max_workers: usize,
}

impl Default for SuiteOptions {
    fn default() -> Self {
        Self {
            concurrent: false,
            max_workers: 1,
        }
    }
}

/// A validated, ordered set of probes.
#[derive(Debug)]
pub struct Suite {
    probes: Vec<ScheduledProbe>,
    options: SuiteOptions,
    sandbox: SandboxLimits,
}

impl Suite {
    pub fn new(probes: Vec<ScheduledProbe>, options: SuiteOptions) -> Result<Self, ConfigError> {
        if probes.is_empty() {
            return Err(ConfigError::EmptySuite);
        }
        if options.max_workers == 0 {
            return Err(ConfigError::invalid("max-workers", "must be at least 1"));
        }
        let mut names = HashSet::new();
        for scheduled in &probes {
            let name = &scheduled.descriptor.name;
            if !names.insert(name.clone()) {
                return Err(ConfigError::DuplicateProbe(name.clone()));
            }
            if scheduled.budget.is_zero() {
                return Err(ConfigError::invalid(
                    format!("probes.{name}.budget-ms"),
                    "must be greater than zero",
                ));
            }
        }
        warn_on_destructive_order(&probes);

        Ok(Self {
            probes,
            options,
            sandbox: SandboxLimits::default(),
        })
    }

    /// Resolve a suite definition. Values in the definition override the
    /// environment.
    pub fn from_definition(def: &SuiteDefinition, env: &EnvConfig) -> Result<Self, ConfigError> {
        let default_budget = match def.budget_ms {
            Some(0) => return Err(ConfigError::invalid("budget-ms", "must be greater than zero")),
            Some(ms) => Duration::from_millis(ms),
            None => env.default_budget,
        };
        let options = SuiteOptions {
            concurrent: def.concurrent.unwrap_or(env.concurrent),
            max_workers: def.max_workers.unwrap_or(env.max_workers),
        };
        let filter = def
            .category_filter
            .iter()
            .map(|c| c.parse::<Category>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut probes = Vec::new();
        for entry in def.entries() {
            let probe = build_probe(&entry, &def.sandbox)?;
            let expectation = entry.expectation()?;
            let budget = match entry.budget_ms {
                Some(0) => {
                    return Err(ConfigError::invalid(
                        format!("probes.{}.budget-ms", entry.id),
                        "must be greater than zero",
                    ))
                }
                Some(ms) => Duration::from_millis(ms),
                None => default_budget,
            };
            let mut scheduled = ScheduledProbe::new(probe, budget);
            if !filter.is_empty() && !filter.contains(&scheduled.descriptor.category) {
                continue;
            }
            if let Some(expected) = expectation {
                scheduled = scheduled.expecting(expected);
            }
            probes.push(scheduled);
        }

        Ok(Self::new(probes, options)?.with_sandbox(def.sandbox.clone()))
    }

    pub fn with_sandbox(mut self, sandbox: SandboxLimits) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn probes(&self) -> &[ScheduledProbe] {
        &self.probes
    }

    pub fn options(&self) -> SuiteOptions {
        self.options
    }

    pub fn sandbox(&self) -> &SandboxLimits {
        &self.sandbox
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

fn warn_on_destructive_order(probes: &[ScheduledProbe]) {
    let last_safe = probes
        .iter()
        .rposition(|p| !p.descriptor.category.is_destructive());
    let first_destructive = probes
        .iter()
        .position(|p| p.descriptor.category.is_destructive());
    if let (Some(first), Some(last)) = (first_destructive, last_safe) {
        if first < last {
            log_security_event(
                SecurityEvent::DestructiveOrdering,
                "destructive probe runs before non-destructive probes; later results may be lost",
                &[
                    ("probe", probes[first].descriptor.name.as_str()),
                    ("followed_by", probes[last].descriptor.name.as_str()),
                ],
            );
        }
    }
}

/// Runs suites and owns the resulting reports.
pub struct SuiteScheduler {
    runner: ProbeRunner,
    journal: Option<Box<dyn ReportSink>>,
    capture_host: bool,
}

impl SuiteScheduler {
    pub fn new(runner: ProbeRunner) -> Self {
        Self {
            runner,
            journal: None,
            capture_host: true,
        }
    }

    /// Write each entry to `sink` as soon as it is available.
    pub fn with_journal(mut self, sink: Box<dyn ReportSink>) -> Self {
        self.journal = Some(sink);
        self
    }

    pub fn capture_host(mut self, capture: bool) -> Self {
        self.capture_host = capture;
        self
    }

    pub async fn run(&mut self, suite: &Suite) -> SuiteReport {
        let run_id = Uuid::new_v4();
        let run_label = run_id.to_string();
        let started_at = Utc::now();
        let options = suite.options();
        let total = suite.len().to_string();
        log_security_event(
            SecurityEvent::SuiteStarted,
            "probe suite started",
            &[("run_id", run_label.as_str()), ("probes", total.as_str())],
        );

        let spans: Vec<Span> = suite
            .probes
            .iter()
            .map(|p| ProbeSpan::new(&run_label, &p.descriptor.name, p.descriptor.category.as_str()))
            .collect();
        let mut slots: Vec<Option<ReportEntry>> = vec![None; suite.len()];

        if options.concurrent {
            self.run_pool(suite, run_id, &spans, &mut slots).await;
        }

        for (index, scheduled) in suite.probes.iter().enumerate() {
            if slots[index].is_some() {
                continue;
            }
            let mut execution = self
                .runner
                .execute(scheduled.probe.clone(), scheduled.budget)
                .instrument(spans[index].clone())
                .await;
            execution.settle().await;
            slots[index] = Some(self.complete(run_id, index, scheduled, &spans[index], execution));
        }

        let entries = slots
            .into_iter()
            .zip(&suite.probes)
            .map(|(slot, scheduled)| {
                slot.unwrap_or_else(|| {
                    let fault = HarnessFault::WorkerLost("no result recorded".to_string());
                    let execution = Execution::harness_failure(scheduled.descriptor.clone(), fault);
                    ReportEntry::new(scheduled.descriptor.clone(), execution.outcome(), execution.cleanup)
                })
            })
            .collect();

        let host = self.capture_host.then(HostSnapshot::capture);
        let declared = (!suite.sandbox.is_empty()).then(|| suite.sandbox.clone());
        let report = SuiteReport::new(run_id, started_at, entries, host, declared);

        if let Some(journal) = self.journal.as_mut() {
            if let Err(e) = journal.finish(&report) {
                tracing::warn!(error = %e, "failed to journal verdict");
            }
        }
        log_security_event(
            SecurityEvent::SuiteFinished,
            "probe suite finished",
            &[("run_id", run_label.as_str()), ("verdict", report.verdict().as_str())],
        );
        report
    }

    /// Run the side-effect-free probes on a pool of `max_workers`.
    async fn run_pool(
        &mut self,
        suite: &Suite,
        run_id: Uuid,
        spans: &[Span],
        slots: &mut [Option<ReportEntry>],
    ) {
        let semaphore = Arc::new(Semaphore::new(suite.options.max_workers));
        let mut set = JoinSet::new();

        for (index, scheduled) in suite.probes.iter().enumerate() {
            if !scheduled.descriptor.side_effect_free {
                continue;
            }
            let semaphore = semaphore.clone();
            let runner = self.runner.clone();
            let probe = scheduled.probe.clone();
            let descriptor = scheduled.descriptor.clone();
            let budget = scheduled.budget;
            set.spawn(
                async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return (index, Execution::harness_failure(descriptor, HarnessFault::PoolClosed));
                    };
                    let mut execution = runner.execute(probe, budget).await;
                    execution.settle().await;
                    (index, execution)
                }
                .instrument(spans[index].clone()),
            );
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, execution)) => {
                    let scheduled = &suite.probes[index];
                    slots[index] = Some(self.complete(run_id, index, scheduled, &spans[index], execution));
                }
                // The slot stays empty and is reported as a lost worker.
                Err(e) => tracing::error!(error = %e, "pooled probe task failed"),
            }
        }
    }

    fn complete(
        &mut self,
        run_id: Uuid,
        index: usize,
        scheduled: &ScheduledProbe,
        span: &Span,
        execution: Execution,
    ) -> ReportEntry {
        let outcome = execution.outcome();
        span.record_outcome(&outcome, execution.cleanup);

        let event = if scheduled.descriptor.control {
            SecurityEvent::for_control(outcome.kind)
        } else {
            SecurityEvent::for_outcome(outcome.kind, &outcome.raw)
        };
        let elapsed_ms = outcome.elapsed.as_millis().to_string();
        log_security_event(
            event,
            &outcome.explanation,
            &[
                ("probe", scheduled.descriptor.name.as_str()),
                ("category", scheduled.descriptor.category.as_str()),
                ("outcome", outcome.kind.as_str()),
                ("elapsed_ms", elapsed_ms.as_str()),
            ],
        );

        let entry = ReportEntry::new(scheduled.descriptor.clone(), outcome, execution.cleanup);
        if let Some(journal) = self.journal.as_mut() {
            if let Err(e) = journal.record(run_id, index, &entry) {
                tracing::warn!(probe = %scheduled.descriptor.name, error = %e, "failed to journal entry");
            }
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbeEntry;
    use crate::outcome::{ProbeValue, RawResult};
    use crate::probe::ProbeContext;
    use crate::runner::RunnerConfig;

    struct Fixed {
        name: &'static str,
        category: Category,
        result: RawResult,
        free: bool,
    }

    impl Probe for Fixed {
        fn describe(&self) -> ProbeDescriptor {
            let d = ProbeDescriptor::new(self.name, self.category);
            if self.free {
                d.side_effect_free()
            } else {
                d
            }
        }

        fn run(&self, _ctx: &ProbeContext) -> RawResult {
            self.result.clone()
        }

        fn cleanup(&self) {}
    }

    fn fixed(name: &'static str, category: Category, free: bool) -> ScheduledProbe {
        ScheduledProbe::new(
            Arc::new(Fixed {
                name,
                category,
                result: RawResult::Value(ProbeValue::Exit { code: 0 }),
                free,
            }),
            Duration::from_secs(1),
        )
    }

    fn env() -> EnvConfig {
        EnvConfig {
            default_budget: Duration::from_millis(750),
            max_workers: 2,
            concurrent: false,
            cleanup_grace: Duration::from_millis(10),
            cleanup_bound: Duration::from_millis(100),
            log_format: crate::telemetry::LogFormat::Json,
            log_level: "info".into(),
            suite_path: None,
        }
    }

    #[test]
    fn test_empty_suite_is_rejected() {
        assert!(matches!(
            Suite::new(Vec::new(), SuiteOptions::default()),
            Err(ConfigError::EmptySuite)
        ));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let probes = vec![
            fixed("a", Category::Memory, false),
            fixed("a", Category::Network, false),
        ];
        assert!(matches!(
            Suite::new(probes, SuiteOptions::default()),
            Err(ConfigError::DuplicateProbe(name)) if name == "a"
        ));
    }

    #[test]
    fn test_definition_budgets_and_filter() {
        let mut egress = ProbeEntry::new("egress");
        egress.budget_ms = Some(200);
        let def = SuiteDefinition {
            category_filter: vec!["network".into(), "filesystem".into()],
            probes: vec![ProbeEntry::new("memory-ceiling"), egress, ProbeEntry::new("fs-write")],
            ..SuiteDefinition::default()
        };
        let suite = Suite::from_definition(&def, &env()).unwrap();
        let names: Vec<&str> = suite.probes().iter().map(|p| p.descriptor().name.as_str()).collect();
        assert_eq!(names, vec!["egress", "fs-write"]);
        assert_eq!(suite.probes()[0].budget(), Duration::from_millis(200));
        assert_eq!(suite.probes()[1].budget(), Duration::from_millis(750));
    }

    #[test]
    fn test_filter_that_selects_nothing_is_empty_suite() {
        let def = SuiteDefinition {
            category_filter: vec!["memory".into()],
            probes: vec![ProbeEntry::new("egress")],
            ..SuiteDefinition::default()
        };
        assert!(matches!(Suite::from_definition(&def, &env()), Err(ConfigError::EmptySuite)));
    }

    #[test]
    fn test_zero_budget_is_config_error() {
        let def = SuiteDefinition {
            budget_ms: Some(0),
            ..SuiteDefinition::default()
        };
        assert!(matches!(
            Suite::from_definition(&def, &env()),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_expectation_override() {
        let mut entry = ProbeEntry::new("egress");
        entry.expect = Some("succeeded".into());
        let def = SuiteDefinition {
            probes: vec![entry],
            ..SuiteDefinition::default()
        };
        let suite = Suite::from_definition(&def, &env()).unwrap();
        assert_eq!(suite.probes()[0].descriptor().expected, Some(OutcomeKind::Succeeded));
    }

    #[tokio::test]
    async fn test_concurrent_mode_keeps_list_order() {
        let probes = vec![
            fixed("mutating-1", Category::Filesystem, false),
            fixed("free-1", Category::Network, true),
            fixed("mutating-2", Category::Memory, false),
            fixed("free-2", Category::Network, true),
        ];
        let suite = Suite::new(
            probes,
            SuiteOptions {
                concurrent: true,
                max_workers: 2,
            },
        )
        .unwrap();
        let mut scheduler = SuiteScheduler::new(ProbeRunner::new(RunnerConfig::default())).capture_host(false);
        let report = scheduler.run(&suite).await;

        let names: Vec<&str> = report.entries().iter().map(|e| e.probe.name.as_str()).collect();
        assert_eq!(names, vec!["mutating-1", "free-1", "mutating-2", "free-2"]);
    }
}
