//! The fuzz loop.
//!
//! Each iteration draws a case seed from the run's single random stream,
//! generates a case, executes it, classifies the result and records it. The
//! loop checks its budget and the cancel flag before every iteration, so no
//! iteration starts after the time budget has elapsed.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classify::{Classification, Classifier};
use crate::config::FuzzConfig;
use crate::error::Result;
use crate::generate::{CaseGenerator, FuzzCase};
use crate::harness::{CancelToken, ExecutionResult, Executor};
use crate::report::{self, Aggregator, FuzzRun};
use crate::rng;

/// Iteration and time limits for a run. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Budget {
    /// Stop after this many iterations.
    pub max_iterations: Option<u64>,
    /// Start no iteration after this much time.
    pub max_time: Option<Duration>,
}

impl Budget {
    /// No limits; the run ends only when interrupted.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_iterations: None,
            max_time: None,
        }
    }

    /// Limit the run to `n` iterations.
    #[must_use]
    pub const fn iterations(n: u64) -> Self {
        Self {
            max_iterations: Some(n),
            max_time: None,
        }
    }

    /// Limit the run to `limit` of wall-clock time.
    #[must_use]
    pub const fn time(limit: Duration) -> Self {
        Self {
            max_iterations: None,
            max_time: Some(limit),
        }
    }

    /// Budget from command-line values, where negative means unbounded.
    #[must_use]
    pub fn from_cli(iterations: i64, time_secs: i64) -> Self {
        Self {
            max_iterations: u64::try_from(iterations).ok(),
            max_time: u64::try_from(time_secs).ok().map(Duration::from_secs),
        }
    }

    /// Check whether neither limit is set.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.max_iterations.is_none() && self.max_time.is_none()
    }

    /// Fraction of the budget used, by whichever limit is closer.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self, iterations: u64, elapsed: Duration) -> Option<f64> {
        let by_count = self.max_iterations.map(|max| {
            if max == 0 {
                1.0
            } else {
                iterations as f64 / max as f64
            }
        });
        let by_time = self.max_time.map(|max| {
            if max.is_zero() {
                1.0
            } else {
                elapsed.as_secs_f64() / max.as_secs_f64()
            }
        });
        match (by_count, by_time) {
            (Some(a), Some(b)) => Some(a.max(b).min(1.0)),
            (a, b) => a.or(b).map(|p| p.min(1.0)),
        }
    }

    fn exhausted(&self, iterations: u64, elapsed: Duration) -> Option<StopReason> {
        if self.max_iterations.is_some_and(|max| iterations >= max) {
            return Some(StopReason::IterationBudget);
        }
        if self.max_time.is_some_and(|max| elapsed >= max) {
            return Some(StopReason::TimeBudget);
        }
        None
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_iterations {
            Some(n) => write!(f, "{n} iterations")?,
            None => f.write_str("unbounded iterations")?,
        }
        match self.max_time {
            Some(t) => write!(f, ", {}s", t.as_secs()),
            None => f.write_str(", unbounded time"),
        }
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The iteration budget was used up.
    IterationBudget,
    /// The time budget elapsed.
    TimeBudget,
    /// Cancellation was requested.
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::IterationBudget => "iteration budget reached",
            StopReason::TimeBudget => "time budget reached",
            StopReason::Interrupted => "interrupted",
        })
    }
}

/// Where the run seed came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedSource {
    /// Set in the configuration.
    Configured,
    /// Derived from the clock and process id.
    Entropy,
}

impl fmt::Display for SeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SeedSource::Configured => "configured",
            SeedSource::Entropy => "entropy",
        })
    }
}

/// What the progress observer sees after each recorded iteration.
#[derive(Debug, Clone, Copy)]
pub struct IterationEvent<'a> {
    /// The executed case.
    pub case: &'a FuzzCase,
    /// What the harness observed.
    pub result: &'a ExecutionResult,
    /// The verdict.
    pub classification: &'a Classification,
    /// Iterations recorded so far, including this one.
    pub iterations: u64,
    /// Time since the run started.
    pub elapsed: Duration,
}

/// Drives generation, execution, classification and recording.
#[derive(Debug)]
pub struct Fuzzer<E> {
    config: FuzzConfig,
    executor: E,
    generator: CaseGenerator,
    classifier: Classifier,
    cancel: CancelToken,
}

impl<E: Executor> Fuzzer<E> {
    /// Create a fuzzer for a configuration and executor.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: FuzzConfig, executor: E, cancel: CancelToken) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            generator: CaseGenerator::from_config(&config),
            classifier: Classifier::from_config(&config),
            config,
            executor,
            cancel,
        })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &FuzzConfig {
        &self.config
    }

    /// The case generator in use.
    #[must_use]
    pub fn generator(&self) -> &CaseGenerator {
        &self.generator
    }

    /// Execute and classify a single case outside the loop.
    pub fn run_case(&mut self, case: &FuzzCase) -> (ExecutionResult, Classification) {
        let result = self.executor.execute(&case.map, &case.actions);
        let classification = self.classifier.classify(&result);
        (result, classification)
    }

    /// Run the loop until the budget is used up or cancellation is requested.
    ///
    /// `observer` is called after every recorded iteration.
    ///
    /// # Errors
    ///
    /// Returns an error only if case generation fails, which a validated
    /// configuration prevents.
    pub fn run(
        &mut self,
        budget: Budget,
        mut observer: impl FnMut(&IterationEvent<'_>),
    ) -> Result<FuzzRun> {
        let (seed, seed_source) = match self.config.seed {
            Some(seed) => (seed, SeedSource::Configured),
            None => (rng::entropy_seed(), SeedSource::Entropy),
        };
        info!(seed, source = %seed_source, tier = %self.generator.tier(), %budget, "starting fuzz run");
        if budget.is_unbounded() {
            warn!("no iteration or time budget, running until interrupted");
        }

        let mut cases = self.generator.stream(seed);
        let mut stats = Aggregator::from_config(&self.config);
        let start = Instant::now();
        let mut last_partial = start;
        let mut iterations = 0u64;

        let stop_reason = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Interrupted;
            }
            if let Some(reason) = budget.exhausted(iterations, start.elapsed()) {
                break reason;
            }

            let case = cases.next_case()?;
            debug!(
                iteration = case.iteration,
                seed = case.seed,
                width = case.map.width(),
                height = case.map.height(),
                actions = %case.actions,
                "generated case"
            );

            let result = self.executor.execute(&case.map, &case.actions);
            if result.interrupted {
                debug!(iteration = case.iteration, "discarding interrupted execution");
                break StopReason::Interrupted;
            }

            let classification = self.classifier.classify(&result);
            if classification.verdict.is_interesting() {
                info!(
                    iteration = case.iteration,
                    seed = case.seed,
                    verdict = %classification.verdict,
                    reason = %classification.reason,
                    "interesting case"
                );
            } else {
                debug!(iteration = case.iteration, verdict = %classification.verdict, "case finished");
            }

            if let Some(retained) = stats.record(&case, &result, &classification)
                && self.config.save_cases
                && let Err(err) = report::save_case(&self.config.cases_dir(), retained)
            {
                warn!(iteration = case.iteration, error = %err, "failed to save case");
            }
            iterations += 1;

            observer(&IterationEvent {
                case: &case,
                result: &result,
                classification: &classification,
                iterations,
                elapsed: start.elapsed(),
            });

            if let Some(interval) = self.config.partial_report_interval()
                && last_partial.elapsed() >= interval
            {
                last_partial = Instant::now();
                let snapshot = FuzzRun {
                    config: self.config.clone(),
                    seed,
                    seed_source,
                    budget,
                    stats: stats.clone(),
                    iterations,
                    elapsed: start.elapsed(),
                    stop_reason: None,
                };
                let path = self.config.report_path(true);
                if let Err(err) = report::write_report(&snapshot, &path) {
                    warn!(path = %path.display(), error = %err, "failed to write partial report");
                }
            }
        };

        let elapsed = start.elapsed();
        info!(iterations, ?elapsed, reason = %stop_reason, "fuzz run finished");

        Ok(FuzzRun {
            config: self.config.clone(),
            seed,
            seed_source,
            budget,
            stats,
            iterations,
            elapsed,
            stop_reason: Some(stop_reason),
        })
    }
}
