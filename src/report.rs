//! Run statistics and reports.
//!
//! The [`Aggregator`] keeps a verdict histogram per tier, a bounded FIFO of
//! interesting cases and counts for a bounded set of failure signatures. A finished or
//! in-progress run is captured as a [`FuzzRun`] and rendered to Markdown.

mod markdown;

pub use markdown::render_markdown;

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use crate::classify::{Classification, Verdict};
use crate::config::FuzzConfig;
use crate::fuzzer::{Budget, SeedSource, StopReason};
use crate::generate::{ActionSequence, FuzzCase, MapSpec, Tier};
use crate::harness::{ExecutionResult, ExitKind};

/// Characters kept from the first output line when grouping failures.
pub const SIGNATURE_LEN: usize = 50;

/// Distinct failure signatures tracked per run. Later new signatures are only
/// counted in [`Aggregator::other_signatures`].
pub const MAX_SIGNATURES: usize = 256;

/// Verdict counts per tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Histogram {
    counts: BTreeMap<(Tier, Verdict), u64>,
}

impl Histogram {
    /// Count one verdict.
    pub fn record(&mut self, tier: Tier, verdict: Verdict) {
        *self.counts.entry((tier, verdict)).or_insert(0) += 1;
    }

    /// Count for one cell.
    #[must_use]
    pub fn get(&self, tier: Tier, verdict: Verdict) -> u64 {
        self.counts.get(&(tier, verdict)).copied().unwrap_or(0)
    }

    /// Count for one tier across all verdicts.
    #[must_use]
    pub fn tier_total(&self, tier: Tier) -> u64 {
        Verdict::ALL.iter().map(|&v| self.get(tier, v)).sum()
    }

    /// Count for one verdict across all tiers.
    #[must_use]
    pub fn verdict_total(&self, verdict: Verdict) -> u64 {
        Tier::ALL.iter().map(|&t| self.get(t, verdict)).sum()
    }

    /// Total recorded.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Tiers with at least one recorded verdict, weakest first.
    pub fn tiers(&self) -> impl Iterator<Item = Tier> + '_ {
        Tier::ALL.into_iter().filter(|&t| self.tier_total(t) > 0)
    }
}

/// An interesting case kept for the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedCase {
    /// Iteration that produced the case.
    pub iteration: u64,
    /// Case seed.
    pub seed: u64,
    /// Generation tier.
    pub tier: Tier,
    /// Verdict.
    pub verdict: Verdict,
    /// Classification reason.
    pub reason: String,
    /// How the target ended, if it did.
    pub exit: Option<ExitKind>,
    /// Execution time.
    pub duration: Duration,
    /// The map.
    pub map: MapSpec,
    /// The action script.
    pub actions: ActionSequence,
    /// Start of the combined output.
    pub output_excerpt: String,
    /// The output was longer than the excerpt.
    pub output_truncated: bool,
}

/// Running totals for a fuzzing run.
#[derive(Debug, Clone)]
pub struct Aggregator {
    histogram: Histogram,
    retained: VecDeque<RetainedCase>,
    retain_capacity: usize,
    evicted: u64,
    signatures: BTreeMap<String, u64>,
    other_signatures: u64,
    excerpt_len: usize,
}

impl Aggregator {
    /// Create an aggregator keeping at most `retain_capacity` cases with
    /// output excerpts of `excerpt_len` characters.
    #[must_use]
    pub fn new(retain_capacity: usize, excerpt_len: usize) -> Self {
        Self {
            histogram: Histogram::default(),
            retained: VecDeque::with_capacity(retain_capacity.min(1024)),
            retain_capacity,
            evicted: 0,
            signatures: BTreeMap::new(),
            other_signatures: 0,
            excerpt_len,
        }
    }

    /// Aggregator sized by the configuration.
    #[must_use]
    pub fn from_config(config: &FuzzConfig) -> Self {
        Self::new(config.retain_capacity, config.output_excerpt_len)
    }

    /// Record one classified execution.
    ///
    /// Returns the retained copy when the case is interesting and was kept.
    pub fn record(
        &mut self,
        case: &FuzzCase,
        result: &ExecutionResult,
        classification: &Classification,
    ) -> Option<&RetainedCase> {
        self.histogram.record(case.tier, classification.verdict);
        if !classification.verdict.is_interesting() {
            return None;
        }

        let output = result.combined_output();
        self.count_signature(failure_signature(&output, &classification.reason));

        if self.retain_capacity == 0 {
            self.evicted += 1;
            return None;
        }
        if self.retained.len() >= self.retain_capacity {
            self.retained.pop_front();
            self.evicted += 1;
        }

        let (output_excerpt, output_truncated) = truncate_chars(&output, self.excerpt_len);
        self.retained.push_back(RetainedCase {
            iteration: case.iteration,
            seed: case.seed,
            tier: case.tier,
            verdict: classification.verdict,
            reason: classification.reason.clone(),
            exit: result.exit,
            duration: result.duration,
            map: case.map.clone(),
            actions: case.actions.clone(),
            output_excerpt,
            output_truncated,
        });
        self.retained.back()
    }

    fn count_signature(&mut self, signature: String) {
        if let Some(count) = self.signatures.get_mut(&signature) {
            *count += 1;
        } else if self.signatures.len() < MAX_SIGNATURES {
            self.signatures.insert(signature, 1);
        } else {
            self.other_signatures += 1;
        }
    }

    /// Verdict histogram.
    #[must_use]
    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// Retained cases, oldest first.
    pub fn retained(&self) -> impl ExactSizeIterator<Item = &RetainedCase> {
        self.retained.iter()
    }

    /// Interesting cases dropped because the retention buffer was full.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Failure signatures, most frequent first.
    #[must_use]
    pub fn signatures(&self) -> Vec<(&str, u64)> {
        let mut sorted: Vec<(&str, u64)> = self
            .signatures
            .iter()
            .map(|(sig, &count)| (sig.as_str(), count))
            .collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        sorted
    }

    /// Interesting cases whose signature was new after [`MAX_SIGNATURES`]
    /// distinct ones had been seen.
    #[must_use]
    pub fn other_signatures(&self) -> u64 {
        self.other_signatures
    }
}

/// A run snapshot: everything the report needs.
#[derive(Debug, Clone)]
pub struct FuzzRun {
    /// Configuration the run used.
    pub config: FuzzConfig,
    /// Run seed.
    pub seed: u64,
    /// Where the seed came from.
    pub seed_source: SeedSource,
    /// Limits the run was started with.
    pub budget: Budget,
    /// Statistics.
    pub stats: Aggregator,
    /// Iterations recorded.
    pub iterations: u64,
    /// Wall-clock time.
    pub elapsed: Duration,
    /// Why the run ended. `None` while it is still running.
    pub stop_reason: Option<StopReason>,
}

/// Render `run` and write it to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write_report(run: &FuzzRun, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_markdown(run))
}

/// Save a retained case as `<iteration>-<verdict>.map` and `.actions` in `dir`.
///
/// # Errors
///
/// Returns an error if the directory or files cannot be written.
pub fn save_case(dir: &Path, case: &RetainedCase) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let stem = format!("{}-{}", case.iteration, case.verdict.label());
    fs::write(dir.join(format!("{stem}.map")), case.map.render())?;
    fs::write(dir.join(format!("{stem}.actions")), case.actions.render())
}

/// First non-empty output line cut to [`SIGNATURE_LEN`] characters, or the
/// classification reason when there is no output.
fn failure_signature(output: &str, reason: &str) -> String {
    let Some(line) = output.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return reason.to_string();
    };
    match truncate_chars(line, SIGNATURE_LEN) {
        (mut cut, true) => {
            cut.push_str("...");
            cut
        }
        (whole, false) => whole,
    }
}

fn truncate_chars(text: &str, max: usize) -> (String, bool) {
    match text.char_indices().nth(max) {
        Some((idx, _)) => (text[..idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(iteration: u64) -> FuzzCase {
        FuzzCase {
            iteration,
            seed: iteration * 10,
            tier: Tier::Glyphs,
            map: MapSpec::parse("W0\nMF\n").unwrap(),
            actions: ActionSequence::parse("SUE").unwrap(),
        }
    }

    fn classified(verdict: Verdict) -> Classification {
        Classification {
            verdict,
            reason: format!("{verdict} reason"),
        }
    }

    #[test]
    fn test_histogram_totals() {
        let mut h = Histogram::default();
        h.record(Tier::Glyphs, Verdict::Normal);
        h.record(Tier::Glyphs, Verdict::Crash);
        h.record(Tier::Playable, Verdict::Crash);

        assert_eq!(h.total(), 3);
        assert_eq!(h.get(Tier::Glyphs, Verdict::Crash), 1);
        assert_eq!(h.tier_total(Tier::Glyphs), 2);
        assert_eq!(h.verdict_total(Verdict::Crash), 2);
        assert_eq!(h.tiers().collect::<Vec<_>>(), vec![Tier::Glyphs, Tier::Playable]);
    }

    #[test]
    fn test_normal_cases_not_retained() {
        let mut agg = Aggregator::new(10, 100);
        let kept = agg.record(&case(0), &ExecutionResult::exited(0), &classified(Verdict::Normal));
        assert!(kept.is_none());
        assert_eq!(agg.retained().len(), 0);
        assert!(agg.signatures().is_empty());
        assert_eq!(agg.histogram().total(), 1);
    }

    #[test]
    fn test_retention_is_fifo() {
        let mut agg = Aggregator::new(2, 100);
        for i in 0..5 {
            agg.record(&case(i), &ExecutionResult::exited(1), &classified(Verdict::Crash));
        }
        let kept: Vec<u64> = agg.retained().map(|c| c.iteration).collect();
        assert_eq!(kept, vec![3, 4]);
        assert_eq!(agg.evicted(), 3);
        assert_eq!(agg.histogram().total(), 5);
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let mut agg = Aggregator::new(0, 100);
        assert!(
            agg.record(&case(0), &ExecutionResult::exited(1), &classified(Verdict::Crash))
                .is_none()
        );
        assert_eq!(agg.evicted(), 1);
        assert_eq!(agg.signatures().len(), 1);
    }

    #[test]
    fn test_signatures_grouped_and_sorted() {
        let mut agg = Aggregator::new(10, 100);
        let npe = ExecutionResult {
            stderr: "\n  Exception in thread \"main\" java.lang.NullPointerException at Foo\nmore".into(),
            ..ExecutionResult::exited(1)
        };
        agg.record(&case(0), &npe, &classified(Verdict::Crash));
        agg.record(&case(1), &npe, &classified(Verdict::Crash));
        agg.record(&case(2), &ExecutionResult::default(), &classified(Verdict::Hang));

        let sigs = agg.signatures();
        assert_eq!(sigs.len(), 2);
        assert_eq!(sigs[0].1, 2);
        assert_eq!(sigs[0].0.chars().count(), SIGNATURE_LEN + 3);
        assert!(sigs[0].0.starts_with("Exception in thread"));
        assert!(sigs[0].0.ends_with("..."));
        assert_eq!(sigs[1], ("hang reason", 1));
    }

    #[test]
    fn test_signature_count_is_bounded() {
        let mut agg = Aggregator::new(4, 100);
        let extra = 10;
        for i in 0..(MAX_SIGNATURES as u64 + extra) {
            let echo = ExecutionResult {
                stdout: format!("unique line {i}\n"),
                ..ExecutionResult::exited(1)
            };
            agg.record(&case(i), &echo, &classified(Verdict::Crash));
        }
        // known signatures keep counting once the table is full
        let repeat = ExecutionResult {
            stdout: "unique line 0\n".into(),
            ..ExecutionResult::exited(1)
        };
        agg.record(&case(0), &repeat, &classified(Verdict::Crash));

        assert_eq!(agg.signatures().len(), MAX_SIGNATURES);
        assert_eq!(agg.signatures()[0], ("unique line 0", 2));
        assert_eq!(agg.other_signatures(), extra);
        let counted: u64 = agg.signatures().iter().map(|&(_, n)| n).sum();
        assert_eq!(counted + agg.other_signatures(), agg.histogram().total());
    }

    #[test]
    fn test_output_excerpt_bounded() {
        let mut agg = Aggregator::new(10, 5);
        let result = ExecutionResult {
            stdout: "héllo world".into(),
            ..ExecutionResult::exited(3)
        };
        let kept = agg
            .record(&case(0), &result, &classified(Verdict::Crash))
            .unwrap();
        assert_eq!(kept.output_excerpt, "héllo");
        assert!(kept.output_truncated);
        assert_eq!(kept.exit, Some(ExitKind::Code(3)));
    }

    #[test]
    fn test_save_case_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut agg = Aggregator::new(10, 100);
        let kept = agg
            .record(&case(7), &ExecutionResult::exited(1), &classified(Verdict::Crash))
            .unwrap()
            .clone();
        let cases = dir.path().join("cases");
        save_case(&cases, &kept).unwrap();

        assert_eq!(fs::read_to_string(cases.join("7-crash.map")).unwrap(), "W0\nMF\n");
        assert_eq!(fs::read_to_string(cases.join("7-crash.actions")).unwrap(), "SUE");
    }
}
