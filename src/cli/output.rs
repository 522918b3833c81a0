//! Output formatting utilities for CLI.

use mazefuzz::{Classification, ExecutionResult, ExitKind, FuzzCase, FuzzRun, Tier, Verdict};
use serde::Serialize;

/// JSON-serializable run summary.
#[derive(Debug, Serialize)]
pub(super) struct JsonRunSummary {
    /// Run seed.
    seed: u64,
    /// "configured" or "entropy".
    seed_source: mazefuzz::SeedSource,
    /// Iterations executed.
    iterations: u64,
    /// Wall-clock seconds.
    elapsed_secs: f64,
    /// Why the run ended.
    stop_reason: Option<mazefuzz::StopReason>,
    /// Verdict counts per tier.
    tiers: Vec<JsonTierCounts>,
    /// Interesting cases kept.
    retained: usize,
    /// Interesting cases dropped from the retention buffer.
    evicted: u64,
    /// Failure signatures, most frequent first.
    signatures: Vec<JsonSignature>,
    /// Interesting cases past the distinct-signature limit.
    other_signatures: u64,
}

/// JSON-serializable verdict counts for one tier.
#[derive(Debug, Serialize)]
struct JsonTierCounts {
    /// Tier index (0-3).
    tier: u8,
    /// Normal verdicts.
    normal: u64,
    /// Rejected verdicts.
    rejected: u64,
    /// Crash verdicts.
    crash: u64,
    /// Hang verdicts.
    hang: u64,
}

/// JSON-serializable failure signature.
#[derive(Debug, Serialize)]
struct JsonSignature {
    /// Occurrences.
    count: u64,
    /// First output line or reason.
    signature: String,
}

impl JsonRunSummary {
    /// Create from a finished run.
    pub(super) fn from_run(run: &FuzzRun) -> Self {
        let histogram = run.stats.histogram();
        let tiers = histogram
            .tiers()
            .map(|tier| JsonTierCounts {
                tier: tier.index(),
                normal: histogram.get(tier, Verdict::Normal),
                rejected: histogram.get(tier, Verdict::Rejected),
                crash: histogram.get(tier, Verdict::Crash),
                hang: histogram.get(tier, Verdict::Hang),
            })
            .collect();

        Self {
            seed: run.seed,
            seed_source: run.seed_source,
            iterations: run.iterations,
            elapsed_secs: run.elapsed.as_secs_f64(),
            stop_reason: run.stop_reason,
            tiers,
            retained: run.stats.retained().len(),
            evicted: run.stats.evicted(),
            signatures: run
                .stats
                .signatures()
                .into_iter()
                .map(|(signature, count)| JsonSignature {
                    count,
                    signature: signature.to_string(),
                })
                .collect(),
            other_signatures: run.stats.other_signatures(),
        }
    }
}

/// Format a finished run as human-readable text.
pub(super) fn format_run_text(run: &FuzzRun) -> String {
    let mut output = String::new();
    let histogram = run.stats.histogram();

    output.push_str(&format!(
        "Fuzz Run (seed: {}, {})\n",
        run.seed, run.seed_source
    ));
    output.push_str(&format!(
        "  Iterations: {} in {:.2}s\n",
        run.iterations,
        run.elapsed.as_secs_f64()
    ));
    if let Some(reason) = run.stop_reason {
        output.push_str(&format!("  Stopped: {reason}\n"));
    }
    output.push('\n');

    let tiers: Vec<Tier> = histogram.tiers().collect();
    for tier in &tiers {
        output.push_str(&format!("  Tier {tier}:"));
        for verdict in Verdict::ALL {
            output.push_str(&format!(" {verdict}={}", histogram.get(*tier, verdict)));
        }
        output.push('\n');
    }
    if tiers.is_empty() {
        output.push_str("  No iterations recorded\n");
    }

    let signatures = run.stats.signatures();
    if !signatures.is_empty() {
        output.push_str("\nFailure signatures:\n");
        for (signature, count) in signatures {
            output.push_str(&format!("  {count:>6}  {signature}\n"));
        }
        let other = run.stats.other_signatures();
        if other > 0 {
            output.push_str(&format!("  {other:>6}  (other signatures)\n"));
        }
    }

    output.push_str(&format!(
        "\nRetained {} interesting cases ({} evicted)\n",
        run.stats.retained().len(),
        run.stats.evicted()
    ));
    output
}

/// JSON-serializable single-case result.
#[derive(Debug, Serialize)]
pub(super) struct JsonCaseResult {
    /// Case seed, when the case was regenerated from one.
    seed: Option<u64>,
    /// Generation tier, unknown for cases read from files.
    tier: Option<Tier>,
    /// Verdict.
    verdict: Verdict,
    /// Classification reason.
    reason: String,
    /// Exit code, if the target exited.
    exit_code: Option<i32>,
    /// Terminating signal, if the target was killed.
    signal: Option<i32>,
    /// Whether the timeout fired.
    timed_out: bool,
    /// Execution seconds.
    duration_secs: f64,
    /// Map text.
    map: String,
    /// Action script.
    actions: String,
    /// Captured stdout.
    stdout: String,
    /// Captured stderr.
    stderr: String,
}

impl JsonCaseResult {
    /// Create from an executed case.
    ///
    /// The tier is reported only for cases regenerated from `seed`.
    pub(super) fn new(
        case: &FuzzCase,
        seed: Option<u64>,
        result: &ExecutionResult,
        classification: &Classification,
    ) -> Self {
        Self {
            seed,
            tier: seed.map(|_| case.tier),
            verdict: classification.verdict,
            reason: classification.reason.clone(),
            exit_code: result.exit_code(),
            signal: match result.exit {
                Some(ExitKind::Signal(signal)) => Some(signal),
                _ => None,
            },
            timed_out: result.timed_out,
            duration_secs: result.duration.as_secs_f64(),
            map: case.map.render(),
            actions: case.actions.render(),
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
        }
    }
}

/// Format an executed case as human-readable text.
pub(super) fn format_case_text(
    case: &FuzzCase,
    seed: Option<u64>,
    result: &ExecutionResult,
    classification: &Classification,
) -> String {
    let mut output = String::new();

    match seed {
        Some(seed) => output.push_str(&format!("Case (seed: {seed}, tier {})\n", case.tier)),
        None => output.push_str("Case (from files, tier unknown)\n"),
    }
    output.push_str(&format!(
        "  Verdict: {} ({})\n",
        classification.verdict, classification.reason
    ));
    match result.exit {
        Some(exit) => output.push_str(&format!("  Exit: {exit}\n")),
        None => output.push_str("  Exit: none\n"),
    }
    output.push_str(&format!(
        "  Duration: {:.3}s\n",
        result.duration.as_secs_f64()
    ));
    output.push_str(&format!("  Actions: {}\n\n", case.actions));
    output.push_str(&case.map.render());

    for (name, text) in [("stdout", &result.stdout), ("stderr", &result.stderr)] {
        if !text.is_empty() {
            output.push_str(&format!("\n--- {name} ---\n{text}"));
            if !text.ends_with('\n') {
                output.push('\n');
            }
        }
    }
    output
}

/// Format a generated case for the `generate` command.
pub(super) fn format_generated(case: &FuzzCase) -> String {
    format!(
        "# case {} (seed: {}, {}x{})\n{}actions: {}\n",
        case.iteration,
        case.seed,
        case.map.width(),
        case.map.height(),
        case.map.render(),
        case.actions
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mazefuzz::{ActionSequence, MapSpec};

    fn case() -> FuzzCase {
        FuzzCase {
            iteration: 0,
            seed: 0,
            tier: Tier::Playable,
            map: MapSpec::parse("###\n#P#\n###\n").unwrap(),
            actions: ActionSequence::parse("UDQ").unwrap(),
        }
    }

    fn normal() -> Classification {
        Classification {
            verdict: Verdict::Normal,
            reason: "exit code 0".to_string(),
        }
    }

    #[test]
    fn test_file_case_tier_is_unknown() {
        let result = ExecutionResult::exited(0);
        let text = format_case_text(&case(), None, &result, &normal());
        assert!(text.starts_with("Case (from files, tier unknown)\n"));
        assert!(!text.contains("tier 3"));

        let json = serde_json::to_value(JsonCaseResult::new(&case(), None, &result, &normal()))
            .unwrap();
        assert!(json["seed"].is_null());
        assert!(json["tier"].is_null());
    }

    #[test]
    fn test_seeded_case_reports_tier() {
        let result = ExecutionResult::exited(0);
        let text = format_case_text(&case(), Some(77), &result, &normal());
        assert!(text.starts_with(&format!("Case (seed: 77, tier {})\n", Tier::Playable)));

        let json = serde_json::to_value(JsonCaseResult::new(&case(), Some(77), &result, &normal()))
            .unwrap();
        assert_eq!(json["seed"], 77);
        assert_eq!(json["tier"], 3);
    }
}
