//! Markdown rendering of a [`FuzzRun`].

use std::fmt::Write;

use super::{FuzzRun, RetainedCase};
use crate::classify::Verdict;
use crate::generate::Tier;

/// Render the report for `run`.
#[must_use]
pub fn render_markdown(run: &FuzzRun) -> String {
    let mut out = String::new();

    out.push_str("# Fuzzing Report\n\n");
    if run.stop_reason.is_none() {
        out.push_str("> Partial report, the run is still in progress.\n\n");
    }

    out.push_str("## Table of Contents\n\n");
    out.push_str("* [Configuration](#configuration)\n");
    out.push_str("* [Run Parameters](#run-parameters)\n");
    out.push_str("* [Verdicts](#verdicts)\n");
    out.push_str("* [Failure Signatures](#failure-signatures)\n");
    out.push_str("* [Retained Cases](#retained-cases)\n\n");

    write_configuration(&mut out, run);
    write_parameters(&mut out, run);
    write_histogram(&mut out, run);
    write_signatures(&mut out, run);
    write_cases(&mut out, run);

    out
}

fn write_configuration(out: &mut String, run: &FuzzRun) {
    out.push_str("## Configuration\n\n```json\n");
    match serde_json::to_string_pretty(&run.config) {
        Ok(json) => out.push_str(&json),
        Err(err) => {
            let _ = write!(out, "configuration could not be serialized: {err}");
        }
    }
    out.push_str("\n```\n\n");
}

fn write_parameters(out: &mut String, run: &FuzzRun) {
    out.push_str("## Run Parameters\n\n");
    let _ = writeln!(out, "* Seed: `{}` ({})", run.seed, run.seed_source);
    let _ = writeln!(out, "* Tier: {}", run.config.tier);
    match run.budget.max_iterations {
        Some(n) => {
            let _ = writeln!(out, "* Iteration budget: {n}");
        }
        None => out.push_str("* Iteration budget: unbounded\n"),
    }
    match run.budget.max_time {
        Some(limit) => {
            let _ = writeln!(out, "* Time budget: {}s", limit.as_secs());
        }
        None => out.push_str("* Time budget: unbounded\n"),
    }
    let _ = writeln!(out, "* Iterations: {}", run.iterations);
    let _ = writeln!(out, "* Elapsed: {:.2}s", run.elapsed.as_secs_f64());
    match run.stop_reason {
        Some(reason) => {
            let _ = writeln!(out, "* Stop reason: {reason}");
        }
        None => out.push_str("* Stop reason: still running\n"),
    }
    out.push('\n');
}

fn write_histogram(out: &mut String, run: &FuzzRun) {
    let histogram = run.stats.histogram();
    out.push_str("## Verdicts\n\n");
    out.push_str("| Tier | Normal | Rejected | Crash | Hang | Total |\n");
    out.push_str("| ---- | ------ | -------- | ----- | ---- | ----- |\n");

    let mut tiers: Vec<Tier> = histogram.tiers().collect();
    if tiers.is_empty() {
        tiers.push(run.config.tier);
    }
    for tier in tiers {
        let _ = write!(out, "| {tier} |");
        for verdict in Verdict::ALL {
            let _ = write!(out, " {} |", histogram.get(tier, verdict));
        }
        let _ = writeln!(out, " {} |", histogram.tier_total(tier));
    }

    out.push_str("| **Total** |");
    for verdict in Verdict::ALL {
        let _ = write!(out, " {} |", histogram.verdict_total(verdict));
    }
    let _ = writeln!(out, " {} |\n", histogram.total());
}

fn write_signatures(out: &mut String, run: &FuzzRun) {
    out.push_str("## Failure Signatures\n\n");
    let signatures = run.stats.signatures();
    if signatures.is_empty() {
        out.push_str("No failures recorded.\n\n");
        return;
    }
    out.push_str("| Count | Signature |\n");
    out.push_str("| ----- | --------- |\n");
    for (signature, count) in signatures {
        let _ = writeln!(out, "| {count} | {} |", table_cell(signature));
    }
    let other = run.stats.other_signatures();
    if other > 0 {
        let _ = writeln!(out, "| {other} | *other signatures* |");
    }
    out.push('\n');
}

fn write_cases(out: &mut String, run: &FuzzRun) {
    out.push_str("## Retained Cases\n\n");
    let cases = run.stats.retained();
    let _ = writeln!(
        out,
        "{} cases retained, {} evicted.\n",
        cases.len(),
        run.stats.evicted()
    );
    for case in cases {
        write_case(out, case);
    }
}

fn write_case(out: &mut String, case: &RetainedCase) {
    let _ = writeln!(out, "### Iteration {} ({})\n", case.iteration, case.verdict);
    let _ = writeln!(out, "* Seed: `{}`", case.seed);
    let _ = writeln!(out, "* Tier: {}", case.tier);
    let _ = writeln!(out, "* Reason: {}", case.reason);
    match case.exit {
        Some(exit) => {
            let _ = writeln!(out, "* Exit: {exit}");
        }
        None => out.push_str("* Exit: none\n"),
    }
    let _ = writeln!(out, "* Duration: {:.3}s", case.duration.as_secs_f64());
    let _ = writeln!(out, "* Actions: `{}`\n", case.actions);

    out.push_str("Map:\n\n");
    fenced(out, &case.map.render());

    out.push_str("Output:\n\n");
    if case.output_excerpt.is_empty() {
        out.push_str("(none)\n\n");
    } else {
        let mut excerpt = case.output_excerpt.clone();
        if case.output_truncated {
            excerpt.push_str("\n[truncated]");
        }
        fenced(out, &excerpt);
    }
}

/// Write `text` as a fenced block long enough not to be closed by its content.
fn fenced(out: &mut String, text: &str) {
    let longest = text
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest.max(2) + 1);
    let _ = writeln!(out, "{fence}text");
    out.push_str(text);
    if !text.ends_with('\n') {
        out.push('\n');
    }
    let _ = writeln!(out, "{fence}\n");
}

fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('`', "\\`")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classification;
    use crate::config::FuzzConfig;
    use crate::fuzzer::{Budget, SeedSource, StopReason};
    use crate::generate::{ActionSequence, FuzzCase, MapSpec};
    use crate::harness::ExecutionResult;
    use crate::report::{Aggregator, MAX_SIGNATURES};
    use std::time::Duration;

    fn sample_run() -> FuzzRun {
        let config = FuzzConfig::new("/bin/maze").with_seed(42);
        let mut stats = Aggregator::from_config(&config);
        let case = FuzzCase {
            iteration: 3,
            seed: 99,
            tier: Tier::Glyphs,
            map: MapSpec::parse("WP\nF0\n").unwrap(),
            actions: ActionSequence::parse("SUDE").unwrap(),
        };
        stats.record(
            &case,
            &ExecutionResult::exited(0),
            &Classification {
                verdict: Verdict::Normal,
                reason: "exited cleanly".into(),
            },
        );
        stats.record(
            &case,
            &ExecutionResult {
                stderr: "boom | ```fence```\n".into(),
                ..ExecutionResult::exited(1)
            },
            &Classification {
                verdict: Verdict::Crash,
                reason: "exit code 1".into(),
            },
        );
        FuzzRun {
            config,
            seed: 42,
            seed_source: SeedSource::Configured,
            budget: Budget::iterations(2),
            stats,
            iterations: 2,
            elapsed: Duration::from_millis(1250),
            stop_reason: Some(StopReason::IterationBudget),
        }
    }

    #[test]
    fn test_report_sections() {
        let report = render_markdown(&sample_run());
        for heading in [
            "## Table of Contents",
            "## Configuration",
            "## Run Parameters",
            "## Verdicts",
            "## Failure Signatures",
            "## Retained Cases",
        ] {
            assert!(report.contains(heading), "missing {heading}");
        }
        assert!(report.contains("* Seed: `42` (configured)"));
        assert!(report.contains("* Stop reason: iteration budget reached"));
        assert!(report.contains("| 2 (glyphs) | 1 | 0 | 1 | 0 | 2 |"));
        assert!(report.contains("| **Total** | 1 | 0 | 1 | 0 | 2 |"));
        assert!(report.contains("### Iteration 3 (crash)"));
        assert!(report.contains("* Actions: `SUDE`"));
        assert!(report.contains("\"target_path\": \"/bin/maze\""));
        assert!(!report.contains("Partial report"));
    }

    #[test]
    fn test_signature_cells_escaped() {
        let report = render_markdown(&sample_run());
        assert!(report.contains("| 1 | boom \\| \\`\\`\\`fence\\`\\`\\` |"));
    }

    #[test]
    fn test_overflow_signatures_reported() {
        let mut run = sample_run();
        assert!(!render_markdown(&run).contains("*other signatures*"));

        let crash = Classification {
            verdict: Verdict::Crash,
            reason: "exit code 1".into(),
        };
        for i in 0..=MAX_SIGNATURES {
            let case = FuzzCase {
                iteration: i as u64,
                seed: 0,
                tier: Tier::Glyphs,
                map: MapSpec::parse("W\n").unwrap(),
                actions: ActionSequence::parse("E").unwrap(),
            };
            let result = ExecutionResult {
                stdout: format!("echo {i}\n"),
                ..ExecutionResult::exited(1)
            };
            run.stats.record(&case, &result, &crash);
        }

        // one slot was taken by the sample crash, so two signatures overflow
        assert_eq!(run.stats.other_signatures(), 2);
        assert!(render_markdown(&run).contains("| 2 | *other signatures* |"));
    }

    #[test]
    fn test_fence_outlasts_content() {
        let mut out = String::new();
        fenced(&mut out, "a ```` b");
        assert!(out.starts_with("`````text\n"));
        assert!(out.ends_with("`````\n\n"));
    }

    #[test]
    fn test_partial_report_marked() {
        let mut run = sample_run();
        run.stop_reason = None;
        let report = render_markdown(&run);
        assert!(report.contains("Partial report"));
        assert!(report.contains("* Stop reason: still running"));
    }
}
