//! Verdicts for execution results.

use std::fmt;

use serde::Serialize;

use crate::config::{FuzzConfig, RejectionRules};
use crate::harness::{ExecutionResult, ExitKind};

/// Outcome category of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The target ran and exited cleanly.
    Normal,
    /// The target refused the input gracefully.
    Rejected,
    /// The target failed abnormally or could not be run.
    Crash,
    /// The target did not finish before the timeout.
    Hang,
}

impl Verdict {
    /// Every verdict, in report order.
    pub const ALL: [Verdict; 4] = [
        Verdict::Normal,
        Verdict::Rejected,
        Verdict::Crash,
        Verdict::Hang,
    ];

    /// Lowercase name used in file names and reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Verdict::Normal => "normal",
            Verdict::Rejected => "rejected",
            Verdict::Crash => "crash",
            Verdict::Hang => "hang",
        }
    }

    /// Anything but a clean run is worth keeping.
    #[must_use]
    pub const fn is_interesting(self) -> bool {
        !matches!(self, Verdict::Normal)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A verdict with a one-line explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Outcome category.
    pub verdict: Verdict,
    /// Human-readable reason.
    pub reason: String,
}

impl Classification {
    fn new(verdict: Verdict, reason: impl Into<String>) -> Self {
        Self {
            verdict,
            reason: reason.into(),
        }
    }
}

/// Maps execution results to verdicts.
///
/// Rules are checked in order and the first match wins:
///
/// 1. timed out: [`Verdict::Hang`]
/// 2. could not be started: [`Verdict::Crash`]
/// 3. a fault signature in stdout or stderr: [`Verdict::Crash`]
/// 4. no exit status, or killed by a signal: [`Verdict::Crash`]
/// 5. a rejection exit code: [`Verdict::Rejected`]
/// 6. exit code 0 with a rejection pattern in the output: [`Verdict::Rejected`]
/// 7. exit code 0: [`Verdict::Normal`]
/// 8. any other exit code: [`Verdict::Crash`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classifier {
    fault_signatures: Vec<String>,
    rejection: RejectionRules,
}

impl Classifier {
    /// Create a classifier from explicit rules.
    #[must_use]
    pub fn new(fault_signatures: Vec<String>, rejection: RejectionRules) -> Self {
        Self {
            fault_signatures,
            rejection,
        }
    }

    /// Classifier for the configured signatures and rejection rules.
    #[must_use]
    pub fn from_config(config: &FuzzConfig) -> Self {
        Self::new(config.fault_signatures.clone(), config.rejection.clone())
    }

    /// Classify one result.
    #[must_use]
    pub fn classify(&self, result: &ExecutionResult) -> Classification {
        if result.timed_out {
            return Classification::new(
                Verdict::Hang,
                format!("timed out after {:.2}s", result.duration.as_secs_f64()),
            );
        }
        if let Some(err) = &result.spawn_error {
            return Classification::new(Verdict::Crash, err.clone());
        }
        if let Some(signature) = find_pattern(&self.fault_signatures, result) {
            return Classification::new(
                Verdict::Crash,
                format!("output contains {signature:?}"),
            );
        }

        let code = match result.exit {
            None => return Classification::new(Verdict::Crash, "no exit status"),
            Some(ExitKind::Signal(signal)) => {
                return Classification::new(Verdict::Crash, format!("killed by signal {signal}"));
            }
            Some(ExitKind::Code(code)) => code,
        };

        if self.rejection.exit_codes.contains(&code) {
            return Classification::new(Verdict::Rejected, format!("rejected with exit code {code}"));
        }
        if code == 0 {
            if let Some(pattern) = find_pattern(&self.rejection.patterns, result) {
                return Classification::new(
                    Verdict::Rejected,
                    format!("rejected: output contains {pattern:?}"),
                );
            }
            return Classification::new(Verdict::Normal, "exited cleanly");
        }
        Classification::new(Verdict::Crash, format!("exit code {code}"))
    }
}

fn find_pattern<'a>(patterns: &'a [String], result: &ExecutionResult) -> Option<&'a str> {
    patterns
        .iter()
        .find(|p| result.stdout.contains(p.as_str()) || result.stderr.contains(p.as_str()))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_FAULT_SIGNATURES;
    use std::time::Duration;

    fn default_classifier() -> Classifier {
        Classifier::from_config(&FuzzConfig::new("/bin/true"))
    }

    fn rejecting_classifier() -> Classifier {
        Classifier::new(
            DEFAULT_FAULT_SIGNATURES.iter().map(ToString::to_string).collect(),
            RejectionRules {
                exit_codes: vec![2],
                patterns: vec!["Invalid map".into()],
            },
        )
    }

    #[test]
    fn test_clean_exit_is_normal() {
        let c = default_classifier().classify(&ExecutionResult::exited(0));
        assert_eq!(c.verdict, Verdict::Normal);
    }

    #[test]
    fn test_timeout_wins_over_everything() {
        let result = ExecutionResult {
            timed_out: true,
            stderr: "panicked at src/main.rs".into(),
            duration: Duration::from_millis(1500),
            ..ExecutionResult::exited(0)
        };
        let c = default_classifier().classify(&result);
        assert_eq!(c.verdict, Verdict::Hang);
        assert_eq!(c.reason, "timed out after 1.50s");
    }

    #[test]
    fn test_spawn_error_is_crash() {
        let result = ExecutionResult::spawn_failed("failed to spawn: not found", Duration::ZERO);
        let c = default_classifier().classify(&result);
        assert_eq!(c.verdict, Verdict::Crash);
        assert!(c.reason.contains("not found"));
    }

    #[test]
    fn test_fault_signature_on_clean_exit_is_crash() {
        let result = ExecutionResult {
            stderr: "Exception in thread \"main\" java.lang.NullPointerException".into(),
            ..ExecutionResult::exited(0)
        };
        let c = default_classifier().classify(&result);
        assert_eq!(c.verdict, Verdict::Crash);
        assert!(c.reason.contains("Exception in thread"));
    }

    #[test]
    fn test_signal_and_missing_status_are_crashes() {
        let killed = ExecutionResult {
            exit: Some(ExitKind::Signal(11)),
            ..ExecutionResult::default()
        };
        assert_eq!(default_classifier().classify(&killed).verdict, Verdict::Crash);
        assert_eq!(
            default_classifier().classify(&ExecutionResult::default()).verdict,
            Verdict::Crash
        );
    }

    #[test]
    fn test_nonzero_exit_without_rules_is_crash() {
        let c = default_classifier().classify(&ExecutionResult::exited(2));
        assert_eq!(c.verdict, Verdict::Crash);
        assert_eq!(c.reason, "exit code 2");
    }

    #[test]
    fn test_rejection_exit_code() {
        let c = rejecting_classifier().classify(&ExecutionResult::exited(2));
        assert_eq!(c.verdict, Verdict::Rejected);
        assert_eq!(
            rejecting_classifier().classify(&ExecutionResult::exited(3)).verdict,
            Verdict::Crash
        );
    }

    #[test]
    fn test_rejection_pattern_needs_clean_exit() {
        let clean = ExecutionResult {
            stdout: "Invalid map: no player\n".into(),
            ..ExecutionResult::exited(0)
        };
        assert_eq!(rejecting_classifier().classify(&clean).verdict, Verdict::Rejected);

        let failing = ExecutionResult {
            stdout: "Invalid map: no player\n".into(),
            ..ExecutionResult::exited(1)
        };
        assert_eq!(rejecting_classifier().classify(&failing).verdict, Verdict::Crash);
    }

    #[test]
    fn test_fault_signature_beats_rejection_code() {
        let result = ExecutionResult {
            stderr: "Segmentation fault".into(),
            ..ExecutionResult::exited(2)
        };
        assert_eq!(rejecting_classifier().classify(&result).verdict, Verdict::Crash);
    }

    #[test]
    fn test_verdict_order_and_labels() {
        assert!(Verdict::Normal < Verdict::Hang);
        assert!(!Verdict::Normal.is_interesting());
        assert!(Verdict::Rejected.is_interesting());
        assert_eq!(serde_json::to_string(&Verdict::Crash).unwrap(), "\"crash\"");
    }
}
