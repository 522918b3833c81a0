//! Run command implementation.

use super::output::{JsonRunSummary, format_run_text};
use super::{CliError, OutputFormat};
use indicatif::{ProgressBar, ProgressStyle};
use mazefuzz::{Budget, CancelToken, Fuzzer, Harness, IterationEvent, logging, report};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Execute the run command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or logging cannot start.
pub(crate) fn execute(
    config_path: &Path,
    iterations: i64,
    time: i64,
    write_report: bool,
    format: OutputFormat,
    quiet: bool,
) -> Result<(), CliError> {
    let config = super::load_config(config_path)?;
    logging::init(&config.log_path, config.verbose)?;

    let cancel = CancelToken::new();
    super::install_interrupt_handler(&cancel)?;

    let budget = Budget::from_cli(iterations, time);
    let harness = Harness::from_config(&config, cancel.clone());
    let mut fuzzer = Fuzzer::new(config, harness, cancel)?;

    let pb = (!quiet).then(|| progress_bar(budget));
    let mut interesting = 0u64;
    let run = fuzzer.run(budget, |event: &IterationEvent<'_>| {
        if event.classification.verdict.is_interesting() {
            interesting += 1;
        }
        if let Some(pb) = &pb {
            match budget.max_time.and(budget.progress(event.iterations, event.elapsed)) {
                Some(fraction) => pb.set_position(permille(fraction)),
                None => pb.set_position(event.iterations),
            }
            pb.set_message(format!("{interesting} interesting"));
        }
    })?;
    if let Some(pb) = pb {
        pb.finish_with_message(format!("{interesting} interesting"));
    }

    if write_report {
        let path = run.config.report_path(false);
        match report::write_report(&run, &path) {
            Ok(()) => info!(path = %path.display(), "report written"),
            Err(err) => warn!(path = %path.display(), error = %err, "failed to write report"),
        }
    }

    match format {
        OutputFormat::Text => print!("{}", format_run_text(&run)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&JsonRunSummary::from_run(&run))?;
            println!("{json}");
        }
    }

    Ok(())
}

/// Progress bar sized by whichever budget is set.
///
/// With a time limit the bar tracks the budget fraction in permille,
/// otherwise it counts iterations.
fn progress_bar(budget: Budget) -> ProgressBar {
    let (pb, template) = match (budget.max_iterations, budget.max_time) {
        (_, Some(_)) => (
            ProgressBar::new(1000),
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}",
        ),
        (Some(n), None) => (
            ProgressBar::new(n),
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} iterations ({per_sec}) {msg}",
        ),
        (None, None) => (
            ProgressBar::new_spinner(),
            "{spinner:.green} [{elapsed_precise}] {pos} iterations ({per_sec}) {msg}",
        ),
    };
    let style = ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn permille(fraction: f64) -> u64 {
    (fraction.clamp(0.0, 1.0) * 1000.0).round() as u64
}
