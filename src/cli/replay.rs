//! Replay command implementation.

use super::output::{JsonCaseResult, format_case_text};
use super::{CliError, OutputFormat};
use mazefuzz::{
    ActionSequence, CancelToken, CaseGenerator, FuzzCase, FuzzConfig, Fuzzer, Harness, MapSpec,
    logging,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Where the replayed case comes from.
#[derive(Debug)]
pub(crate) enum CaseSource {
    /// Regenerate from a case seed.
    Seed(u64),
    /// Read a map file and take the actions verbatim.
    Files {
        /// Map file.
        map: PathBuf,
        /// Action script.
        actions: String,
    },
    /// Neither was given.
    Missing,
}

/// Execute the replay command.
///
/// # Errors
///
/// Returns an error if the configuration or the case cannot be loaded.
pub(crate) fn execute(
    config_path: &Path,
    source: CaseSource,
    format: OutputFormat,
) -> Result<(), CliError> {
    let config = super::load_config(config_path)?;
    logging::init_stderr(config.verbose)?;

    let (case, seed) = match source {
        CaseSource::Seed(seed) => (CaseGenerator::from_config(&config).generate(0, seed)?, Some(seed)),
        CaseSource::Files { map, actions } => (load_case(&map, &actions, &config)?, None),
        CaseSource::Missing => {
            return Err(CliError::new(
                "Either --case-seed or both --map and --actions are required",
            ));
        }
    };

    let cancel = CancelToken::new();
    super::install_interrupt_handler(&cancel)?;
    let harness = Harness::from_config(&config, cancel.clone());
    let mut fuzzer = Fuzzer::new(config, harness, cancel)?;
    let (result, classification) = fuzzer.run_case(&case);

    match format {
        OutputFormat::Text => print!("{}", format_case_text(&case, seed, &result, &classification)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&JsonCaseResult::new(
                &case,
                seed,
                &result,
                &classification,
            ))?;
            println!("{json}");
        }
    }

    Ok(())
}

fn load_case(
    map_path: &Path,
    actions: &str,
    config: &FuzzConfig,
) -> Result<FuzzCase, CliError> {
    let text = fs::read_to_string(map_path)
        .map_err(|e| CliError::new(format!("Failed to read {}: {e}", map_path.display())))?;
    let map = MapSpec::parse(&text)
        .map_err(|e| CliError::new(format!("Invalid map {}: {e}", map_path.display())))?;
    let actions = ActionSequence::parse(actions)
        .map_err(|e| CliError::new(format!("Invalid actions: {e}")))?;

    // seed and tier are placeholders; output omits both for file cases
    Ok(FuzzCase {
        iteration: 0,
        seed: 0,
        tier: config.tier,
        map,
        actions,
    })
}
