//! Generate command implementation.

use super::CliError;
use super::output::format_generated;
use mazefuzz::{CaseGenerator, rng};
use std::path::Path;

/// Execute the generate command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub(crate) fn execute(config_path: &Path, seed: Option<u64>, count: u64) -> Result<(), CliError> {
    let config = super::load_config(config_path)?;
    let seed = seed.or(config.seed).unwrap_or_else(rng::entropy_seed);

    println!("# run seed {seed}, tier {}", config.tier);
    let mut cases = CaseGenerator::from_config(&config).stream(seed);
    for _ in 0..count {
        let case = cases.next_case()?;
        println!();
        print!("{}", format_generated(&case));
    }

    Ok(())
}
