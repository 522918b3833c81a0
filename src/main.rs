//! Mazefuzz CLI - fuzz a maze game from the command line.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// Mazefuzz - A black-box fuzzer for turn-based maze games
#[derive(Parser, Debug)]
#[command(name = "mazefuzz")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the fuzz loop
    Run {
        /// Configuration file (JSON)
        #[arg(short, long, default_value = "data/config/config.json")]
        config: PathBuf,

        /// Maximum iterations (negative: unbounded)
        #[arg(short, long, default_value = "-1", allow_negative_numbers = true)]
        iterations: i64,

        /// Maximum time in seconds (negative: unbounded)
        #[arg(short, long, default_value = "-1", allow_negative_numbers = true)]
        time: i64,

        /// Write report.md when the run ends
        #[arg(long, default_value = "true", action = clap::ArgAction::Set)]
        report: bool,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,

        /// Hide the progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Execute a single case and print its verdict
    Replay {
        /// Configuration file (JSON)
        #[arg(short, long, default_value = "data/config/config.json")]
        config: PathBuf,

        /// Regenerate the case with this seed
        #[arg(long, conflicts_with_all = ["map", "actions"], required_unless_present = "map")]
        case_seed: Option<u64>,

        /// Map file to run
        #[arg(long, requires = "actions")]
        map: Option<PathBuf>,

        /// Action script to run (e.g. SUURDE)
        #[arg(long, requires = "map")]
        actions: Option<String>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,
    },

    /// Print the cases a run would generate, without executing them
    Generate {
        /// Configuration file (JSON)
        #[arg(short, long, default_value = "data/config/config.json")]
        config: PathBuf,

        /// Run seed (default: the configured seed, else random)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Number of cases
        #[arg(short = 'n', long, default_value = "1")]
        count: u64,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let result = match args.command {
        Commands::Run {
            config,
            iterations,
            time,
            report,
            format,
            quiet,
        } => cli::run::execute(&config, iterations, time, report, format, quiet),

        Commands::Replay {
            config,
            case_seed,
            map,
            actions,
            format,
        } => {
            let case = match (case_seed, map, actions) {
                (Some(seed), _, _) => cli::replay::CaseSource::Seed(seed),
                (None, Some(map), Some(actions)) => cli::replay::CaseSource::Files { map, actions },
                _ => cli::replay::CaseSource::Missing,
            };
            cli::replay::execute(&config, case, format)
        }

        Commands::Generate {
            config,
            seed,
            count,
        } => cli::generate::execute(&config, seed, count),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
