// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
//! Mazefuzz: a black-box fuzzing harness for turn-based maze games.
//!
//! The target is a program that loads a level file and replays a scripted
//! list of moves. Mazefuzz generates levels and scripts, runs the target on
//! them under a timeout, and sorts each run into normal, rejected, crashed or
//! hung.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  Fuzzer (budget, seed, cancellation) │
//! ├──────────────┬───────────────────────┤
//! │  Generators  │  Harness (subprocess) │
//! ├──────────────┴───────────────────────┤
//! │  Classifier  →  Aggregator / Report  │
//! └──────────────────────────────────────┘
//! ```
//!
//! Every case is derived from a seed drawn from one run-wide random stream,
//! so a configured seed reproduces the whole run and any single case can be
//! regenerated on its own.

pub mod classify;
pub mod config;
pub mod error;
pub mod fuzzer;
pub mod generate;
pub mod harness;
pub mod logging;
pub mod report;
pub mod rng;

pub use classify::{Classification, Classifier, Verdict};
pub use config::{ConfigError, FuzzConfig, RejectionRules};
pub use error::{FuzzError, Result};
pub use fuzzer::{Budget, Fuzzer, IterationEvent, SeedSource, StopReason};
pub use generate::{
    Action, ActionSequence, CaseGenerator, FuzzCase, GenerateError, Glyph, MapSize, MapSpec, Tier,
};
pub use harness::{ActionDelivery, CancelToken, ExecutionResult, Executor, ExitKind, Harness};
pub use report::{Aggregator, FuzzRun, Histogram, RetainedCase};
