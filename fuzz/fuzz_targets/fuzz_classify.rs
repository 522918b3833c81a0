#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mazefuzz::generate::{ActionGenerator, MapGenerator, MapSize, Strategy, Tier};
use mazefuzz::rng::Rng;
use mazefuzz::{Aggregator, Classifier, ExecutionResult, ExitKind, FuzzCase, RejectionRules, Verdict};

/// Structured input describing one target execution.
#[derive(Arbitrary, Debug)]
struct ExecutionInput {
    /// Exit code, or signal number when `signalled`.
    status: Option<i32>,
    signalled: bool,
    stdout: String,
    stderr: String,
    millis: u16,
    timed_out: bool,
    spawn_error: Option<String>,
    /// Exit codes treated as rejections.
    reject_codes: Vec<i32>,
    /// Output patterns treated as rejections.
    reject_patterns: Vec<String>,
    seed: u64,
}

fuzz_target!(|input: ExecutionInput| {
    let patterns: Vec<String> = input
        .reject_patterns
        .into_iter()
        .filter(|p| !p.is_empty())
        .take(8)
        .collect();
    let classifier = Classifier::new(
        vec!["panicked at".to_string(), "Segmentation fault".to_string()],
        RejectionRules {
            exit_codes: input.reject_codes,
            patterns,
        },
    );

    let exit = input.status.map(|s| {
        if input.signalled {
            ExitKind::Signal(s)
        } else {
            ExitKind::Code(s)
        }
    });
    let result = ExecutionResult {
        exit,
        stdout: input.stdout,
        stderr: input.stderr,
        duration: Duration::from_millis(u64::from(input.millis)),
        timed_out: input.timed_out,
        interrupted: false,
        spawn_error: input.spawn_error,
    };

    let classification = classifier.classify(&result);
    if result.timed_out {
        assert_eq!(classification.verdict, Verdict::Hang);
    } else if matches!(result.exit, Some(ExitKind::Signal(_))) || result.spawn_error.is_some() {
        assert_eq!(classification.verdict, Verdict::Crash);
    }

    // Recording any classified result keeps the histogram and retention consistent
    let mut rng = Rng::new(input.seed);
    let map = MapGenerator::new(Strategy::for_tier(Tier::Glyphs, 1, 1), MapSize::new(4, 4))
        .generate_sized(&mut rng)
        .expect("4x4 map");
    let case = FuzzCase {
        iteration: 0,
        seed: input.seed,
        tier: Tier::Glyphs,
        map,
        actions: ActionGenerator::new(8).generate(&mut rng),
    };
    let mut stats = Aggregator::new(4, 64);
    let retained = stats.record(&case, &result, &classification).is_some();
    assert_eq!(retained, classification.verdict.is_interesting());
    assert_eq!(stats.histogram().total(), 1);
});
