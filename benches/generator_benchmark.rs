//! Benchmarks for case generation.
//!
//! Generation sits on the fuzz loop's hot path ahead of every target launch.

#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use mazefuzz::generate::{ActionGenerator, MapGenerator, MapSize, Strategy, Tier};
use mazefuzz::rng::Rng;
use mazefuzz::{CaseGenerator, FuzzConfig};

fn bench_map_tiers(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_64x64");
    for tier in Tier::ALL {
        let generator = MapGenerator::new(Strategy::for_tier(tier, 2, 4), MapSize::new(64, 64));
        group.bench_function(tier.label(), |b| {
            let mut rng = Rng::new(42);
            b.iter(|| black_box(generator.generate_sized(&mut rng)));
        });
    }
    group.finish();
}

fn bench_actions(c: &mut Criterion) {
    let generator = ActionGenerator::new(500).ending_with_exit(true);

    c.bench_function("actions_500", |b| {
        let mut rng = Rng::new(42);
        b.iter(|| black_box(generator.generate(&mut rng)));
    });
}

fn bench_case_stream(c: &mut Criterion) {
    // 100 cases the way the loop draws them
    let config = FuzzConfig::new("/bin/true")
        .with_tier(Tier::Playable)
        .with_max_map_size(20, 20)
        .with_max_action_length(50);
    let generator = CaseGenerator::from_config(&config);

    c.bench_function("case_stream_100", |b| {
        b.iter(|| {
            let mut cases = generator.stream(black_box(7));
            for _ in 0..100 {
                let _ = black_box(cases.next_case());
            }
        });
    });
}

criterion_group!(benches, bench_map_tiers, bench_actions, bench_case_stream);
criterion_main!(benches);
