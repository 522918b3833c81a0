//! Test case generation.
//!
//! A [`FuzzCase`] pairs one map with one action script. Both come from a
//! single per-case seed, so any case can be rebuilt from its seed and the
//! configuration that produced it.

mod action;
mod glyph;
mod map;
mod tier;

pub use action::{Action, ActionGenerator, ActionParseError, ActionSequence};
pub use glyph::Glyph;
pub use map::{MapParseError, MapSpec};
pub use tier::{GenerateError, InvalidTier, MapGenerator, MapSize, Strategy, Tier};

use crate::config::FuzzConfig;
use crate::rng::Rng;

/// One generated input for the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzCase {
    /// Zero-based loop iteration that produced the case.
    pub iteration: u64,
    /// Seed the case was generated from.
    pub seed: u64,
    /// Tier the map was generated at.
    pub tier: Tier,
    /// Level layout.
    pub map: MapSpec,
    /// Input script.
    pub actions: ActionSequence,
}

/// Builds complete cases from per-case seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseGenerator {
    maps: MapGenerator,
    actions: ActionGenerator,
}

impl CaseGenerator {
    /// Pair a map generator with an action generator.
    #[must_use]
    pub const fn new(maps: MapGenerator, actions: ActionGenerator) -> Self {
        Self { maps, actions }
    }

    /// Generator for the configured tier, sizes and script length.
    #[must_use]
    pub fn from_config(config: &FuzzConfig) -> Self {
        Self::new(config.map_generator(), config.action_generator())
    }

    /// Tier of generated maps.
    #[must_use]
    pub const fn tier(&self) -> Tier {
        self.maps.strategy().tier()
    }

    /// Build the case for `seed`. The same seed always yields the same case.
    ///
    /// # Errors
    ///
    /// Returns an error if the map generator cannot satisfy its tier.
    pub fn generate(&self, iteration: u64, seed: u64) -> Result<FuzzCase, GenerateError> {
        let mut rng = Rng::new(seed);
        let map = self.maps.generate_sized(&mut rng)?;
        let actions = self.actions.generate(&mut rng);
        Ok(FuzzCase {
            iteration,
            seed,
            tier: self.tier(),
            map,
            actions,
        })
    }

    /// The ordered cases of a run seeded with `run_seed`.
    #[must_use]
    pub fn stream(&self, run_seed: u64) -> CaseStream {
        CaseStream {
            generator: *self,
            rng: Rng::new(run_seed),
            iteration: 0,
        }
    }
}

/// Endless sequence of cases drawn from one run seed.
///
/// Each case seed is the next draw from the run stream, so the n-th case is
/// the same whether it is produced by the fuzz loop or printed on its own.
#[derive(Debug, Clone)]
pub struct CaseStream {
    generator: CaseGenerator,
    rng: Rng,
    iteration: u64,
}

impl CaseStream {
    /// Generate the next case.
    ///
    /// # Errors
    ///
    /// Returns an error if the map generator cannot satisfy its tier.
    pub fn next_case(&mut self) -> Result<FuzzCase, GenerateError> {
        let seed = self.rng.next_u64();
        let iteration = self.iteration;
        self.iteration += 1;
        self.generator.generate(iteration, seed)
    }
}

impl Iterator for CaseStream {
    type Item = Result<FuzzCase, GenerateError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_case())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_determines_case() {
        let config = FuzzConfig::new("/bin/true")
            .with_tier(Tier::Playable)
            .with_max_map_size(6, 4);
        let generator = CaseGenerator::from_config(&config);

        let a = generator.generate(0, 1234).unwrap();
        let b = generator.generate(7, 1234).unwrap();
        assert_eq!(a.map, b.map);
        assert_eq!(a.actions, b.actions);
        assert_eq!(b.iteration, 7);

        let c = generator.generate(0, 1235).unwrap();
        assert!(c.map != a.map || c.actions != a.actions);
    }

    #[test]
    fn test_case_matches_config() {
        let config = FuzzConfig::new("/bin/true")
            .with_max_map_size(5, 5)
            .with_max_action_length(3);
        let generator = CaseGenerator::from_config(&config);
        assert_eq!(generator.tier(), Tier::Glyphs);

        let case = generator.generate(0, 42).unwrap();
        assert_eq!(case.tier, Tier::Glyphs);
        assert_eq!((case.map.width(), case.map.height()), (5, 5));
        assert!(case.map.all_valid());
        assert!((1..=3).contains(&case.actions.len()));
    }

    #[test]
    fn test_stream_numbers_and_reproduces() {
        let generator = CaseGenerator::from_config(&FuzzConfig::new("/bin/true"));
        let first: Vec<FuzzCase> = generator.stream(9).take(4).map(Result::unwrap).collect();
        let again: Vec<FuzzCase> = generator.stream(9).take(4).map(Result::unwrap).collect();

        assert_eq!(first, again);
        let iterations: Vec<u64> = first.iter().map(|c| c.iteration).collect();
        assert_eq!(iterations, vec![0, 1, 2, 3]);

        let third = generator.generate(2, first[2].seed).unwrap();
        assert_eq!(third, first[2]);
    }
}
