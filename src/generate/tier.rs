//! Graduated map generation strategies.
//!
//! Each tier trades input validity for coverage. Tier 0 floods the target
//! with garbage, tier 3 produces maps it should accept so that runs reach
//! the game loop instead of stopping at the level loader.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::glyph::Glyph;
use super::map::MapSpec;
use crate::rng::Rng;

/// Characters drawn by tier 0.
const BINARY: [char; 2] = ['0', '1'];

/// Characters drawn by tier 1.
const ALPHABET: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generation tier selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    /// Tier 0: random binary digits.
    Binary = 0,
    /// Tier 1: random ASCII letters.
    Alphabetic = 1,
    /// Tier 2: random valid glyphs.
    Glyphs = 2,
    /// Tier 3: valid glyphs with the structure the loader requires.
    Playable = 3,
}

impl Tier {
    /// All tiers, weakest first.
    pub const ALL: [Tier; 4] = [Tier::Binary, Tier::Alphabetic, Tier::Glyphs, Tier::Playable];

    /// Numeric tier index.
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Short human-readable name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Tier::Binary => "binary",
            Tier::Alphabetic => "alphabetic",
            Tier::Glyphs => "glyphs",
            Tier::Playable => "playable",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.index(), self.label())
    }
}

/// Error for a tier index outside 0..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("tier must be between 0 and 3, got {0}")]
pub struct InvalidTier(pub u8);

impl TryFrom<u8> for Tier {
    type Error = InvalidTier;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Tier::Binary),
            1 => Ok(Tier::Alphabetic),
            2 => Ok(Tier::Glyphs),
            3 => Ok(Tier::Playable),
            other => Err(InvalidTier(other)),
        }
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.index()
    }
}

/// Map dimensions, written as `[width, height]` in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u16; 2]", into = "[u16; 2]")]
pub struct MapSize {
    /// Width in cells.
    pub width: u16,
    /// Height in rows.
    pub height: u16,
}

impl MapSize {
    /// Create a size.
    #[must_use]
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Number of cells.
    #[must_use]
    pub fn area(self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }
}

impl From<[u16; 2]> for MapSize {
    fn from([width, height]: [u16; 2]) -> Self {
        Self { width, height }
    }
}

impl From<MapSize> for [u16; 2] {
    fn from(size: MapSize) -> Self {
        [size.width, size.height]
    }
}

impl fmt::Display for MapSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Error type for map generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GenerateError {
    /// Requested dimensions are larger than the configured maximum.
    #[error("requested {requested} map exceeds the configured maximum {max}")]
    ExceedsMaximum {
        /// Requested dimensions.
        requested: MapSize,
        /// Configured maximum.
        max: MapSize,
    },
    /// The grid cannot hold the glyphs tier 3 must place.
    #[error("{size} map has room for {} cells but needs {required}", .size.area())]
    TooSmall {
        /// Requested dimensions.
        size: MapSize,
        /// Cells needed for player starts and food.
        required: usize,
    },
}

/// How cells are drawn. One variant per tier, each carrying only what it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Tier 0.
    Binary,
    /// Tier 1.
    Alphabetic,
    /// Tier 2.
    Glyphs,
    /// Tier 3.
    Playable {
        /// Exact number of player-start glyphs.
        players: u16,
        /// Minimum number of food glyphs.
        min_food: u16,
    },
}

impl Strategy {
    /// Strategy for `tier`. The structural counts only matter for tier 3.
    #[must_use]
    pub const fn for_tier(tier: Tier, players: u16, min_food: u16) -> Self {
        match tier {
            Tier::Binary => Strategy::Binary,
            Tier::Alphabetic => Strategy::Alphabetic,
            Tier::Glyphs => Strategy::Glyphs,
            Tier::Playable => Strategy::Playable { players, min_food },
        }
    }

    /// The tier this strategy implements.
    #[must_use]
    pub const fn tier(self) -> Tier {
        match self {
            Strategy::Binary => Tier::Binary,
            Strategy::Alphabetic => Tier::Alphabetic,
            Strategy::Glyphs => Tier::Glyphs,
            Strategy::Playable { .. } => Tier::Playable,
        }
    }

    /// Fewest cells a generated map may have.
    #[must_use]
    pub fn min_cells(self) -> usize {
        match self {
            Strategy::Playable { players, min_food } => {
                usize::from(players) + usize::from(min_food)
            }
            _ => 0,
        }
    }
}

/// Generates maps for one tier, bounded by a maximum size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapGenerator {
    strategy: Strategy,
    max: MapSize,
    randomize_size: bool,
}

impl MapGenerator {
    /// Create a generator. Maps use the full `max` size unless
    /// [`MapGenerator::with_random_size`] is enabled.
    #[must_use]
    pub const fn new(strategy: Strategy, max: MapSize) -> Self {
        Self {
            strategy,
            max,
            randomize_size: false,
        }
    }

    /// Draw each map's width and height uniformly up to the maximum.
    #[must_use]
    pub const fn with_random_size(mut self, enabled: bool) -> Self {
        self.randomize_size = enabled;
        self
    }

    /// The configured strategy.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The configured maximum size.
    #[must_use]
    pub const fn max_size(&self) -> MapSize {
        self.max
    }

    /// Choose dimensions for the next map.
    ///
    /// Without size randomization this is always the maximum. With it, width
    /// and height are drawn from `[1, max]`, restricted for tier 3 so the
    /// area can hold every required glyph.
    pub fn draw_size(&self, rng: &mut Rng) -> MapSize {
        let max = self.max;
        if !self.randomize_size || max.width == 0 || max.height == 0 {
            return max;
        }

        let required = self.strategy.min_cells().max(1);
        let min_width = clamp_dimension(required.div_ceil(usize::from(max.height)), max.width);
        let width = rng.range_inclusive(min_width, max.width);
        let min_height = clamp_dimension(required.div_ceil(usize::from(width)), max.height);
        let height = rng.range_inclusive(min_height, max.height);

        MapSize::new(width, height)
    }

    /// Draw a size and generate a map of that size.
    ///
    /// # Errors
    ///
    /// Returns an error if the maximum size cannot hold tier 3's glyphs.
    pub fn generate_sized(&self, rng: &mut Rng) -> Result<MapSpec, GenerateError> {
        let size = self.draw_size(rng);
        self.generate(size.width, size.height, rng)
    }

    /// Generate a `width` x `height` map.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions exceed the maximum, or if a tier 3
    /// map is too small for its player starts and food.
    pub fn generate(&self, width: u16, height: u16, rng: &mut Rng) -> Result<MapSpec, GenerateError> {
        let requested = MapSize::new(width, height);
        if width > self.max.width || height > self.max.height {
            return Err(GenerateError::ExceedsMaximum {
                requested,
                max: self.max,
            });
        }

        let required = self.strategy.min_cells();
        if requested.area() < required {
            return Err(GenerateError::TooSmall {
                size: requested,
                required,
            });
        }

        if requested.area() == 0 {
            return Ok(MapSpec::empty());
        }

        let cells = match self.strategy {
            Strategy::Binary => draw_cells(requested, rng, |rng| rng.pick(&BINARY)),
            Strategy::Alphabetic => {
                draw_cells(requested, rng, |rng| char::from(rng.pick(ALPHABET)))
            }
            Strategy::Glyphs => draw_cells(requested, rng, |rng| rng.pick(&Glyph::ALL).symbol()),
            Strategy::Playable { players, min_food } => {
                playable_cells(requested, players, min_food, rng)
            }
        };

        Ok(MapSpec::from_cells(width, height, cells).unwrap_or_else(MapSpec::empty))
    }
}

fn clamp_dimension(value: usize, max: u16) -> u16 {
    u16::try_from(value).unwrap_or(max).clamp(1, max)
}

fn draw_cells(size: MapSize, rng: &mut Rng, mut draw: impl FnMut(&mut Rng) -> char) -> Vec<char> {
    (0..size.area()).map(|_| draw(rng)).collect()
}

/// Tier 3 cells: non-player glyphs everywhere, then exactly `players` starts
/// and enough food at uniformly sampled distinct positions.
fn playable_cells(size: MapSize, players: u16, min_food: u16, rng: &mut Rng) -> Vec<char> {
    let area = size.area();
    let player = Glyph::Player.symbol();
    let food = Glyph::Food.symbol();

    let mut cells = draw_cells(size, rng, |rng| rng.pick(&Glyph::NON_PLAYER).symbol());
    let mut sampler = PositionSampler::new(area);

    for _ in 0..players {
        if let Some(idx) = sampler.next(rng) {
            cells[idx] = player;
        }
    }

    let min_food = usize::from(min_food);
    let mut have_food = cells.iter().filter(|&&c| c == food).count();
    while have_food < min_food {
        let Some(idx) = sampler.next(rng) else {
            break;
        };
        if cells[idx] != food {
            cells[idx] = food;
            have_food += 1;
        }
    }

    cells
}

/// Draws distinct cell indices without replacement (incremental Fisher-Yates).
struct PositionSampler {
    order: Vec<usize>,
    taken: usize,
}

impl PositionSampler {
    fn new(area: usize) -> Self {
        Self {
            order: (0..area).collect(),
            taken: 0,
        }
    }

    fn next(&mut self, rng: &mut Rng) -> Option<usize> {
        let remaining = self.order.len() - self.taken;
        if remaining == 0 {
            return None;
        }
        let pick = self.taken + rng.below_usize(remaining);
        self.order.swap(self.taken, pick);
        self.taken += 1;
        Some(self.order[self.taken - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(tier: Tier, w: u16, h: u16) -> MapGenerator {
        MapGenerator::new(Strategy::for_tier(tier, 1, 1), MapSize::new(w, h))
    }

    #[test]
    fn test_tier_roundtrip() {
        for tier in Tier::ALL {
            assert_eq!(Tier::try_from(tier.index()), Ok(tier));
        }
        assert_eq!(Tier::try_from(4), Err(InvalidTier(4)));
    }

    #[test]
    fn test_tier_deserializes_from_number() {
        let tier: Tier = serde_json::from_str("3").unwrap();
        assert_eq!(tier, Tier::Playable);
        assert!(serde_json::from_str::<Tier>("7").is_err());
    }

    #[test]
    fn test_map_size_from_array() {
        let size: MapSize = serde_json::from_str("[5, 7]").unwrap();
        assert_eq!(size, MapSize::new(5, 7));
        assert_eq!(serde_json::to_string(&size).unwrap(), "[5,7]");
    }

    #[test]
    fn test_binary_tier_alphabet() {
        let map = generator(Tier::Binary, 8, 8).generate(8, 8, &mut Rng::new(1)).unwrap();
        assert!(map.cells().iter().all(|c| matches!(c, '0' | '1')));
        assert!(map.count('1') > 0);
    }

    #[test]
    fn test_alphabetic_tier_alphabet() {
        let map = generator(Tier::Alphabetic, 16, 16)
            .generate(16, 16, &mut Rng::new(2))
            .unwrap();
        assert!(map.cells().iter().all(char::is_ascii_alphabetic));
        // 256 draws from 52 letters hit non-glyph letters
        assert!(!map.all_valid());
    }

    #[test]
    fn test_glyph_tier_is_valid() {
        let map = generator(Tier::Glyphs, 10, 10).generate(10, 10, &mut Rng::new(3)).unwrap();
        assert!(map.all_valid());
    }

    #[test]
    fn test_playable_tier_structure() {
        let generator = MapGenerator::new(
            Strategy::Playable {
                players: 2,
                min_food: 3,
            },
            MapSize::new(6, 6),
        );
        let mut rng = Rng::new(4);
        for _ in 0..200 {
            let map = generator.generate(6, 6, &mut rng).unwrap();
            assert!(map.all_valid());
            assert_eq!(map.count_glyph(Glyph::Player), 2);
            assert!(map.count_glyph(Glyph::Food) >= 3);
        }
    }

    #[test]
    fn test_playable_tier_fills_tight_grid() {
        let generator = MapGenerator::new(
            Strategy::Playable {
                players: 1,
                min_food: 1,
            },
            MapSize::new(2, 1),
        );
        let map = generator.generate(2, 1, &mut Rng::new(9)).unwrap();
        assert_eq!(map.count_glyph(Glyph::Player), 1);
        assert_eq!(map.count_glyph(Glyph::Food), 1);
    }

    #[test]
    fn test_playable_tier_too_small() {
        let result = generator(Tier::Playable, 4, 4).generate(1, 1, &mut Rng::new(5));
        assert!(matches!(result, Err(GenerateError::TooSmall { required: 2, .. })));
    }

    #[test]
    fn test_exceeding_maximum_is_an_error() {
        let result = generator(Tier::Glyphs, 5, 5).generate(6, 5, &mut Rng::new(6));
        assert!(matches!(result, Err(GenerateError::ExceedsMaximum { .. })));
    }

    #[test]
    fn test_zero_dimension_yields_empty_grid() {
        for tier in [Tier::Binary, Tier::Alphabetic, Tier::Glyphs] {
            let map = generator(tier, 5, 5).generate(0, 3, &mut Rng::new(7)).unwrap();
            assert!(map.is_empty());
            assert_eq!((map.width(), map.height()), (0, 0));
            assert_eq!(map.render(), "");
        }
    }

    #[test]
    fn test_fixed_size_uses_maximum() {
        let generator = generator(Tier::Glyphs, 5, 5);
        assert_eq!(generator.draw_size(&mut Rng::new(8)), MapSize::new(5, 5));
    }

    #[test]
    fn test_random_size_within_bounds() {
        let generator = generator(Tier::Glyphs, 7, 3).with_random_size(true);
        let mut rng = Rng::new(10);
        for _ in 0..500 {
            let size = generator.draw_size(&mut rng);
            assert!((1..=7).contains(&size.width));
            assert!((1..=3).contains(&size.height));
        }
    }

    #[test]
    fn test_random_size_fits_playable_requirements() {
        let generator = MapGenerator::new(
            Strategy::Playable {
                players: 3,
                min_food: 3,
            },
            MapSize::new(3, 3),
        )
        .with_random_size(true);
        let mut rng = Rng::new(11);
        for _ in 0..500 {
            let map = generator.generate_sized(&mut rng).unwrap();
            assert!(usize::from(map.width()) * usize::from(map.height()) >= 6);
            assert_eq!(map.count_glyph(Glyph::Player), 3);
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let generator = generator(Tier::Playable, 12, 9);
        let a = generator.generate(12, 9, &mut Rng::new(42)).unwrap();
        let b = generator.generate(12, 9, &mut Rng::new(42)).unwrap();
        assert_eq!(a, b);
    }
}
