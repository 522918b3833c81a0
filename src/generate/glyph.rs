//! Map glyph vocabulary.

use serde::{Deserialize, Serialize};

/// A map cell the target recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Glyph {
    /// Impassable wall.
    Wall,
    /// Walkable floor.
    Empty,
    /// Monster spawn.
    Monster,
    /// Player start position.
    Player,
    /// Collectible food pellet.
    Food,
}

impl Glyph {
    /// Every valid glyph, in a fixed order.
    pub const ALL: [Glyph; 5] = [
        Glyph::Wall,
        Glyph::Empty,
        Glyph::Monster,
        Glyph::Player,
        Glyph::Food,
    ];

    /// Valid glyphs other than the player start.
    pub const NON_PLAYER: [Glyph; 4] = [Glyph::Wall, Glyph::Empty, Glyph::Monster, Glyph::Food];

    /// Character used for this glyph in map files.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Glyph::Wall => 'W',
            Glyph::Empty => '0',
            Glyph::Monster => 'M',
            Glyph::Player => 'P',
            Glyph::Food => 'F',
        }
    }

    /// Look up the glyph for a map character.
    #[must_use]
    pub const fn from_symbol(c: char) -> Option<Self> {
        match c {
            'W' => Some(Glyph::Wall),
            '0' => Some(Glyph::Empty),
            'M' => Some(Glyph::Monster),
            'P' => Some(Glyph::Player),
            'F' => Some(Glyph::Food),
            _ => None,
        }
    }

    /// Check whether a character is a valid glyph.
    #[must_use]
    pub const fn is_valid_symbol(c: char) -> bool {
        Self::from_symbol(c).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_roundtrip() {
        for glyph in Glyph::ALL {
            assert_eq!(Glyph::from_symbol(glyph.symbol()), Some(glyph));
        }
    }

    #[test]
    fn test_symbols_are_distinct() {
        let mut symbols: Vec<char> = Glyph::ALL.iter().map(|g| g.symbol()).collect();
        symbols.sort_unstable();
        symbols.dedup();
        assert_eq!(symbols.len(), Glyph::ALL.len());
    }

    #[test]
    fn test_unknown_symbols_rejected() {
        assert!(!Glyph::is_valid_symbol('1'));
        assert!(!Glyph::is_valid_symbol('w'));
        assert!(!Glyph::is_valid_symbol(' '));
    }

    #[test]
    fn test_non_player_excludes_player() {
        assert!(!Glyph::NON_PLAYER.contains(&Glyph::Player));
        assert_eq!(Glyph::NON_PLAYER.len(), Glyph::ALL.len() - 1);
    }
}
