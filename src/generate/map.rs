//! Generated level layouts and their text form.

use std::fmt;

use thiserror::Error;

use super::glyph::Glyph;

/// Error returned when a map file cannot be read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MapParseError {
    /// A row's length differs from the first row's.
    #[error("row {row} has {found} cells, expected {expected}")]
    Ragged {
        /// Zero-based row index.
        row: usize,
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        found: usize,
    },
    /// The map does not fit the 16-bit dimension range.
    #[error("map of {width}x{height} cells is too large")]
    TooLarge {
        /// Width in cells.
        width: usize,
        /// Height in rows.
        height: usize,
    },
}

/// A rectangular grid of map characters.
///
/// Cells hold raw characters rather than [`Glyph`]s because the weaker
/// generation tiers deliberately emit symbols the target does not know.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapSpec {
    width: u16,
    height: u16,
    /// Row-major cells. Either both dimensions are non-zero or the grid is 0x0.
    cells: Vec<char>,
}

impl MapSpec {
    /// Build a map from row-major cells.
    ///
    /// Returns `None` if `cells` does not hold exactly `width * height` entries.
    #[must_use]
    pub fn from_cells(width: u16, height: u16, cells: Vec<char>) -> Option<Self> {
        if cells.len() != usize::from(width) * usize::from(height) {
            return None;
        }
        if cells.is_empty() {
            return Some(Self::empty());
        }
        Some(Self {
            width,
            height,
            cells,
        })
    }

    /// The 0x0 grid.
    ///
    /// A grid without cells has no rows to render, so every request with a
    /// zero dimension ends up here.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            cells: Vec::new(),
        }
    }

    /// Get map width.
    #[must_use]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Get map height.
    #[must_use]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Check whether the grid has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// All cells in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[char] {
        &self.cells
    }

    /// Get the cell at (x, y).
    #[must_use]
    pub fn get(&self, x: u16, y: u16) -> Option<char> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells
            .get(usize::from(y) * usize::from(self.width) + usize::from(x))
            .copied()
    }

    /// Iterate over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[char]> {
        self.cells.chunks(usize::from(self.width.max(1)))
    }

    /// Count cells holding `symbol`.
    #[must_use]
    pub fn count(&self, symbol: char) -> usize {
        self.cells.iter().filter(|&&c| c == symbol).count()
    }

    /// Count cells holding `glyph`.
    #[must_use]
    pub fn count_glyph(&self, glyph: Glyph) -> usize {
        self.count(glyph.symbol())
    }

    /// Check whether every cell is a valid glyph.
    #[must_use]
    pub fn all_valid(&self) -> bool {
        self.cells.iter().all(|&c| Glyph::is_valid_symbol(c))
    }

    /// Render as map-file text: one character per cell, each row newline-terminated.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.cells.len() + usize::from(self.height));
        for row in self.rows() {
            out.extend(row.iter());
            out.push('\n');
        }
        out
    }

    /// Parse map-file text produced by [`MapSpec::render`] or written by hand.
    ///
    /// Trailing carriage returns are ignored. An input without cells, such as
    /// blank lines only, yields the 0x0 map.
    ///
    /// # Errors
    ///
    /// Returns an error if rows differ in length or the map exceeds 65535 cells
    /// in either direction.
    pub fn parse(text: &str) -> Result<Self, MapParseError> {
        let rows: Vec<Vec<char>> = text
            .lines()
            .map(|line| line.trim_end_matches('\r').chars().collect())
            .collect();

        let expected = rows.first().map_or(0, Vec::len);
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != expected {
                return Err(MapParseError::Ragged {
                    row,
                    expected,
                    found: cells.len(),
                });
            }
        }

        let too_large = || MapParseError::TooLarge {
            width: expected,
            height: rows.len(),
        };
        let width = u16::try_from(expected).map_err(|_| too_large())?;
        let height = u16::try_from(rows.len()).map_err(|_| too_large())?;

        if width == 0 || height == 0 {
            return Ok(Self::empty());
        }

        Ok(Self {
            width,
            height,
            cells: rows.into_iter().flatten().collect(),
        })
    }
}

impl fmt::Display for MapSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
