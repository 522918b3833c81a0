//! Input actions and random action scripts.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rng::Rng;

/// A single scripted input for the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Leave the game.
    Exit,
    /// Start the game.
    Start,
    /// Stop (pause) the game.
    Quit,
    /// Let one turn pass.
    Sleep,
    /// Move up.
    Up,
    /// Move down.
    Down,
    /// Move left.
    Left,
    /// Move right.
    Right,
}

impl Action {
    /// Every action, in a fixed order.
    pub const ALL: [Action; 8] = [
        Action::Exit,
        Action::Start,
        Action::Quit,
        Action::Sleep,
        Action::Up,
        Action::Down,
        Action::Left,
        Action::Right,
    ];

    /// Character used for this action in a script.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Action::Exit => 'E',
            Action::Start => 'S',
            Action::Quit => 'Q',
            Action::Sleep => 'W',
            Action::Up => 'U',
            Action::Down => 'D',
            Action::Left => 'L',
            Action::Right => 'R',
        }
    }

    /// Look up the action for a script character.
    #[must_use]
    pub const fn from_symbol(c: char) -> Option<Self> {
        match c {
            'E' => Some(Action::Exit),
            'S' => Some(Action::Start),
            'Q' => Some(Action::Quit),
            'W' => Some(Action::Sleep),
            'U' => Some(Action::Up),
            'D' => Some(Action::Down),
            'L' => Some(Action::Left),
            'R' => Some(Action::Right),
            _ => None,
        }
    }
}

/// Error returned when an action script contains an unknown symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown action {symbol:?} at position {position}")]
pub struct ActionParseError {
    /// The offending character.
    pub symbol: char,
    /// Zero-based character position.
    pub position: usize,
}

/// An ordered script of actions, replayed turn by turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ActionSequence(Vec<Action>);

impl ActionSequence {
    /// Wrap a list of actions.
    #[must_use]
    pub fn new(actions: Vec<Action>) -> Self {
        Self(actions)
    }

    /// Number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the script is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The actions as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Action] {
        &self.0
    }

    /// Render as a string of action symbols.
    #[must_use]
    pub fn render(&self) -> String {
        self.0.iter().map(|a| a.symbol()).collect()
    }

    /// Parse a string of action symbols. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error on the first character that is not an action symbol.
    pub fn parse(text: &str) -> Result<Self, ActionParseError> {
        text.trim()
            .chars()
            .enumerate()
            .map(|(position, symbol)| {
                Action::from_symbol(symbol).ok_or(ActionParseError { symbol, position })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for ActionSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Produces random action scripts of bounded length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionGenerator {
    max_length: u16,
    end_with_exit: bool,
}

impl ActionGenerator {
    /// Create a generator for scripts of 1..=`max_length` actions.
    ///
    /// A `max_length` of zero is treated as one.
    #[must_use]
    pub fn new(max_length: u16) -> Self {
        Self {
            max_length: max_length.max(1),
            end_with_exit: false,
        }
    }

    /// Force the final action to be [`Action::Exit`] so the target quits on
    /// its own instead of idling until the timeout.
    #[must_use]
    pub fn ending_with_exit(mut self, enabled: bool) -> Self {
        self.end_with_exit = enabled;
        self
    }

    /// Longest script this generator produces.
    #[must_use]
    pub fn max_length(&self) -> u16 {
        self.max_length
    }

    /// Draw a script.
    pub fn generate(&self, rng: &mut Rng) -> ActionSequence {
        let len = rng.range_inclusive(1, self.max_length);
        let mut actions: Vec<Action> = (0..len).map(|_| rng.pick(&Action::ALL)).collect();
        if self.end_with_exit
            && let Some(last) = actions.last_mut()
        {
            *last = Action::Exit;
        }
        ActionSequence(actions)
    }
}
