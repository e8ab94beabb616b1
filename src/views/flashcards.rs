//! Flashcard deck navigation state.

use super::InteractionError;
use std::time::Duration;

/// Pause between un-flipping a card and moving to the next one, so the flip
/// animation is not cut off.
pub const FLIP_SETTLE_DELAY: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlashcardState {
    index: usize,
    flipped: bool,
}

impl FlashcardState {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn flip(&mut self, count: usize) -> Result<bool, InteractionError> {
        ensure_cards(count)?;
        self.flipped = !self.flipped;
        Ok(self.flipped)
    }

    pub fn unflip(&mut self) {
        self.flipped = false;
    }

    /// Move one card in `direction`, wrapping at both ends.
    pub fn advance(&mut self, count: usize, direction: Direction) -> Result<usize, InteractionError> {
        ensure_cards(count)?;
        self.index = match direction {
            Direction::Next => (self.index + 1) % count,
            Direction::Previous => (self.index + count - 1) % count,
        };
        Ok(self.index)
    }
}

fn ensure_cards(count: usize) -> Result<(), InteractionError> {
    if count == 0 {
        Err(InteractionError::NoFlashcards)
    } else {
        Ok(())
    }
}
