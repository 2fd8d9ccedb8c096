//! Rule engines. Each variant is a stateless unit type; all state lives in the
//! `GameState` snapshot passed in, and a new snapshot comes out.

pub mod capture_go;
pub mod five_in_a_row;

use crate::actions::RoomId;
use crate::board::Position;
use crate::enums::Variant;
use crate::errors::{GameError, GameResult, IllegalReason};
use crate::game::{GameState, Move};

pub const DEFAULT_KOMI: f64 = 6.5;

/// Knobs fixed at room creation and copied into the initial snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleSettings {
    pub komi: f64,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self { komi: DEFAULT_KOMI }
    }
}

/// Pure move validation and application for one game variant.
pub trait RuleEngine: Send + Sync {
    fn variant(&self) -> Variant;

    fn board_size(&self) -> usize;

    fn initial_state(&self, room_id: RoomId, settings: &RuleSettings) -> GameState;

    /// Validates `mv` against `state` for the side to move and returns the next
    /// snapshot. The input snapshot is never modified.
    fn apply(&self, state: &GameState, mv: Move) -> GameResult<GameState>;
}

/// Checks shared by every variant before a stone is placed.
pub(crate) fn check_placement(state: &GameState, position: Position) -> GameResult<()> {
    if state.finished {
        return Err(GameError::illegal(IllegalReason::GameFinished));
    }
    match state.board.get(position) {
        None => Err(GameError::illegal(IllegalReason::OutOfBounds)),
        Some(Some(_)) => Err(GameError::illegal(IllegalReason::Occupied)),
        Some(None) => Ok(()),
    }
}
