use log::debug;

use super::{check_placement, RuleEngine, RuleSettings};
use crate::actions::RoomId;
use crate::board::{Board, Position};
use crate::enums::{Outcome, Stone, Variant};
use crate::errors::{GameError, GameResult, IllegalReason};
use crate::game::{GameState, Move};

pub const BOARD_SIZE: usize = 15;
pub const WIN_LENGTH: usize = 5;

// horizontal, vertical, diagonal ↘, diagonal ↗
const AXES: [(i32, i32); 4] = [(0, 1), (1, 0), (1, 1), (-1, 1)];

/// Five-in-a-row on a 15x15 board. Black moves first; no passing.
#[derive(Debug, Clone, Copy, Default)]
pub struct FiveInARow;

impl FiveInARow {
    /// Longest line through `pos` counting the stone at `pos` once.
    pub fn longest_line(board: &Board, pos: Position, stone: Stone) -> usize {
        AXES.iter()
            .map(|&(dr, dc)| {
                1 + board.run_length(pos, dr, dc, stone) + board.run_length(pos, -dr, -dc, stone)
            })
            .max()
            .unwrap_or(1)
    }
}

impl RuleEngine for FiveInARow {
    fn variant(&self) -> Variant {
        Variant::FiveInARow
    }

    fn board_size(&self) -> usize {
        BOARD_SIZE
    }

    fn initial_state(&self, room_id: RoomId, _settings: &RuleSettings) -> GameState {
        GameState::new(room_id, Variant::FiveInARow, BOARD_SIZE, None)
    }

    fn apply(&self, state: &GameState, mv: Move) -> GameResult<GameState> {
        let position = match mv {
            Move::Place { position } => position,
            Move::Pass | Move::Resign => {
                if state.finished {
                    return Err(GameError::illegal(IllegalReason::GameFinished));
                }
                return Err(GameError::illegal(IllegalReason::UnsupportedMove));
            }
        };
        check_placement(state, position)?;

        let mover = state.current_turn;
        let mut next = state.clone();
        next.board.set(position, Some(mover));

        if Self::longest_line(&next.board, position, mover) >= WIN_LENGTH {
            debug!("{} completes five at {:?} in room {}", mover, position, state.room_id);
            next.finish(Outcome::win_for(mover));
        } else if !next.board.has_empty_cell() {
            next.finish(Outcome::Draw);
        } else {
            next.advance_turn();
        }

        Ok(next)
    }
}
