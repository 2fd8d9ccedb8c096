use log::debug;
use std::cmp::Ordering;
use std::collections::HashSet;

use super::{check_placement, RuleEngine, RuleSettings};
use crate::actions::RoomId;
use crate::board::{Board, Position};
use crate::enums::{Outcome, Stone, Variant};
use crate::errors::{GameError, GameResult, IllegalReason};
use crate::game::{GameState, GoMeta, Move};

pub const BOARD_SIZE: usize = 19;
pub const PASSES_TO_END: u8 = 2;

/// Go on a 19x19 board with captures, suicide and simple ko, scored by captures
/// plus komi rather than by area.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureGo;

impl CaptureGo {
    /// Removes every `victim` group left without liberties, anywhere on the board.
    /// Returns the number of stones taken off.
    pub fn capture_sweep(board: &mut Board, victim: Stone) -> usize {
        let mut seen: HashSet<Position> = HashSet::new();
        let mut dead: HashSet<Position> = HashSet::new();

        for pos in board.positions() {
            if board.get(pos) != Some(Some(victim)) || seen.contains(&pos) {
                continue;
            }
            let group = board.group(pos);
            if !group.has_liberty {
                dead.extend(group.stones.iter().copied());
            }
            seen.extend(group.stones);
        }

        board.remove(&dead)
    }

    pub fn outcome_by_score(meta: &GoMeta) -> Outcome {
        let black = meta.score(Stone::Black);
        let white = meta.score(Stone::White);
        match black.total_cmp(&white) {
            Ordering::Greater => Outcome::BlackWins,
            Ordering::Less => Outcome::WhiteWins,
            Ordering::Equal => Outcome::Draw,
        }
    }

    fn pass(state: &GameState, meta: &GoMeta) -> GameState {
        let mut next = state.clone();
        let mut meta = meta.clone();
        meta.passes += 1;
        meta.previous_board = Some(state.board.clone());

        if meta.passes >= PASSES_TO_END {
            let outcome = Self::outcome_by_score(&meta);
            debug!(
                "room {} ends on passes: black {} / white {} -> {}",
                state.room_id,
                meta.score(Stone::Black),
                meta.score(Stone::White),
                outcome
            );
            next.finish(outcome);
        } else {
            next.advance_turn();
        }
        next.meta = Some(meta);
        next
    }

    fn resign(state: &GameState, meta: &GoMeta) -> GameState {
        let mut next = state.clone();
        let mut meta = meta.clone();
        meta.resigned = true;
        next.finish(Outcome::win_for(state.current_turn.opponent()));
        next.meta = Some(meta);
        next
    }

    fn place(state: &GameState, meta: &GoMeta, position: Position) -> GameResult<GameState> {
        check_placement(state, position)?;

        let mover = state.current_turn;
        let before = state.board.clone();
        let mut board = state.board.clone();
        board.set(position, Some(mover));

        // Captures first: a move that takes the last liberty of an enemy group
        // is legal even if it had none of its own before the removal.
        let captured = Self::capture_sweep(&mut board, mover.opponent());

        if !board.group(position).has_liberty {
            return Err(GameError::SuicideMove);
        }
        if meta.previous_board.as_ref() == Some(&board) {
            return Err(GameError::KoViolation);
        }

        let mut meta = meta.clone();
        meta.captures.add(mover, captured as u32);
        meta.previous_board = Some(before);
        meta.passes = 0;

        if captured > 0 {
            debug!(
                "{} captures {} at {:?} in room {}",
                mover, captured, position, state.room_id
            );
        }

        let mut next = state.clone();
        next.board = board;
        next.meta = Some(meta);
        next.advance_turn();
        Ok(next)
    }
}

impl RuleEngine for CaptureGo {
    fn variant(&self) -> Variant {
        Variant::CaptureGo
    }

    fn board_size(&self) -> usize {
        BOARD_SIZE
    }

    fn initial_state(&self, room_id: RoomId, settings: &RuleSettings) -> GameState {
        GameState::new(
            room_id,
            Variant::CaptureGo,
            BOARD_SIZE,
            Some(GoMeta::new(settings.komi)),
        )
    }

    fn apply(&self, state: &GameState, mv: Move) -> GameResult<GameState> {
        if state.finished {
            return Err(GameError::illegal(IllegalReason::GameFinished));
        }
        let meta = state
            .meta
            .as_ref()
            .ok_or_else(|| GameError::internal("capture-go snapshot has no metadata"))?;

        match mv {
            Move::Pass => Ok(Self::pass(state, meta)),
            Move::Resign => Ok(Self::resign(state, meta)),
            Move::Place { position } => Self::place(state, meta, position),
        }
    }
}
