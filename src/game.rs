use serde::{Deserialize, Serialize};

use crate::actions::{ParticipantId, RoomId};
use crate::board::{Board, Position};
use crate::enums::{Outcome, Role, Stone, Variant};
use crate::errors::{GameError, GameResult};

/// A single thing a seated player can do on their turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Move {
    Place { position: Position },
    Pass,
    Resign,
}

impl Move {
    pub fn place(row: i32, col: i32) -> Self {
        Move::Place {
            position: Position::new(row, col),
        }
    }
}

/// Which participant sits in each colour's seat. `None` means the seat is open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seats {
    pub black: Option<ParticipantId>,
    pub white: Option<ParticipantId>,
}

impl Seats {
    pub fn get(&self, stone: Stone) -> Option<&ParticipantId> {
        match stone {
            Stone::Black => self.black.as_ref(),
            Stone::White => self.white.as_ref(),
        }
    }

    pub fn set(&mut self, stone: Stone, holder: Option<ParticipantId>) {
        match stone {
            Stone::Black => self.black = holder,
            Stone::White => self.white = holder,
        }
    }

    /// The colour held by `participant_id`, if any.
    pub fn seat_of(&self, participant_id: &str) -> Option<Stone> {
        if self.black.as_deref() == Some(participant_id) {
            Some(Stone::Black)
        } else if self.white.as_deref() == Some(participant_id) {
            Some(Stone::White)
        } else {
            None
        }
    }

    pub fn first_open(&self) -> Option<Stone> {
        [Stone::Black, Stone::White]
            .into_iter()
            .find(|stone| self.get(*stone).is_none())
    }

    pub fn is_full(&self) -> bool {
        self.black.is_some() && self.white.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.black.is_none() && self.white.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captures {
    pub black: u32,
    pub white: u32,
}

impl Captures {
    pub fn get(&self, stone: Stone) -> u32 {
        match stone {
            Stone::Black => self.black,
            Stone::White => self.white,
        }
    }

    pub fn add(&mut self, stone: Stone, count: u32) {
        match stone {
            Stone::Black => self.black += count,
            Stone::White => self.white += count,
        }
    }
}

/// Capture-Go bookkeeping carried alongside the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoMeta {
    pub captures: Captures,
    /// Board as it stood before the most recent accepted move or pass.
    pub previous_board: Option<Board>,
    pub passes: u8,
    pub resigned: bool,
    /// Compensation credited to white when scoring.
    pub komi: f64,
}

impl GoMeta {
    pub fn new(komi: f64) -> Self {
        Self {
            captures: Captures::default(),
            previous_board: None,
            passes: 0,
            resigned: false,
            komi,
        }
    }

    /// Captures plus komi for white. This is an approximation of Go scoring;
    /// territory is never counted.
    pub fn score(&self, stone: Stone) -> f64 {
        let captured = f64::from(self.captures.get(stone));
        match stone {
            Stone::Black => captured,
            Stone::White => captured + self.komi,
        }
    }
}

/// Full authoritative snapshot of one room's game.
///
/// Snapshots are values: every accepted change produces a new one and the
/// previous snapshot is never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub room_id: RoomId,
    pub variant: Variant,
    pub board: Board,
    pub current_turn: Stone,
    pub outcome: Outcome,
    pub finished: bool,
    pub roles: Seats,
    pub spectators: Vec<ParticipantId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub meta: Option<GoMeta>,
}

impl GameState {
    pub fn new(room_id: RoomId, variant: Variant, board_size: usize, meta: Option<GoMeta>) -> Self {
        Self {
            room_id,
            variant,
            board: Board::new(board_size),
            current_turn: Stone::Black,
            outcome: Outcome::None,
            finished: false,
            roles: Seats::default(),
            spectators: Vec::new(),
            meta,
        }
    }

    pub fn finish(&mut self, outcome: Outcome) {
        self.outcome = outcome;
        self.finished = outcome.is_decided();
    }

    pub fn advance_turn(&mut self) {
        self.current_turn = self.current_turn.opponent();
    }

    pub fn role_of(&self, participant_id: &str) -> Option<Role> {
        if let Some(stone) = self.roles.seat_of(participant_id) {
            return Some(Role::from(stone));
        }
        self.spectators
            .iter()
            .any(|id| id == participant_id)
            .then_some(Role::Spectator)
    }

    pub fn has_participants(&self) -> bool {
        !self.roles.is_empty() || !self.spectators.is_empty()
    }

    /// Checks that `next` is a well-formed successor of `self`. A failure here is a
    /// bug in a rule engine, never a player mistake.
    pub fn verify_successor(&self, next: &GameState) -> GameResult<()> {
        if next.room_id != self.room_id {
            return Err(GameError::internal(format!(
                "room id changed from {} to {}",
                self.room_id, next.room_id
            )));
        }
        if next.variant != self.variant {
            return Err(GameError::internal("variant changed mid-game"));
        }
        if next.board.size() != self.board.size() {
            return Err(GameError::internal(format!(
                "board resized from {} to {}",
                self.board.size(),
                next.board.size()
            )));
        }
        if next.finished != next.outcome.is_decided() {
            return Err(GameError::internal(format!(
                "finished={} inconsistent with outcome {}",
                next.finished, next.outcome
            )));
        }
        if self.finished && next.board != self.board {
            return Err(GameError::internal("board mutated after the game finished"));
        }
        Ok(())
    }
}
