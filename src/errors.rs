use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::actions::{ParticipantId, RoomId};
use crate::enums::Stone;

/// Everything that can go wrong while handling a room event.
///
/// Rule rejections are recovered by the room session and delivered only to the
/// participant that caused them; none of these variants ever tears down a room.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum GameError {
    #[error("Room not found: {room_id}")]
    RoomNotFound { room_id: RoomId },

    #[error("You are not a player in this game: {participant_id}")]
    NotAPlayer { participant_id: ParticipantId },

    #[error("Not your turn: {current} to move")]
    NotYourTurn { current: Stone },

    #[error("Illegal move: {reason}")]
    IllegalMove { reason: IllegalReason },

    #[error("Suicide move: the placed group would have no liberties")]
    SuicideMove,

    #[error("Ko violation: the move recreates the previous position")]
    KoViolation,

    #[error("Internal failure: {details}")]
    InternalFailure { details: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IllegalReason {
    GameFinished,
    OutOfBounds,
    Occupied,
    UnsupportedMove,
}

impl fmt::Display for IllegalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IllegalReason::GameFinished => write!(f, "game is already finished"),
            IllegalReason::OutOfBounds => write!(f, "position is off the board"),
            IllegalReason::Occupied => write!(f, "cell is already occupied"),
            IllegalReason::UnsupportedMove => write!(f, "move not supported by this variant"),
        }
    }
}

impl GameError {
    pub fn illegal(reason: IllegalReason) -> Self {
        Self::IllegalMove { reason }
    }

    pub fn room_not_found(room_id: impl Into<RoomId>) -> Self {
        Self::RoomNotFound {
            room_id: room_id.into(),
        }
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::InternalFailure {
            details: details.into(),
        }
    }

    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::RoomNotFound { .. } => "room_not_found",
            GameError::NotAPlayer { .. } => "not_a_player",
            GameError::NotYourTurn { .. } => "not_your_turn",
            GameError::IllegalMove { .. } => "illegal_move",
            GameError::SuicideMove => "suicide_move",
            GameError::KoViolation => "ko_violation",
            GameError::InternalFailure { .. } => "internal_failure",
        }
    }
}

/// Transport-level problems with a single connection.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum NetworkError {
    #[error("Message serialization failed: {details}")]
    SerializationFailed { details: String },

    #[error("Message deserialization failed: {details}")]
    DeserializationFailed { details: String },

    #[error("Connection closed: {connection_id}")]
    ConnectionClosed { connection_id: String },
}

impl NetworkError {
    pub fn code(&self) -> &'static str {
        match self {
            NetworkError::SerializationFailed { .. } => "serialization_failed",
            NetworkError::DeserializationFailed { .. } => "bad_request",
            NetworkError::ConnectionClosed { .. } => "connection_closed",
        }
    }
}

pub type GameResult<T> = Result<T, GameError>;
pub type NetworkResult<T> = Result<T, NetworkError>;
