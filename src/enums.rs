use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rules::{capture_go::CaptureGo, five_in_a_row::FiveInARow, RuleEngine};

/// Stone colour. Black is seat A and always moves first; white is seat B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stone {
    Black,
    White,
}

impl Stone {
    pub fn opponent(self) -> Self {
        match self {
            Stone::Black => Stone::White,
            Stone::White => Stone::Black,
        }
    }
}

impl fmt::Display for Stone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stone::Black => write!(f, "black"),
            Stone::White => write!(f, "white"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    None,
    BlackWins,
    WhiteWins,
    Draw,
}

impl Outcome {
    pub fn win_for(stone: Stone) -> Self {
        match stone {
            Stone::Black => Outcome::BlackWins,
            Stone::White => Outcome::WhiteWins,
        }
    }

    pub fn is_decided(self) -> bool {
        self != Outcome::None
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::None => write!(f, "undecided"),
            Outcome::BlackWins => write!(f, "black wins"),
            Outcome::WhiteWins => write!(f, "white wins"),
            Outcome::Draw => write!(f, "draw"),
        }
    }
}

/// Game variant chosen when a room is created. It travels with the room for its
/// whole lifetime and selects the rule engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    #[default]
    FiveInARow,
    CaptureGo,
}

impl Variant {
    pub fn engine(self) -> &'static dyn RuleEngine {
        match self {
            Variant::FiveInARow => &FiveInARow,
            Variant::CaptureGo => &CaptureGo,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::FiveInARow => write!(f, "five_in_a_row"),
            Variant::CaptureGo => write!(f, "capture_go"),
        }
    }
}

/// What a participant is allowed to do inside a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Black,
    White,
    Spectator,
}

impl Role {
    pub fn seat(self) -> Option<Stone> {
        match self {
            Role::Black => Some(Stone::Black),
            Role::White => Some(Stone::White),
            Role::Spectator => None,
        }
    }
}

impl From<Stone> for Role {
    fn from(stone: Stone) -> Self {
        match stone {
            Stone::Black => Role::Black,
            Stone::White => Role::White,
        }
    }
}

/// Lifecycle of a room as seen from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    Open,
    Active,
    Finished,
    Draining,
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomPhase::Open => write!(f, "open"),
            RoomPhase::Active => write!(f, "active"),
            RoomPhase::Finished => write!(f, "finished"),
            RoomPhase::Draining => write!(f, "draining"),
        }
    }
}
