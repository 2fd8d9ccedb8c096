use serde::{Deserialize, Serialize};

use crate::enums::{Outcome, Role, Variant};
use crate::errors::{GameError, NetworkError};
use crate::game::GameState;

/// Short room code handed out by the registry.
pub type RoomId = String;

/// Client-chosen identifier for a participant; the only identity the server knows.
pub type ParticipantId = String;

pub const ANONYMOUS: &str = "Anonymous";

/// Messages a client sends over its WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "create_room")]
    CreateRoom {
        #[serde(default)]
        variant: Variant,
    },

    #[serde(rename = "join_room")]
    JoinRoom {
        room_id: RoomId,
        participant_id: ParticipantId,
        #[serde(default)]
        display_name: Option<String>,
    },

    #[serde(rename = "make_move")]
    MakeMove {
        room_id: RoomId,
        participant_id: ParticipantId,
        row: i32,
        col: i32,
    },

    #[serde(rename = "pass")]
    Pass {
        room_id: RoomId,
        participant_id: ParticipantId,
    },

    #[serde(rename = "resign")]
    Resign {
        room_id: RoomId,
        participant_id: ParticipantId,
    },

    #[serde(rename = "leave_room")]
    LeaveRoom {
        room_id: RoomId,
        participant_id: ParticipantId,
    },
}

/// Messages the server pushes to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "greeting")]
    Greeting { message: String },

    #[serde(rename = "room_created")]
    RoomCreated { room_id: RoomId, variant: Variant },

    #[serde(rename = "role_assigned")]
    RoleAssigned {
        room_id: RoomId,
        participant_id: ParticipantId,
        role: Role,
    },

    #[serde(rename = "game_state")]
    GameState { game_state: GameState },

    #[serde(rename = "participant_joined")]
    ParticipantJoined {
        participant_id: ParticipantId,
        display_name: String,
        role: Role,
        game_state: GameState,
    },

    #[serde(rename = "participant_left")]
    ParticipantLeft {
        participant_id: ParticipantId,
        display_name: String,
        game_state: GameState,
    },

    #[serde(rename = "game_over")]
    GameOver {
        outcome: Outcome,
        game_state: GameState,
    },

    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl From<&GameError> for ServerMessage {
    fn from(error: &GameError) -> Self {
        ServerMessage::Error {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

impl From<&NetworkError> for ServerMessage {
    fn from(error: &NetworkError) -> Self {
        ServerMessage::Error {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}
