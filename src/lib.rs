// Stoneroom Server Library
//
// Real-time rooms for five-in-a-row and capture Go. Rules live behind a
// pluggable engine trait; rooms are coordinated by per-room sessions held in a
// shared registry.

// Core data structures and enums
pub mod board;
pub mod enums;
pub mod errors;
pub mod game;

// Rule engines
pub mod rules;

// Room coordination
pub mod registry;
pub mod session;

// Server implementation
pub mod actions;
pub mod config;
pub mod websocket;

// Re-export common types for convenient access
pub use crate::actions::{ClientMessage, ParticipantId, RoomId, ServerMessage};
pub use crate::board::{Board, Position};
pub use crate::enums::{Outcome, Role, RoomPhase, Stone, Variant};
pub use crate::errors::{GameError, GameResult, IllegalReason, NetworkError};
pub use crate::game::{GameState, Move};
pub use crate::registry::{RegistryConfig, RoomRegistry};
pub use crate::rules::{RuleEngine, RuleSettings};
pub use crate::session::RoomSession;
pub use crate::websocket::WebSocketService;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
