use log::{debug, error, info, warn};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::actions::{ParticipantId, RoomId, ServerMessage, ANONYMOUS};
use crate::enums::{Role, RoomPhase, Variant};
use crate::errors::{GameError, GameResult};
use crate::game::{GameState, Move};
use crate::rules::{RuleEngine, RuleSettings};

/// Outbound half of one client connection.
pub type ConnectionSender = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub role: Role,
    pub game_state: GameState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub was_member: bool,
    pub now_empty: bool,
}

/// Deferred removal of an empty room. `epoch` identifies this particular
/// schedule so a stale timer can never remove a room that was revived.
#[derive(Debug)]
pub struct PendingDeletion {
    pub epoch: u64,
    pub task: JoinHandle<()>,
}

/// One room: the authoritative game snapshot plus who is connected to it.
///
/// A session is only ever touched through the registry's per-room lock, so every
/// method here runs with exclusive access and messages leave in the order the
/// snapshots were produced.
pub struct RoomSession {
    room_id: RoomId,
    engine: &'static dyn RuleEngine,
    state: GameState,
    connections: HashMap<ParticipantId, ConnectionSender>,
    display_names: HashMap<ParticipantId, String>,
    pending_deletion: Option<PendingDeletion>,
    deletion_epoch: u64,
}

impl RoomSession {
    pub fn new(room_id: RoomId, variant: Variant, settings: &RuleSettings) -> Self {
        let engine = variant.engine();
        Self {
            state: engine.initial_state(room_id.clone(), settings),
            room_id,
            engine,
            connections: HashMap::new(),
            display_names: HashMap::new(),
            pending_deletion: None,
            deletion_epoch: 0,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn variant(&self) -> Variant {
        self.engine.variant()
    }

    pub fn snapshot(&self) -> GameState {
        self.state.clone()
    }

    pub fn phase(&self) -> RoomPhase {
        if self.pending_deletion.is_some() {
            RoomPhase::Draining
        } else if self.state.finished {
            RoomPhase::Finished
        } else if self.state.roles.is_full() {
            RoomPhase::Active
        } else {
            RoomPhase::Open
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.state.has_participants()
    }

    pub fn participant_count(&self) -> usize {
        self.connections.len()
    }

    /// Seats the participant in the first open colour, or adds them as a spectator.
    /// A participant already in the room keeps its role and gets its connection
    /// rebound. Cancels any pending deletion.
    pub fn join(
        &mut self,
        participant_id: &str,
        display_name: Option<String>,
        connection: ConnectionSender,
    ) -> JoinOutcome {
        self.cancel_deletion();

        let role = match self.state.role_of(participant_id) {
            Some(role) => {
                debug!(
                    "{} rejoined room {} as {:?}",
                    participant_id, self.room_id, role
                );
                role
            }
            None => {
                let mut next = self.state.clone();
                let role = match next.roles.first_open() {
                    Some(stone) => {
                        next.roles.set(stone, Some(participant_id.to_string()));
                        Role::from(stone)
                    }
                    None => {
                        next.spectators.push(participant_id.to_string());
                        Role::Spectator
                    }
                };
                self.state = next;
                info!(
                    "{} joined room {} as {:?}",
                    participant_id, self.room_id, role
                );
                role
            }
        };

        // A rejoin without a name keeps the one given earlier.
        let display_name = display_name
            .or_else(|| self.display_names.get(participant_id).cloned())
            .unwrap_or_else(|| ANONYMOUS.to_string());
        self.display_names
            .insert(participant_id.to_string(), display_name.clone());
        self.connections
            .insert(participant_id.to_string(), connection.clone());

        self.deliver(
            participant_id,
            &connection,
            ServerMessage::RoleAssigned {
                room_id: self.room_id.clone(),
                participant_id: participant_id.to_string(),
                role,
            },
        );
        self.deliver(
            participant_id,
            &connection,
            ServerMessage::GameState {
                game_state: self.snapshot(),
            },
        );
        self.broadcast(
            ServerMessage::ParticipantJoined {
                participant_id: participant_id.to_string(),
                display_name,
                role,
                game_state: self.snapshot(),
            },
            Some(participant_id),
        );

        JoinOutcome {
            role,
            game_state: self.snapshot(),
        }
    }

    /// Validates seat and turn, runs the rule engine, and on success replaces the
    /// snapshot and broadcasts it. On failure nothing changes and nobody else hears
    /// about it; the caller reports the error to the requester.
    pub fn attempt_move(&mut self, participant_id: &str, mv: Move) -> GameResult<GameState> {
        let seat = self
            .state
            .roles
            .seat_of(participant_id)
            .ok_or_else(|| GameError::NotAPlayer {
                participant_id: participant_id.to_string(),
            })?;

        if seat != self.state.current_turn {
            return Err(GameError::NotYourTurn {
                current: self.state.current_turn,
            });
        }

        let next = self.engine.apply(&self.state, mv).map_err(|e| {
            debug!(
                "rejected {:?} from {} in room {}: {}",
                mv, participant_id, self.room_id, e
            );
            e
        })?;

        if let Err(e) = self.state.verify_successor(&next) {
            error!(
                "rule engine produced an invalid snapshot in room {}: {}",
                self.room_id, e
            );
            return Err(e);
        }

        self.state = next;
        self.broadcast(
            ServerMessage::GameState {
                game_state: self.snapshot(),
            },
            None,
        );

        if self.state.finished {
            info!("game over in room {}: {}", self.room_id, self.state.outcome);
            self.broadcast(
                ServerMessage::GameOver {
                    outcome: self.state.outcome,
                    game_state: self.snapshot(),
                },
                None,
            );
        }

        Ok(self.snapshot())
    }

    /// Frees the participant's seat or spectator slot. Ignored when the participant
    /// is bound to a different connection than `connection`, which happens when a
    /// stale socket closes after the participant reconnected elsewhere.
    pub fn leave(&mut self, participant_id: &str, connection: &ConnectionSender) -> LeaveOutcome {
        let bound_here = self.is_bound_to(participant_id, connection);

        let Some(role) = self.state.role_of(participant_id).filter(|_| bound_here) else {
            return LeaveOutcome {
                was_member: false,
                now_empty: self.is_empty(),
            };
        };

        let mut next = self.state.clone();
        match role.seat() {
            Some(stone) => next.roles.set(stone, None),
            None => next.spectators.retain(|id| id != participant_id),
        }
        self.state = next;
        self.connections.remove(participant_id);
        let display_name = self
            .display_names
            .remove(participant_id)
            .unwrap_or_else(|| ANONYMOUS.to_string());
        info!(
            "{} ({:?}) left room {}",
            participant_id, role, self.room_id
        );

        self.broadcast(
            ServerMessage::ParticipantLeft {
                participant_id: participant_id.to_string(),
                display_name,
                game_state: self.snapshot(),
            },
            None,
        );

        LeaveOutcome {
            was_member: true,
            now_empty: self.is_empty(),
        }
    }

    /// True when `participant_id` is currently bound to `connection`. A participant
    /// that reconnected elsewhere is no longer bound to its old socket.
    pub fn is_bound_to(&self, participant_id: &str, connection: &ConnectionSender) -> bool {
        self.connections
            .get(participant_id)
            .is_some_and(|bound| bound.same_channel(connection))
    }

    /// Reserves the epoch for a new deletion schedule.
    pub fn next_deletion_epoch(&mut self) -> u64 {
        self.deletion_epoch += 1;
        self.deletion_epoch
    }

    pub fn mark_draining(&mut self, pending: PendingDeletion) {
        if let Some(previous) = self.pending_deletion.replace(pending) {
            previous.task.abort();
        }
    }

    pub fn cancel_deletion(&mut self) {
        if let Some(pending) = self.pending_deletion.take() {
            pending.task.abort();
            info!("pending deletion of room {} cancelled", self.room_id);
        }
    }

    /// True when the deletion scheduled under `epoch` is still the current one
    /// and nobody has come back.
    pub fn is_expired(&self, epoch: u64) -> bool {
        self.pending_deletion
            .as_ref()
            .is_some_and(|pending| pending.epoch == epoch)
            && self.is_empty()
    }

    fn broadcast(&self, message: ServerMessage, except: Option<&str>) {
        for (participant_id, connection) in &self.connections {
            if except == Some(participant_id.as_str()) {
                continue;
            }
            self.deliver(participant_id, connection, message.clone());
        }
    }

    fn deliver(&self, participant_id: &str, connection: &ConnectionSender, message: ServerMessage) {
        if connection.send(message).is_err() {
            warn!(
                "dropping message for {} in room {}: connection closed",
                participant_id, self.room_id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{Outcome, Stone};
    use crate::errors::IllegalReason;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn connection() -> (ConnectionSender, UnboundedReceiver<ServerMessage>) {
        mpsc::unbounded_channel()
    }

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn session(variant: Variant) -> RoomSession {
        RoomSession::new("ROOM42".to_string(), variant, &RuleSettings::default())
    }

    #[test]
    fn test_join_assigns_black_white_then_spectators() {
        let mut room = session(Variant::FiveInARow);
        let (a, _ra) = connection();
        let (b, _rb) = connection();
        let (c, _rc) = connection();

        assert_eq!(room.phase(), RoomPhase::Open);
        assert_eq!(room.join("a", None, a).role, Role::Black);
        assert_eq!(room.join("b", None, b).role, Role::White);
        assert_eq!(room.phase(), RoomPhase::Active);
        let outcome = room.join("c", Some("Carol".to_string()), c);
        assert_eq!(outcome.role, Role::Spectator);
        assert_eq!(outcome.game_state.spectators, vec!["c".to_string()]);
    }

    #[test]
    fn test_join_notifies_requester_and_others() {
        let mut room = session(Variant::FiveInARow);
        let (a, mut ra) = connection();
        let (b, mut rb) = connection();
        room.join("a", Some("Alice".to_string()), a);
        drain(&mut ra);

        room.join("b", None, b);

        let to_b = drain(&mut rb);
        assert!(matches!(
            to_b[0],
            ServerMessage::RoleAssigned {
                role: Role::White,
                ..
            }
        ));
        assert!(matches!(to_b[1], ServerMessage::GameState { .. }));
        assert_eq!(to_b.len(), 2);

        let to_a = drain(&mut ra);
        assert_eq!(to_a.len(), 1);
        match &to_a[0] {
            ServerMessage::ParticipantJoined {
                participant_id,
                display_name,
                role,
                game_state,
            } => {
                assert_eq!(participant_id, "b");
                assert_eq!(display_name, ANONYMOUS);
                assert_eq!(*role, Role::White);
                assert_eq!(game_state.roles.white.as_deref(), Some("b"));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_rejoin_keeps_seat() {
        let mut room = session(Variant::FiveInARow);
        let (a1, _r1) = connection();
        let (a2, _r2) = connection();
        room.join("a", None, a1);
        let outcome = room.join("a", None, a2);
        assert_eq!(outcome.role, Role::Black);
        assert!(outcome.game_state.roles.white.is_none());
        assert!(outcome.game_state.spectators.is_empty());
    }

    #[test]
    fn test_spectator_cannot_move() {
        let mut room = session(Variant::FiveInARow);
        let (a, _ra) = connection();
        let (b, _rb) = connection();
        let (s, _rs) = connection();
        room.join("a", None, a);
        room.join("b", None, b);
        room.join("s", None, s);
        let before = room.snapshot();

        assert_eq!(
            room.attempt_move("s", Move::place(7, 7)),
            Err(GameError::NotAPlayer {
                participant_id: "s".to_string()
            })
        );
        assert_eq!(
            room.attempt_move("stranger", Move::place(7, 7)),
            Err(GameError::NotAPlayer {
                participant_id: "stranger".to_string()
            })
        );
        assert_eq!(room.snapshot(), before);
    }

    #[test]
    fn test_out_of_turn_move_is_rejected_without_broadcast() {
        let mut room = session(Variant::FiveInARow);
        let (a, mut ra) = connection();
        let (b, _rb) = connection();
        room.join("a", None, a);
        room.join("b", None, b);
        drain(&mut ra);

        assert_eq!(
            room.attempt_move("b", Move::place(0, 0)),
            Err(GameError::NotYourTurn {
                current: Stone::Black
            })
        );
        assert!(drain(&mut ra).is_empty());
    }

    #[test]
    fn test_accepted_move_reaches_everyone_in_order() {
        let mut room = session(Variant::FiveInARow);
        let (a, mut ra) = connection();
        let (b, mut rb) = connection();
        let (s, mut rs) = connection();
        room.join("a", None, a);
        room.join("b", None, b);
        room.join("s", None, s);
        for rx in [&mut ra, &mut rb, &mut rs] {
            drain(rx);
        }

        room.attempt_move("a", Move::place(7, 7)).unwrap();
        room.attempt_move("b", Move::place(0, 0)).unwrap();

        for rx in [&mut ra, &mut rb, &mut rs] {
            let turns: Vec<Stone> = drain(rx)
                .into_iter()
                .map(|message| match message {
                    ServerMessage::GameState { game_state } => game_state.current_turn,
                    other => panic!("unexpected message {:?}", other),
                })
                .collect();
            assert_eq!(turns, vec![Stone::White, Stone::Black]);
        }
    }

    #[test]
    fn test_five_in_a_row_scenario_ends_with_game_over() {
        let mut room = session(Variant::FiveInARow);
        let (a, mut ra) = connection();
        let (b, mut rb) = connection();
        room.join("a", None, a);
        room.join("b", None, b);

        for col in 7..11 {
            room.attempt_move("a", Move::place(7, col)).unwrap();
            room.attempt_move("b", Move::place(0, col)).unwrap();
        }
        drain(&mut ra);
        drain(&mut rb);

        let state = room.attempt_move("a", Move::place(7, 11)).unwrap();
        assert!(state.finished);
        assert_eq!(state.outcome, Outcome::BlackWins);
        assert_eq!(room.phase(), RoomPhase::Finished);

        let to_b = drain(&mut rb);
        assert_eq!(to_b.len(), 2);
        assert!(matches!(
            to_b[1],
            ServerMessage::GameOver {
                outcome: Outcome::BlackWins,
                ..
            }
        ));

        assert_eq!(
            room.attempt_move("b", Move::place(1, 1)),
            Err(GameError::NotYourTurn {
                current: Stone::Black
            })
        );
        assert_eq!(
            room.attempt_move("a", Move::place(1, 1)),
            Err(GameError::illegal(IllegalReason::GameFinished))
        );
    }

    #[test]
    fn test_capture_go_pass_goes_through_session() {
        let mut room = session(Variant::CaptureGo);
        let (a, _ra) = connection();
        let (b, _rb) = connection();
        room.join("a", None, a);
        room.join("b", None, b);

        room.attempt_move("a", Move::Pass).unwrap();
        let state = room.attempt_move("b", Move::Pass).unwrap();
        assert_eq!(state.outcome, Outcome::WhiteWins);
    }

    #[test]
    fn test_leave_clears_seat_but_keeps_game() {
        let mut room = session(Variant::FiveInARow);
        let (a, _ra) = connection();
        let (b, mut rb) = connection();
        room.join("a", None, a.clone());
        room.join("b", None, b);
        room.attempt_move("a", Move::place(7, 7)).unwrap();
        drain(&mut rb);

        let outcome = room.leave("a", &a);
        assert_eq!(
            outcome,
            LeaveOutcome {
                was_member: true,
                now_empty: false
            }
        );
        let state = room.snapshot();
        assert!(state.roles.black.is_none());
        assert_eq!(state.board.get(crate::board::Position::new(7, 7)), Some(Some(Stone::Black)));
        assert!(!state.finished);
        assert!(matches!(
            drain(&mut rb)[0],
            ServerMessage::ParticipantLeft { .. }
        ));

        // The next newcomer takes the vacated seat.
        let (c, _rc) = connection();
        assert_eq!(room.join("c", None, c).role, Role::Black);
    }

    #[test]
    fn test_stale_connection_cannot_evict_reconnected_participant() {
        let mut room = session(Variant::FiveInARow);
        let (old, _ro) = connection();
        let (new, _rn) = connection();
        room.join("a", None, old.clone());
        room.join("a", None, new.clone());

        assert!(!room.leave("a", &old).was_member);
        assert_eq!(room.snapshot().roles.black.as_deref(), Some("a"));
        assert!(room.leave("a", &new).now_empty);
    }

    #[test]
    fn test_spectator_leave() {
        let mut room = session(Variant::FiveInARow);
        let (a, _ra) = connection();
        let (b, _rb) = connection();
        let (s, _rs) = connection();
        room.join("a", None, a);
        room.join("b", None, b);
        room.join("s", None, s.clone());

        assert!(room.leave("s", &s).was_member);
        assert!(room.snapshot().spectators.is_empty());
        assert_eq!(room.participant_count(), 2);
    }

    /// Engine that breaks the board-size invariant on every move.
    struct ResizingEngine;

    static RESIZING_ENGINE: ResizingEngine = ResizingEngine;

    impl RuleEngine for ResizingEngine {
        fn variant(&self) -> Variant {
            Variant::FiveInARow
        }

        fn board_size(&self) -> usize {
            15
        }

        fn initial_state(&self, room_id: RoomId, settings: &RuleSettings) -> GameState {
            Variant::FiveInARow.engine().initial_state(room_id, settings)
        }

        fn apply(&self, state: &GameState, _mv: Move) -> GameResult<GameState> {
            let mut next = state.clone();
            next.board = crate::board::Board::new(9);
            next.advance_turn();
            Ok(next)
        }
    }

    #[test]
    fn test_invalid_engine_output_is_contained() {
        let mut room = session(Variant::FiveInARow);
        let (a, mut ra) = connection();
        let (b, mut rb) = connection();
        room.join("a", None, a);
        room.join("b", None, b);
        drain(&mut ra);
        drain(&mut rb);
        let before = room.snapshot();

        room.engine = &RESIZING_ENGINE;
        let result = room.attempt_move("a", Move::place(7, 7));
        assert!(matches!(result, Err(GameError::InternalFailure { .. })));
        assert_eq!(room.snapshot(), before);
        assert!(drain(&mut ra).is_empty());
        assert!(drain(&mut rb).is_empty());

        room.engine = Variant::FiveInARow.engine();
        let state = room.attempt_move("a", Move::place(7, 7)).unwrap();
        assert_eq!(state.current_turn, Stone::White);
        assert_eq!(drain(&mut rb).len(), 1);
    }

    #[test]
    fn test_display_name_survives_rejoin_and_is_announced_on_leave() {
        let mut room = session(Variant::FiveInARow);
        let (a1, _r1) = connection();
        let (a2, _r2) = connection();
        let (b, mut rb) = connection();
        room.join("a", Some("Alice".to_string()), a1);
        room.join("b", None, b);
        room.join("a", None, a2.clone());

        let joined = drain(&mut rb);
        assert!(matches!(
            joined.last(),
            Some(ServerMessage::ParticipantJoined { display_name, .. }) if display_name == "Alice"
        ));

        room.leave("a", &a2);
        assert!(matches!(
            drain(&mut rb).last(),
            Some(ServerMessage::ParticipantLeft { display_name, .. }) if display_name == "Alice"
        ));
    }

    #[test]
    fn test_join_with_closed_connection_still_seats_participant() {
        let mut room = session(Variant::FiveInARow);
        let (a, ra) = connection();
        drop(ra);

        let outcome = room.join("a", None, a.clone());
        assert_eq!(outcome.role, Role::Black);
        assert!(room.is_bound_to("a", &a));
    }

    #[test]
    fn test_binding_follows_latest_connection() {
        let mut room = session(Variant::FiveInARow);
        let (old, _ro) = connection();
        let (new, _rn) = connection();
        room.join("a", None, old.clone());
        assert!(room.is_bound_to("a", &old));

        room.join("a", None, new.clone());
        assert!(!room.is_bound_to("a", &old));
        assert!(room.is_bound_to("a", &new));
        assert!(!room.is_bound_to("stranger", &new));
    }

    #[tokio::test]
    async fn test_join_cancels_pending_deletion() {
        let mut room = session(Variant::FiveInARow);
        let (a, _ra) = connection();
        room.join("a", None, a.clone());
        assert!(room.leave("a", &a).now_empty);

        let epoch = room.next_deletion_epoch();
        let task = tokio::spawn(std::future::pending::<()>());
        room.mark_draining(PendingDeletion { epoch, task });
        assert_eq!(room.phase(), RoomPhase::Draining);
        assert!(room.is_expired(epoch));

        room.join("a", None, a);
        assert!(!room.is_expired(epoch));
        assert_eq!(room.phase(), RoomPhase::Open);
    }
}
