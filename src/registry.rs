use log::{debug, info};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::actions::RoomId;
use crate::enums::{RoomPhase, Variant};
use crate::errors::{GameError, GameResult};
use crate::game::{GameState, Move};
use crate::rules::RuleSettings;
use crate::session::{ConnectionSender, JoinOutcome, PendingDeletion, RoomSession};

/// No 0/O or 1/I so codes survive being read aloud or retyped.
pub const ROOM_ID_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const ROOM_ID_LENGTH: usize = 6;
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(60);

pub type SharedSession = Arc<Mutex<RoomSession>>;

#[derive(Debug, Clone, Copy)]
pub struct RegistryConfig {
    pub grace_period: Duration,
    pub rules: RuleSettings,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            rules: RuleSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub variant: Variant,
    pub phase: RoomPhase,
    pub participants: usize,
}

/// Process-wide table of live rooms. Starts empty; rooms leave it only through
/// their own grace-period expiry.
///
/// Lock order is always table first, then session. Nothing holding a session
/// lock ever touches the table.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<RoomId, SharedSession>>>,
    config: RegistryConfig,
}

impl RoomRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub async fn create_room(&self, variant: Variant) -> RoomId {
        let mut rooms = self.rooms.write().await;
        let room_id = loop {
            let candidate = generate_room_id();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
            debug!("room id collision on {}, retrying", candidate);
        };

        // A new room starts empty, so it drains like any other empty room until
        // someone joins.
        let mut session = RoomSession::new(room_id.clone(), variant, &self.config.rules);
        info!("created {} room {}", variant, room_id);
        self.schedule_deletion(&mut session);
        rooms.insert(room_id.clone(), Arc::new(Mutex::new(session)));
        room_id
    }

    pub async fn get(&self, room_id: &str) -> GameResult<SharedSession> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| GameError::room_not_found(room_id))
    }

    pub async fn snapshot(&self, room_id: &str) -> GameResult<GameState> {
        let session = self.get(room_id).await?;
        let session = session.lock().await;
        Ok(session.snapshot())
    }

    pub async fn join(
        &self,
        room_id: &str,
        participant_id: &str,
        display_name: Option<String>,
        connection: ConnectionSender,
    ) -> GameResult<JoinOutcome> {
        let session = self.get(room_id).await?;
        let mut session = session.lock().await;
        Ok(session.join(participant_id, display_name, connection))
    }

    pub async fn make_move(
        &self,
        room_id: &str,
        participant_id: &str,
        mv: Move,
    ) -> GameResult<GameState> {
        let session = self.get(room_id).await?;
        let mut session = session.lock().await;
        session.attempt_move(participant_id, mv)
    }

    /// Like `make_move`, but only for the connection the participant is currently
    /// bound to. A socket left over from before a reconnect gets `NotAPlayer`.
    pub async fn make_move_from(
        &self,
        room_id: &str,
        participant_id: &str,
        mv: Move,
        connection: &ConnectionSender,
    ) -> GameResult<GameState> {
        let session = self.get(room_id).await?;
        let mut session = session.lock().await;
        if !session.is_bound_to(participant_id, connection) {
            return Err(GameError::NotAPlayer {
                participant_id: participant_id.to_string(),
            });
        }
        session.attempt_move(participant_id, mv)
    }

    /// Removes the participant and, if that empties the room, schedules its
    /// deletion after the grace period.
    pub async fn leave(
        &self,
        room_id: &str,
        participant_id: &str,
        connection: &ConnectionSender,
    ) -> GameResult<bool> {
        let session = self.get(room_id).await?;
        let mut session = session.lock().await;
        let outcome = session.leave(participant_id, connection);
        if outcome.was_member && outcome.now_empty {
            self.schedule_deletion(&mut session);
        }
        Ok(outcome.was_member)
    }

    fn schedule_deletion(&self, session: &mut RoomSession) {
        let epoch = session.next_deletion_epoch();
        let registry = self.clone();
        let room_id = session.room_id().to_string();
        let grace = self.config.grace_period;

        let task = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            registry.expire(&room_id, epoch).await;
        });
        session.mark_draining(PendingDeletion { epoch, task });
        info!(
            "room {} is empty, deleting in {}s unless someone joins",
            session.room_id(),
            grace.as_secs()
        );
    }

    /// Grace-period callback. Re-checks under the locks because a join may have
    /// revived the room after the timer was armed.
    async fn expire(&self, room_id: &str, epoch: u64) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(shared) = rooms.get(room_id).cloned() else {
            return false;
        };
        let expired = shared.lock().await.is_expired(epoch);
        if !expired {
            debug!("room {} revived before expiry", room_id);
            return false;
        }
        rooms.remove(room_id);
        info!("room {} deleted due to inactivity", room_id);
        true
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn summaries(&self) -> Vec<RoomSummary> {
        let sessions: Vec<SharedSession> = self.rooms.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(sessions.len());
        for shared in sessions {
            let session = shared.lock().await;
            summaries.push(RoomSummary {
                room_id: session.room_id().to_string(),
                variant: session.variant(),
                phase: session.phase(),
                participants: session.participant_count(),
            });
        }
        summaries.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        summaries
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

pub fn generate_room_id() -> RoomId {
    let mut rng = rand::thread_rng();
    (0..ROOM_ID_LENGTH)
        .map(|_| ROOM_ID_ALPHABET[rng.gen_range(0..ROOM_ID_ALPHABET.len())] as char)
        .collect()
}
