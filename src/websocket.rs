use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use log;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::actions::{ClientMessage, ParticipantId, RoomId, ServerMessage};
use crate::errors::{GameError, NetworkError, NetworkResult};
use crate::game::Move;
use crate::registry::RoomRegistry;
use crate::session::ConnectionSender;

/// Rooms this connection has joined, and under which participant id.
pub type Memberships = Arc<Mutex<HashSet<(RoomId, ParticipantId)>>>;

/// Bridges WebSocket connections to the room registry. Holds no game logic;
/// everything room-related is delegated to the registry and its sessions.
#[derive(Clone)]
pub struct WebSocketService {
    registry: RoomRegistry,
    active_connections: Arc<AtomicUsize>,
}

impl WebSocketService {
    pub fn new(registry: RoomRegistry) -> Self {
        Self {
            registry,
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Handle a new WebSocket connection until either side closes it.
    pub async fn handle_connection(&self, socket: WebSocket) {
        let connection_id = format!("conn_{}", uuid::Uuid::new_v4());
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        log::info!("WebSocket connected: {}", connection_id);

        let (mut sender, mut receiver) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
        let memberships: Memberships = Arc::new(Mutex::new(HashSet::new()));

        let _ = tx.send(ServerMessage::Greeting {
            message: "Connected to stoneroom".to_string(),
        });

        // Task to drain this connection's outbox onto the socket
        let connection_id_for_updates = connection_id.clone();
        let mut update_task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = Self::send_message(&mut sender, &message).await {
                    let closed = NetworkError::ConnectionClosed {
                        connection_id: connection_id_for_updates.clone(),
                    };
                    log::debug!("{} ({})", closed, e);
                    break;
                }
            }
        });

        // Task to handle incoming messages
        let service = self.clone();
        let tx_for_messages = tx.clone();
        let memberships_for_messages = memberships.clone();
        let connection_id_for_messages = connection_id.clone();
        let mut message_task = tokio::spawn(async move {
            while let Some(Ok(message)) = receiver.next().await {
                match message {
                    Message::Text(text) => {
                        if let Err(e) = service
                            .handle_text_message(
                                text.as_str(),
                                &tx_for_messages,
                                &memberships_for_messages,
                            )
                            .await
                        {
                            log::warn!(
                                "Bad message from connection {}: {}",
                                connection_id_for_messages,
                                e
                            );
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });

        tokio::select! {
            _ = &mut update_task => {
                message_task.abort();
            }
            _ = &mut message_task => {
                update_task.abort();
            }
        }

        self.release_memberships(&memberships, &tx).await;
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
        log::info!("WebSocket connection {} terminated", connection_id);
    }

    /// Parses one text frame and dispatches it. Malformed frames get an error reply
    /// and are reported to the caller; they never reach a room.
    pub async fn handle_text_message(
        &self,
        text: &str,
        tx: &ConnectionSender,
        memberships: &Memberships,
    ) -> NetworkResult<()> {
        let message: ClientMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                let error = NetworkError::DeserializationFailed {
                    details: e.to_string(),
                };
                let _ = tx.send(ServerMessage::from(&error));
                return Err(error);
            }
        };

        log::debug!("Dispatching {:?}", message);
        if let Err(e) = self.dispatch(message, tx, memberships).await {
            if let GameError::InternalFailure { .. } = e {
                log::error!("Internal failure while handling a message: {}", e);
            }
            let _ = tx.send(ServerMessage::from(&e));
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        message: ClientMessage,
        tx: &ConnectionSender,
        memberships: &Memberships,
    ) -> Result<(), GameError> {
        match message {
            ClientMessage::CreateRoom { variant } => {
                let room_id = self.registry.create_room(variant).await;
                let _ = tx.send(ServerMessage::RoomCreated { room_id, variant });
            }
            ClientMessage::JoinRoom {
                room_id,
                participant_id,
                display_name,
            } => {
                self.registry
                    .join(&room_id, &participant_id, display_name, tx.clone())
                    .await?;
                memberships.lock().await.insert((room_id, participant_id));
            }
            ClientMessage::MakeMove {
                room_id,
                participant_id,
                row,
                col,
            } => {
                self.play(room_id, participant_id, Move::place(row, col), tx, memberships)
                    .await?;
            }
            ClientMessage::Pass {
                room_id,
                participant_id,
            } => {
                self.play(room_id, participant_id, Move::Pass, tx, memberships)
                    .await?;
            }
            ClientMessage::Resign {
                room_id,
                participant_id,
            } => {
                self.play(room_id, participant_id, Move::Resign, tx, memberships)
                    .await?;
            }
            ClientMessage::LeaveRoom {
                room_id,
                participant_id,
            } => {
                let key = (room_id, participant_id);
                if memberships.lock().await.remove(&key) {
                    self.registry.leave(&key.0, &key.1, tx).await?;
                }
            }
        }
        Ok(())
    }

    /// Moves are only accepted for participant ids this connection joined with and
    /// is still bound to.
    async fn play(
        &self,
        room_id: RoomId,
        participant_id: ParticipantId,
        mv: Move,
        tx: &ConnectionSender,
        memberships: &Memberships,
    ) -> Result<(), GameError> {
        // Unknown rooms report RoomNotFound before any identity check.
        self.registry.get(&room_id).await?;

        let key = (room_id, participant_id);
        if !memberships.lock().await.contains(&key) {
            return Err(GameError::NotAPlayer {
                participant_id: key.1,
            });
        }
        self.registry.make_move_from(&key.0, &key.1, mv, tx).await?;
        Ok(())
    }

    async fn release_memberships(&self, memberships: &Memberships, tx: &ConnectionSender) {
        let joined: Vec<(RoomId, ParticipantId)> = memberships.lock().await.drain().collect();
        for (room_id, participant_id) in joined {
            match self.registry.leave(&room_id, &participant_id, tx).await {
                Ok(_) => {}
                Err(e) => log::debug!(
                    "Skipping leave for {} in {}: {}",
                    participant_id,
                    room_id,
                    e
                ),
            }
        }
    }

    async fn send_message(
        sender: &mut futures::stream::SplitSink<WebSocket, Message>,
        message: &ServerMessage,
    ) -> Result<(), axum::Error> {
        let json = serde_json::to_string(message).map_err(|e| {
            axum::Error::new(NetworkError::SerializationFailed {
                details: e.to_string(),
            })
        })?;

        sender
            .send(Message::Text(json.into()))
            .await
            .map_err(axum::Error::new)
    }
}
