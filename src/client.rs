//! QueuedClient – the viewer sink for a networked player.
//!
//! The tick thread never touches a socket: every notification becomes a
//! [`ClientEvent`] pushed onto a bounded channel drained by the session's
//! sender task. The tick never waits on a peer: when the channel fills up the
//! event is dropped and the client is marked as faulted, and the session
//! watching [`QueuedClient::faulted`] closes the connection. A client that
//! missed an event cannot be resynchronised, so it has to rejoin.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::chunk::Chunk;
use crate::entity::{InputState, Inputs, PlayerInfo};
use crate::protocol::{ClientEvent, DisconnectReason, ServerboundEvent};
use crate::types::{ChunkPos, EntityId, Position, Rotation};
use crate::viewer::{ChunkViewer, Client, EntityViewer};

pub struct QueuedClient {
    name: String,
    tx: mpsc::Sender<ClientEvent>,
    next_teleport: AtomicI32,
    dropped: AtomicU64,
    overflowed: AtomicBool,
    fault: Notify,
    disconnect: Mutex<Option<DisconnectReason>>,
}

impl QueuedClient {
    /// Create a client and the receiving end its sender task drains.
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let client = Arc::new(Self {
            name: name.into(),
            tx,
            next_teleport: AtomicI32::new(1),
            dropped: AtomicU64::new(0),
            overflowed: AtomicBool::new(false),
            fault: Notify::new(),
            disconnect: Mutex::new(None),
        });
        (client, rx)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Events discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Whether the world has asked for this client to be disconnected.
    pub fn is_disconnected(&self) -> bool {
        self.disconnect.lock().is_some()
    }

    /// Reason given to the last [`Client::send_disconnect`], if any.
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.disconnect.lock().clone()
    }

    /// Whether an event has been lost to a full queue.
    pub fn is_overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Acquire)
    }

    /// Resolves once the queue has overflowed. The connection must then be
    /// closed: the world already believes the lost event was delivered.
    pub async fn faulted(&self) {
        let notified = self.fault.notified();
        if self.is_overflowed() {
            return;
        }
        notified.await;
    }

    fn push(&self, event: ClientEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                if !self.overflowed.swap(true, Ordering::AcqRel) {
                    warn!(client = %self.name, ?event, "outbound queue full, closing connection");
                    self.fault.notify_waiters();
                }
            }
            Err(TrySendError::Closed(_)) => {
                debug!(client = %self.name, "outbound queue closed");
            }
        }
    }
}

impl ChunkViewer for QueuedClient {
    fn view_chunk_load(&self, pos: ChunkPos, chunk: &Arc<Chunk>) {
        self.push(ClientEvent::ChunkLoad {
            x: pos.x,
            z: pos.z,
            chunk: Arc::clone(chunk),
        });
    }

    fn view_chunk_unload(&self, pos: ChunkPos) {
        self.push(ClientEvent::ChunkUnload { x: pos.x, z: pos.z });
    }
}

impl EntityViewer for QueuedClient {
    fn view_add_player(&self, player: &PlayerInfo) {
        self.push(ClientEvent::AddPlayer {
            player: player.clone(),
        });
    }

    fn view_remove_entities(&self, ids: &[EntityId]) {
        self.push(ClientEvent::RemoveEntities { ids: ids.to_vec() });
    }

    fn view_move_entity_pos(&self, id: EntityId, delta: [i16; 3], on_ground: bool) {
        self.push(ClientEvent::MoveEntityPos {
            id,
            delta,
            on_ground,
        });
    }

    fn view_move_entity_pos_and_rot(
        &self,
        id: EntityId,
        delta: [i16; 3],
        rot: [i8; 2],
        on_ground: bool,
    ) {
        self.push(ClientEvent::MoveEntityPosRot {
            id,
            delta,
            rot,
            on_ground,
        });
    }

    fn view_move_entity_rot(&self, id: EntityId, rot: [i8; 2], on_ground: bool) {
        self.push(ClientEvent::MoveEntityRot { id, rot, on_ground });
    }

    fn view_rotate_head(&self, id: EntityId, yaw: i8) {
        self.push(ClientEvent::RotateHead { id, yaw });
    }

    fn view_teleport_entity(&self, id: EntityId, position: Position, rot: [i8; 2], on_ground: bool) {
        self.push(ClientEvent::TeleportEntity {
            id,
            position,
            rot,
            on_ground,
        });
    }
}

impl Client for QueuedClient {
    fn send_disconnect(&self, reason: DisconnectReason) {
        *self.disconnect.lock() = Some(reason.clone());
        self.push(ClientEvent::Disconnect { reason });
    }

    fn send_player_position(&self, position: Position, rotation: Rotation, dismount: bool) -> i32 {
        let teleport_id = self.next_teleport.fetch_add(1, Ordering::Relaxed);
        self.push(ClientEvent::PlayerPosition {
            position,
            rotation,
            dismount,
            teleport_id,
        });
        teleport_id
    }

    fn send_set_chunk_cache_center(&self, pos: ChunkPos) {
        self.push(ClientEvent::SetChunkCacheCenter { x: pos.x, z: pos.z });
    }
}

// ---------------------------------------------------------------------------
// Inbound handlers
// ---------------------------------------------------------------------------

/// Write one decoded packet into the player's mailbox. Newer proposals simply
/// overwrite older ones.
pub fn handle_serverbound(inputs: &Inputs, event: ServerboundEvent) {
    let mut state = inputs.lock();
    apply(&mut state, event);
}

fn apply(state: &mut InputState, event: ServerboundEvent) {
    match event {
        ServerboundEvent::AcceptTeleportation { teleport_id } => {
            state.teleport_id = teleport_id;
        }
        ServerboundEvent::MovePlayerPos { x, y, z, on_ground } => {
            state.position = Position::new(x, y, z);
            state.on_ground = on_ground;
        }
        ServerboundEvent::MovePlayerPosRot {
            x,
            y,
            z,
            yaw,
            pitch,
            on_ground,
        } => {
            state.position = Position::new(x, y, z);
            state.rotation = Rotation::new(yaw, pitch);
            state.on_ground = on_ground;
        }
        ServerboundEvent::MovePlayerRot {
            yaw,
            pitch,
            on_ground,
        } => {
            state.rotation = Rotation::new(yaw, pitch);
            state.on_ground = on_ground;
        }
        ServerboundEvent::MovePlayerStatusOnly { on_ground } => {
            state.on_ground = on_ground;
        }
        ServerboundEvent::ClientInformation {
            locale,
            view_distance,
        } => {
            state.locale = locale;
            state.view_distance = i32::from(view_distance);
        }
    }
}
