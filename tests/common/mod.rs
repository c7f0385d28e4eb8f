//! Shared test doubles.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tickworld::chunk::Chunk;
use tickworld::entity::{Inputs, Player, PlayerInfo, PlayerProfile};
use tickworld::protocol::{ClientEvent, DisconnectReason};
use tickworld::types::{ChunkPos, EntityId, Position, Rotation};
use tickworld::viewer::{ChunkViewer, Client, EntityViewer};
use uuid::Uuid;

/// Viewer that records every notification as the event a real client would
/// have queued.
#[derive(Default)]
pub struct RecordingClient {
    events: Mutex<Vec<ClientEvent>>,
    next_teleport: AtomicI32,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn take(&self) -> Vec<ClientEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().clone()
    }

    pub fn added_players(&self) -> Vec<EntityId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::AddPlayer { player } => Some(player.entity_id),
                _ => None,
            })
            .collect()
    }

    pub fn removed_entities(&self) -> Vec<EntityId> {
        self.events()
            .into_iter()
            .flat_map(|e| match e {
                ClientEvent::RemoveEntities { ids } => ids,
                _ => Vec::new(),
            })
            .collect()
    }

    pub fn chunk_loads(&self) -> Vec<ChunkPos> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::ChunkLoad { x, z, .. } => Some(ChunkPos::new(x, z)),
                _ => None,
            })
            .collect()
    }

    pub fn chunk_unloads(&self) -> Vec<ChunkPos> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::ChunkUnload { x, z } => Some(ChunkPos::new(x, z)),
                _ => None,
            })
            .collect()
    }

    pub fn disconnects(&self) -> Vec<DisconnectReason> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::Disconnect { reason } => Some(reason),
                _ => None,
            })
            .collect()
    }

    pub fn teleports(&self) -> Vec<i32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::PlayerPosition { teleport_id, .. } => Some(teleport_id),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ClientEvent) {
        self.events.lock().push(event);
    }
}

impl ChunkViewer for RecordingClient {
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

impl EntityViewer for RecordingClient {
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

impl Client for RecordingClient {
    fn send_disconnect(&self, reason: DisconnectReason) {
        self.push(ClientEvent::Disconnect { reason });
    }

    fn send_player_position(&self, position: Position, rotation: Rotation, dismount: bool) -> i32 {
        let teleport_id = self.next_teleport.fetch_add(1, Ordering::Relaxed) + 1;
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

pub fn player(id: EntityId, name: &str, position: Position, view_distance: i32) -> Player {
    Player::new(
        id,
        PlayerProfile::new(name, Uuid::new_v4()),
        position,
        Rotation::default(),
        1,
        view_distance,
    )
}

/// Write a proposed position into a player's mailbox, as a packet handler
/// would.
pub fn propose(inputs: &Inputs, position: Position) {
    inputs.lock().position = position;
}
