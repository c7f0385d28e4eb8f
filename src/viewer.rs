//! Capabilities the tick engine needs from whoever observes the world.
//!
//! A connected client implements all of them. Loaders without a client (the
//! spawn keep-alive) are registered with [`NoopViewer`], so the tick loop
//! never special-cases a missing peer.

use std::sync::Arc;

use crate::chunk::Chunk;
use crate::entity::PlayerInfo;
use crate::protocol::DisconnectReason;
use crate::types::{ChunkPos, EntityId, Position, Rotation};

/// Identifies a registered viewer inside one world.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ViewerId(pub u64);

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "viewer#{}", self.0)
    }
}

pub trait ChunkViewer: Send + Sync {
    fn view_chunk_load(&self, pos: ChunkPos, chunk: &Arc<Chunk>);
    fn view_chunk_unload(&self, pos: ChunkPos);
}

pub trait EntityViewer: Send + Sync {
    fn view_add_player(&self, player: &PlayerInfo);
    fn view_remove_entities(&self, ids: &[EntityId]);
    fn view_move_entity_pos(&self, id: EntityId, delta: [i16; 3], on_ground: bool);
    fn view_move_entity_pos_and_rot(
        &self,
        id: EntityId,
        delta: [i16; 3],
        rot: [i8; 2],
        on_ground: bool,
    );
    fn view_move_entity_rot(&self, id: EntityId, rot: [i8; 2], on_ground: bool);
    fn view_rotate_head(&self, id: EntityId, yaw: i8);
    fn view_teleport_entity(&self, id: EntityId, pos: Position, rot: [i8; 2], on_ground: bool);
}

/// Full viewer sink for one connected player.
pub trait Client: ChunkViewer + EntityViewer {
    fn send_disconnect(&self, reason: DisconnectReason);
    /// Force the client to a pose; returns the teleport id it must confirm.
    fn send_player_position(&self, pos: Position, rot: Rotation, dismount: bool) -> i32;
    fn send_set_chunk_cache_center(&self, pos: ChunkPos);
}

/// Viewer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopViewer;

impl ChunkViewer for NoopViewer {
    fn view_chunk_load(&self, _pos: ChunkPos, _chunk: &Arc<Chunk>) {}
    fn view_chunk_unload(&self, _pos: ChunkPos) {}
}

impl EntityViewer for NoopViewer {
    fn view_add_player(&self, _player: &PlayerInfo) {}
    fn view_remove_entities(&self, _ids: &[EntityId]) {}
    fn view_move_entity_pos(&self, _id: EntityId, _delta: [i16; 3], _on_ground: bool) {}
    fn view_move_entity_pos_and_rot(
        &self,
        _id: EntityId,
        _delta: [i16; 3],
        _rot: [i8; 2],
        _on_ground: bool,
    ) {
    }
    fn view_move_entity_rot(&self, _id: EntityId, _rot: [i8; 2], _on_ground: bool) {}
    fn view_rotate_head(&self, _id: EntityId, _yaw: i8) {}
    fn view_teleport_entity(&self, _id: EntityId, _pos: Position, _rot: [i8; 2], _on_ground: bool) {
    }
}

impl Client for NoopViewer {
    fn send_disconnect(&self, _reason: DisconnectReason) {}
    fn send_player_position(&self, _pos: Position, _rot: Rotation, _dismount: bool) -> i32 {
        0
    }
    fn send_set_chunk_cache_center(&self, _pos: ChunkPos) {}
}
