//! Wire-facing vocabulary of the tick engine.
//!
//! This module owns **every message that crosses the connection boundary**
//! between the world and a client, plus the compact movement encodings the
//! client protocol mandates.
//!
//! ## Design rules
//!
//! 1. Every message is `Serialize + Deserialize` with snake_case tags.
//! 2. Relative moves are fixed-point: 1/4096 of a block per unit, per axis,
//!    carried in an `i16`. A move that does not fit is sent as an absolute
//!    teleport instead.
//! 3. Angles travel as a single byte: 256 steps per full turn.
//! 4. Framing is not decided here; the session layer writes one JSON
//!    document per line.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::chunk::Chunk;
use crate::entity::PlayerInfo;
use crate::types::{EntityId, Position, Rotation};
use crate::viewer::EntityViewer;

// ---------------------------------------------------------------------------
// Movement encoding
// ---------------------------------------------------------------------------

/// Fixed-point units per block for relative moves (32 × 128).
pub const POSITION_SCALE: f64 = 4096.0;

fn fixed_point(v: f64) -> i64 {
    (v * POSITION_SCALE).floor() as i64
}

/// Per-axis delta between two positions, or `None` if any axis overflows the
/// `i16` field (a move of roughly 8 blocks or more).
pub fn encode_delta(from: Position, to: Position) -> Option<[i16; 3]> {
    let axis = |a: f64, b: f64| i16::try_from(fixed_point(b) - fixed_point(a)).ok();
    Some([
        axis(from.x, to.x)?,
        axis(from.y, to.y)?,
        axis(from.z, to.z)?,
    ])
}

/// Degrees to a wrapping 1/256-turn step.
pub fn encode_angle(degrees: f32) -> i8 {
    let steps = (f64::from(degrees) * 256.0 / 360.0).floor() as i64;
    steps.rem_euclid(256) as u8 as i8
}

pub fn encode_rotation(rot: Rotation) -> [i8; 2] {
    [encode_angle(rot.yaw), encode_angle(rot.pitch)]
}

/// The update a viewer needs to follow one entity across one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveUpdate {
    Pos {
        delta: [i16; 3],
    },
    PosAndRot {
        delta: [i16; 3],
        rot: [i8; 2],
    },
    Rot {
        rot: [i8; 2],
    },
    /// Move too large for a delta.
    Teleport {
        position: Position,
        rot: [i8; 2],
        rotated: bool,
    },
}

impl MoveUpdate {
    /// Send this update, plus a head rotation when the yaw changed, to one
    /// viewer.
    pub fn dispatch<V: EntityViewer + ?Sized>(&self, viewer: &V, id: EntityId, on_ground: bool) {
        match *self {
            MoveUpdate::Pos { delta } => viewer.view_move_entity_pos(id, delta, on_ground),
            MoveUpdate::PosAndRot { delta, rot } => {
                viewer.view_move_entity_pos_and_rot(id, delta, rot, on_ground);
                viewer.view_rotate_head(id, rot[0]);
            }
            MoveUpdate::Rot { rot } => {
                viewer.view_move_entity_rot(id, rot, on_ground);
                viewer.view_rotate_head(id, rot[0]);
            }
            MoveUpdate::Teleport {
                position,
                rot,
                rotated,
            } => {
                viewer.view_teleport_entity(id, position, rot, on_ground);
                if rotated {
                    viewer.view_rotate_head(id, rot[0]);
                }
            }
        }
    }
}

/// Encode the change between two poses; `None` when neither changed.
pub fn encode_move(
    prev_pos: Position,
    pos: Position,
    prev_rot: Rotation,
    rot: Rotation,
) -> Option<MoveUpdate> {
    let moved = pos != prev_pos;
    let rotated = rot != prev_rot;
    let angles = encode_rotation(rot);
    match (moved, rotated) {
        (false, false) => None,
        (false, true) => Some(MoveUpdate::Rot { rot: angles }),
        (true, _) => Some(match encode_delta(prev_pos, pos) {
            Some(delta) if rotated => MoveUpdate::PosAndRot { delta, rot: angles },
            Some(delta) => MoveUpdate::Pos { delta },
            None => MoveUpdate::Teleport {
                position: pos,
                rot: angles,
                rotated,
            },
        }),
    }
}

// ---------------------------------------------------------------------------
// Disconnect reasons
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    InvalidPlayerMovement,
    ServerShutdown,
    Kicked(String),
}

impl DisconnectReason {
    /// Client-side translation key (or literal text for kicks).
    pub fn message(&self) -> &str {
        match self {
            DisconnectReason::InvalidPlayerMovement => {
                "multiplayer.disconnect.invalid_player_movement"
            }
            DisconnectReason::ServerShutdown => "multiplayer.disconnect.server_shutdown",
            DisconnectReason::Kicked(text) => text,
        }
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

// ---------------------------------------------------------------------------
// Outbound events  (server → client)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    ChunkLoad {
        x: i32,
        z: i32,
        chunk: Arc<Chunk>,
    },
    ChunkUnload {
        x: i32,
        z: i32,
    },
    AddPlayer {
        player: PlayerInfo,
    },
    RemoveEntities {
        ids: Vec<EntityId>,
    },
    MoveEntityPos {
        id: EntityId,
        delta: [i16; 3],
        on_ground: bool,
    },
    MoveEntityPosRot {
        id: EntityId,
        delta: [i16; 3],
        rot: [i8; 2],
        on_ground: bool,
    },
    MoveEntityRot {
        id: EntityId,
        rot: [i8; 2],
        on_ground: bool,
    },
    RotateHead {
        id: EntityId,
        yaw: i8,
    },
    TeleportEntity {
        id: EntityId,
        position: Position,
        rot: [i8; 2],
        on_ground: bool,
    },
    PlayerPosition {
        position: Position,
        rotation: Rotation,
        dismount: bool,
        teleport_id: i32,
    },
    SetChunkCacheCenter {
        x: i32,
        z: i32,
    },
    Disconnect {
        reason: DisconnectReason,
    },
}

// ---------------------------------------------------------------------------
// Inbound events  (client → server)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerboundEvent {
    AcceptTeleportation {
        teleport_id: i32,
    },
    MovePlayerPos {
        x: f64,
        y: f64,
        z: f64,
        on_ground: bool,
    },
    MovePlayerPosRot {
        x: f64,
        y: f64,
        z: f64,
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    MovePlayerRot {
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    MovePlayerStatusOnly {
        on_ground: bool,
    },
    ClientInformation {
        locale: String,
        view_distance: i8,
    },
}

/// First line a connection sends: who is joining.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub name: String,
    #[serde(default)]
    pub uuid: Option<Uuid>,
}
