//! Entities, players, and the mailbox packet handlers write proposals into.

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::bvh::{Aabb, NodeHandle, Vec3};
use crate::loader::LoaderSource;
use crate::protocol::{self, MoveUpdate};
use crate::types::{ChunkPos, EntityId, Position, Rotation, CHUNK_WIDTH};

// ---------------------------------------------------------------------------
// Id allocation
// ---------------------------------------------------------------------------

/// Hands out entity ids. Ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    last: AtomicI32,
}

impl EntityIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> EntityId {
        match self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| id.checked_add(1))
        {
            Ok(previous) => previous + 1,
            Err(_) => panic!("entity id space exhausted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub position: Position,
    pub rotation: Rotation,
    pub on_ground: bool,
    /// Pose last broadcast to viewers.
    previous_position: Position,
    previous_rotation: Rotation,
}

impl Entity {
    pub fn new(id: EntityId, position: Position, rotation: Rotation) -> Self {
        Self {
            id,
            position,
            rotation,
            on_ground: false,
            previous_position: position,
            previous_rotation: rotation,
        }
    }

    pub fn previous_position(&self) -> Position {
        self.previous_position
    }

    pub fn previous_rotation(&self) -> Rotation {
        self.previous_rotation
    }

    pub fn has_moved(&self) -> bool {
        self.position != self.previous_position
    }

    pub fn has_rotated(&self) -> bool {
        self.rotation != self.previous_rotation
    }

    /// Encode the change since the last broadcast and roll the snapshot
    /// forward. `None` when nothing changed.
    pub fn take_movement(&mut self) -> Option<MoveUpdate> {
        let update = protocol::encode_move(
            self.previous_position,
            self.position,
            self.previous_rotation,
            self.rotation,
        );
        self.previous_position = self.position;
        self.previous_rotation = self.rotation;
        update
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub expires_at: i64,
    pub key: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Who a player is, as established by authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub name: String,
    pub uuid: Uuid,
    #[serde(default)]
    pub public_key: Option<PublicKey>,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl PlayerProfile {
    pub fn new(name: impl Into<String>, uuid: Uuid) -> Self {
        Self {
            name: name.into(),
            uuid,
            public_key: None,
            properties: Vec::new(),
        }
    }

    /// Unauthenticated profile with the name-derived (version 3) UUID that
    /// offline-mode servers agree on.
    pub fn offline(name: impl Into<String>) -> Self {
        let name = name.into();
        let digest = md5::compute(format!("OfflinePlayer:{name}"));
        let uuid = uuid::Builder::from_md5_bytes(digest.0).into_uuid();
        Self::new(name, uuid)
    }
}

/// What a viewer learns about a player entering its view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub entity_id: EntityId,
    pub uuid: Uuid,
    pub name: String,
    pub position: Position,
    pub rotation: Rotation,
    pub on_ground: bool,
}

// ---------------------------------------------------------------------------
// Inputs mailbox
// ---------------------------------------------------------------------------

/// Latest proposal from the client. Each field is overwritten by newer
/// packets; the tick reads whatever is there.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    pub position: Position,
    pub rotation: Rotation,
    pub on_ground: bool,
    pub view_distance: i32,
    pub teleport_id: i32,
    pub latency: Duration,
    pub locale: String,
}

#[derive(Debug, Default)]
pub struct Inputs {
    state: Mutex<InputState>,
}

impl Inputs {
    pub fn new(state: InputState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, InputState> {
        self.state.lock()
    }

    /// Non-blocking read for the tick: a handler mid-write just means this
    /// player's proposal is picked up next tick.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, InputState>> {
        self.state.try_lock()
    }

    pub fn snapshot(&self) -> InputState {
        self.state.lock().clone()
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Server-issued pose the client has to confirm before moving again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeleportRequest {
    pub id: i32,
    pub position: Position,
    pub rotation: Rotation,
}

pub struct Player {
    pub entity: Entity,
    pub profile: PlayerProfile,
    pub latency: Duration,
    pub chunk_pos: ChunkPos,
    /// In chunks.
    pub view_distance: i32,
    pub game_mode: i32,
    pub(crate) entities_in_view: HashSet<EntityId>,
    pub(crate) view: Option<NodeHandle>,
    pub(crate) teleport: Option<TeleportRequest>,
    inputs: Arc<Inputs>,
}

impl Player {
    pub fn new(
        id: EntityId,
        profile: PlayerProfile,
        position: Position,
        rotation: Rotation,
        game_mode: i32,
        view_distance: i32,
    ) -> Self {
        let inputs = Inputs::new(InputState {
            position,
            rotation,
            view_distance,
            ..Default::default()
        });
        Self {
            entity: Entity::new(id, position, rotation),
            profile,
            latency: Duration::ZERO,
            chunk_pos: position.chunk_pos(),
            view_distance,
            game_mode,
            entities_in_view: HashSet::new(),
            view: None,
            teleport: None,
            inputs: Arc::new(inputs),
        }
    }

    pub fn id(&self) -> EntityId {
        self.entity.id
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn position(&self) -> Position {
        self.entity.position
    }

    pub fn rotation(&self) -> Rotation {
        self.entity.rotation
    }

    /// Shared with the connection's packet handlers.
    pub fn inputs(&self) -> &Arc<Inputs> {
        &self.inputs
    }

    pub fn pending_teleport(&self) -> Option<&TeleportRequest> {
        self.teleport.as_ref()
    }

    pub fn entities_in_view(&self) -> &HashSet<EntityId> {
        &self.entities_in_view
    }

    pub fn is_viewing(&self, id: EntityId) -> bool {
        self.entities_in_view.contains(&id)
    }

    /// Visibility box: position ± view distance in world units, all axes.
    pub fn view_box(&self) -> Aabb<Vec3<f64>> {
        let reach = f64::from(self.view_distance) * f64::from(CHUNK_WIDTH);
        Aabb::around(self.entity.position.to_vec3(), Vec3([reach; 3]))
    }

    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            entity_id: self.entity.id,
            uuid: self.profile.uuid,
            name: self.profile.name.clone(),
            position: self.entity.position,
            rotation: self.entity.rotation,
            on_ground: self.entity.on_ground,
        }
    }
}

impl LoaderSource for Player {
    fn chunk_position(&self) -> ChunkPos {
        self.chunk_pos
    }

    fn chunk_radius(&self) -> i32 {
        self.view_distance
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.entity.id)
            .field("name", &self.profile.name)
            .field("position", &self.entity.position)
            .field("view_distance", &self.view_distance)
            .finish()
    }
}
