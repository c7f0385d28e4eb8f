//! World – the shareable handle connections and the tick loop go through.
//!
//! Every call takes the world lock internally; callers must not hold any
//! other lock of ours while calling in.

use log::{debug, error, info};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::entity::{EntityIdAllocator, Inputs, Player, PlayerProfile, TeleportRequest};
use crate::error::{Result, StorageError, WorldError};
use crate::limiter::RateLimiter;
use crate::loader::FixedSource;
use crate::provider::{ChunkProvider, PlayerData, PlayerProvider};
use crate::service::{TickReport, WorldService};
use crate::types::{ChunkPos, EntityId, Position, Rotation, WorldConfig, WorldStats};
use crate::viewer::{Client, ViewerId};

#[derive(Clone)]
pub struct World {
    service: Arc<Mutex<WorldService>>,
    config: Arc<WorldConfig>,
    ids: Arc<EntityIdAllocator>,
    next_viewer: Arc<AtomicU64>,
    players: Arc<dyn PlayerProvider>,
    player_limiter: Arc<dyn Fn() -> RateLimiter + Send + Sync>,
}

impl World {
    /// Players get an unlimited chunk-loading limiter; see
    /// [`World::with_player_limiter`].
    pub fn new(
        config: WorldConfig,
        chunks: Arc<dyn ChunkProvider>,
        players: Arc<dyn PlayerProvider>,
    ) -> Self {
        let service = WorldService::new(config.clone(), chunks);
        Self {
            service: Arc::new(Mutex::new(service)),
            config: Arc::new(config),
            ids: Arc::new(EntityIdAllocator::new()),
            next_viewer: Arc::new(AtomicU64::new(1)),
            players,
            player_limiter: Arc::new(RateLimiter::unlimited),
        }
    }

    /// Build each joining player's chunk-loading limiter with `make`.
    pub fn with_player_limiter<F>(mut self, make: F) -> Self
    where
        F: Fn() -> RateLimiter + Send + Sync + 'static,
    {
        self.player_limiter = Arc::new(make);
        self
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Direct access to the tick state. Holding the guard stalls the tick.
    pub fn service(&self) -> &Arc<Mutex<WorldService>> {
        &self.service
    }

    pub fn ids(&self) -> &EntityIdAllocator {
        &self.ids
    }

    pub fn next_viewer_id(&self) -> ViewerId {
        ViewerId(self.next_viewer.fetch_add(1, Ordering::Relaxed))
    }

    // -----------------------------------------------------------------------
    // AddPlayer / RemovePlayer
    // -----------------------------------------------------------------------

    pub fn add_player(
        &self,
        viewer: ViewerId,
        client: Arc<dyn Client>,
        player: Player,
        limiter: RateLimiter,
    ) {
        self.service.lock().add_player(viewer, client, player, limiter);
    }

    /// Counterpart of [`World::add_player`]. Safe to call for a viewer the
    /// tick already removed.
    pub fn remove_player(&self, viewer: ViewerId) -> Option<Player> {
        self.service.lock().remove_player(viewer)
    }

    /// Keep the chunks within `radius` of `center` resident with no client
    /// attached.
    pub fn add_keep_alive(&self, center: ChunkPos, radius: i32, limiter: RateLimiter) -> ViewerId {
        let viewer = self.next_viewer_id();
        self.service
            .lock()
            .add_keep_alive(viewer, FixedSource { center, radius }, limiter);
        viewer
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Run one tick. Players removed by it have their data saved after the
    /// lock is released.
    pub fn tick(&self) -> TickReport {
        let report = self.service.lock().tick();
        for player in &report.disconnected {
            self.save_player(player);
        }
        report
    }

    pub fn stats(&self) -> WorldStats {
        self.service.lock().stats()
    }

    // -----------------------------------------------------------------------
    // Join / leave
    // -----------------------------------------------------------------------

    /// Hydrate `profile` from the player provider, or place it at spawn if
    /// nothing was stored.
    pub fn load_player(&self, profile: PlayerProfile) -> Result<Player> {
        let view_distance = self.config.view_distance;
        match self
            .players
            .get_player(profile.clone(), &self.ids, view_distance)
        {
            Ok(player) => Ok(player),
            Err(StorageError::NotExist) => {
                let [x, y, z] = self.config.spawn_position;
                let position = Position::new(f64::from(x), f64::from(y), f64::from(z));
                debug!("No stored data for {}, spawning at {}", profile.name, position);
                Ok(Player::new(
                    self.ids.allocate(),
                    profile,
                    position,
                    Rotation::new(self.config.spawn_angle, 0.0),
                    self.config.default_game_mode,
                    view_distance,
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Bring a player into the world: load it, send its initial position and
    /// register it. The returned guard removes the player when dropped.
    pub fn join(&self, profile: PlayerProfile, client: Arc<dyn Client>) -> Result<PlayerSession> {
        if profile.name.is_empty() {
            return Err(WorldError::InvalidProfile("empty player name".into()));
        }
        let mut player = self.load_player(profile)?;

        // The client stays frozen until it confirms where it was put.
        let position = player.position();
        let rotation = player.rotation();
        let id = client.send_player_position(position, rotation, false);
        player.teleport = Some(TeleportRequest {
            id,
            position,
            rotation,
        });
        client.send_set_chunk_cache_center(player.chunk_pos);

        let viewer = self.next_viewer_id();
        let session = PlayerSession {
            world: self.clone(),
            viewer,
            entity_id: player.id(),
            uuid: player.profile.uuid,
            inputs: Arc::clone(player.inputs()),
        };
        info!("{} joined as {} (eid {})", player.name(), viewer, player.id());
        self.add_player(viewer, client, player, (self.player_limiter)());
        Ok(session)
    }

    fn leave(&self, viewer: ViewerId) {
        if let Some(player) = self.remove_player(viewer) {
            info!("{} left ({})", player.name(), viewer);
            self.save_player(&player);
        }
    }

    fn save_player(&self, player: &Player) {
        let uuid = player.profile.uuid;
        if let Err(e) = self.players.save_player(uuid, &PlayerData::of(player)) {
            error!("Saving player {} ({}) failed: {}", player.name(), uuid, e);
        }
    }
}

// ---------------------------------------------------------------------------
// PlayerSession
// ---------------------------------------------------------------------------

/// A joined player. Dropping it removes the player from the world exactly
/// once and persists its data.
pub struct PlayerSession {
    world: World,
    viewer: ViewerId,
    entity_id: EntityId,
    uuid: Uuid,
    inputs: Arc<Inputs>,
}

impl PlayerSession {
    pub fn viewer(&self) -> ViewerId {
        self.viewer
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Mailbox inbound packet handlers write into.
    pub fn inputs(&self) -> &Arc<Inputs> {
        &self.inputs
    }

    pub fn world(&self) -> &World {
        &self.world
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        self.world.leave(self.viewer);
    }
}

impl std::fmt::Debug for PlayerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerSession")
            .field("viewer", &self.viewer)
            .field("entity_id", &self.entity_id)
            .field("uuid", &self.uuid)
            .finish()
    }
}
