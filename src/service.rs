//! WorldService – chunk residency, movement reconciliation, entity views.
//!
//! Everything here is owned by the tick: callers reach a `WorldService` only
//! through the lock held by [`World`](crate::world::World), so none of these
//! maps is ever touched by two threads at once. Packet handlers talk to the
//! tick solely through each player's [`Inputs`](crate::entity::Inputs)
//! mailbox and each client's outbound queue.

use log::{debug, error};
use std::collections::HashMap;
use std::sync::Arc;

use crate::bvh::{Aabb, Bound, Tree, Vec3};
use crate::chunk::{BlockState, Chunk, LoadedChunk};
use crate::entity::{Player, PlayerInfo};
use crate::error::StorageError;
use crate::limiter::RateLimiter;
use crate::loader::{FixedSource, Loader};
use crate::movement::{self, Reconciliation};
use crate::protocol::{DisconnectReason, MoveUpdate};
use crate::provider::ChunkProvider;
use crate::types::{ChunkPos, EntityId, Position, WorldConfig, WorldStats};
use crate::viewer::{Client, NoopViewer, ViewerId};

pub type ViewBox = Aabb<Vec3<f64>>;
pub type ViewTree = Tree<ViewBox, PlayerView>;

/// Interest-index payload: whose box this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerView {
    pub viewer: ViewerId,
    pub entity: EntityId,
}

// ---------------------------------------------------------------------------
// Chunk store
// ---------------------------------------------------------------------------

/// Resident chunks, backed by a storage provider.
pub struct ChunkStore {
    chunks: HashMap<ChunkPos, LoadedChunk>,
    provider: Arc<dyn ChunkProvider>,
    sections: usize,
}

impl ChunkStore {
    pub fn new(provider: Arc<dyn ChunkProvider>, sections: usize) -> Self {
        Self {
            chunks: HashMap::new(),
            provider,
            sections,
        }
    }

    pub fn get(&self, pos: ChunkPos) -> Option<&LoadedChunk> {
        self.chunks.get(&pos)
    }

    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.chunks.keys().copied()
    }

    /// Make `pos` resident. Returns `false` if storage asked us to back off,
    /// in which case nothing was inserted.
    pub fn load(&mut self, pos: ChunkPos) -> bool {
        debug!("Loading chunk {}", pos);
        let chunk = match self.provider.get_chunk(pos) {
            Ok(chunk) => chunk,
            Err(StorageError::NotExist) => {
                debug!("Generating placeholder chunk {}", pos);
                Chunk::placeholder(self.sections, BlockState::STONE)
            }
            Err(StorageError::RateLimited) => {
                debug!("Chunk storage rate limited at {}", pos);
                return false;
            }
            Err(e) => {
                error!("Reading chunk {} failed, using placeholder: {}", pos, e);
                Chunk::placeholder(self.sections, BlockState::STONE)
            }
        };
        self.chunks.insert(pos, LoadedChunk::new(chunk));
        true
    }

    /// Persist and evict `pos`.
    ///
    /// # Panics
    ///
    /// If `pos` is not resident.
    pub fn unload(&mut self, pos: ChunkPos) {
        debug!("Unloading chunk {}", pos);
        let Some(loaded) = self.chunks.remove(&pos) else {
            panic!("unloading chunk {pos} which is not resident");
        };
        if let Err(e) = self.provider.put_chunk(pos, loaded.chunk()) {
            error!("Storing chunk {} failed, its changes are lost: {}", pos, e);
        }
    }

    /// Resident chunks nobody is watching.
    pub fn idle(&self) -> Vec<ChunkPos> {
        self.chunks
            .iter()
            .filter(|(_, c)| c.viewer_count() == 0)
            .map(|(pos, _)| *pos)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tick result
// ---------------------------------------------------------------------------

/// What a single [`WorldService::tick`] did.
#[derive(Debug, Default)]
pub struct TickReport {
    /// The tick counter that produced this report.
    pub tick: u64,
    /// Chunks made resident this tick.
    pub loaded: usize,
    /// Chunks persisted and evicted this tick.
    pub unloaded: usize,
    /// Players removed this tick for protocol violations.
    pub disconnected: Vec<Player>,
}

// ---------------------------------------------------------------------------
// World service
// ---------------------------------------------------------------------------

pub struct WorldService {
    config: WorldConfig,
    store: ChunkStore,
    loaders: HashMap<ViewerId, Loader>,
    viewers: HashMap<ViewerId, Arc<dyn Client>>,
    players: HashMap<ViewerId, Player>,
    entity_index: HashMap<EntityId, ViewerId>,
    player_views: ViewTree,
    tick_count: u64,
}

impl WorldService {
    pub fn new(config: WorldConfig, provider: Arc<dyn ChunkProvider>) -> Self {
        let store = ChunkStore::new(provider, config.chunk_sections);
        Self {
            config,
            store,
            loaders: HashMap::new(),
            viewers: HashMap::new(),
            players: HashMap::new(),
            entity_index: HashMap::new(),
            player_views: Tree::new(),
            tick_count: 0,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Viewer management
    // -----------------------------------------------------------------------

    /// Register a player: it gets a loader, an interest-index node, and
    /// becomes visible to others on the next tick.
    ///
    /// # Panics
    ///
    /// If `viewer` is already registered.
    pub fn add_player(
        &mut self,
        viewer: ViewerId,
        client: Arc<dyn Client>,
        mut player: Player,
        limiter: RateLimiter,
    ) {
        assert!(
            !self.loaders.contains_key(&viewer),
            "{viewer} registered twice"
        );
        debug!(
            "Add player {} ({}, eid {}) at {}",
            player.name(),
            viewer,
            player.id(),
            player.position()
        );
        self.loaders.insert(viewer, Loader::new(&player, limiter));
        let node = PlayerView {
            viewer,
            entity: player.id(),
        };
        player.view = Some(self.player_views.insert(player.view_box(), node));
        self.entity_index.insert(player.id(), viewer);
        self.viewers.insert(viewer, client);
        self.players.insert(viewer, player);
    }

    /// Register a loader that keeps `source`'s area resident without any
    /// client attached.
    pub fn add_keep_alive(&mut self, viewer: ViewerId, source: FixedSource, limiter: RateLimiter) {
        assert!(
            !self.loaders.contains_key(&viewer),
            "{viewer} registered twice"
        );
        debug!(
            "Add keep-alive loader {} around {} (r={})",
            viewer, source.center, source.radius
        );
        self.loaders.insert(viewer, Loader::new(&source, limiter));
        self.viewers.insert(viewer, Arc::new(NoopViewer));
    }

    /// Unregister a viewer from every chunk, the interest index and every
    /// other player's view. Unknown viewers are ignored, so a player already
    /// removed by the tick can be removed again by its connection.
    ///
    /// Returns the player, if `viewer` was one.
    pub fn remove_player(&mut self, viewer: ViewerId) -> Option<Player> {
        let Some(loader) = self.loaders.remove(&viewer) else {
            debug!("Remove {}: not registered", viewer);
            return None;
        };
        debug!(
            "Remove {} (loaded {} of {} resident chunks)",
            viewer,
            loader.loaded().len(),
            self.store.len()
        );
        for pos in loader.loaded() {
            let removed = self
                .store
                .get(*pos)
                .is_some_and(|chunk| chunk.remove_viewer(viewer));
            if !removed {
                panic!("{viewer} is not registered on its loaded chunk {pos}");
            }
        }
        self.viewers.remove(&viewer);

        let mut player = self.players.remove(&viewer)?;
        let id = player.id();
        self.entity_index.remove(&id);
        if let Some(handle) = player.view.take() {
            self.player_views.delete(handle);
        }
        player.entities_in_view.clear();
        for (other, watcher) in self.players.iter_mut() {
            if watcher.entities_in_view.remove(&id) {
                if let Some(client) = self.viewers.get(other) {
                    client.view_remove_entities(&[id]);
                }
            }
        }
        Some(player)
    }

    // -----------------------------------------------------------------------
    // Main tick
    // -----------------------------------------------------------------------

    /// Advance the world by one tick.
    ///
    /// Chunk maintenance runs every `chunk_load_interval` ticks (starting
    /// with the first); movement and entity views run every tick, in that
    /// order.
    pub fn tick(&mut self) -> TickReport {
        let n = self.tick_count;
        self.tick_count += 1;
        let mut report = TickReport {
            tick: self.tick_count,
            ..Default::default()
        };

        if n % self.config.chunk_load_interval.max(1) == 0 {
            let (loaded, unloaded) = self.subtick_chunk_load();
            report.loaded = loaded;
            report.unloaded = unloaded;
        }

        for viewer in self.subtick_update_players() {
            if let Some(player) = self.remove_player(viewer) {
                report.disconnected.push(player);
            }
        }
        self.subtick_update_entities();

        report
    }

    /// Load what loaders ask for, release what they no longer need, and
    /// evict chunks left without viewers.
    pub fn subtick_chunk_load(&mut self) -> (usize, usize) {
        for (viewer, player) in self.players.iter_mut() {
            let pos = player.position().chunk_pos();
            if pos != player.chunk_pos {
                player.chunk_pos = pos;
                if let Some(client) = self.viewers.get(viewer) {
                    client.send_set_chunk_cache_center(pos);
                }
            }
            if let Some(loader) = self.loaders.get_mut(viewer) {
                loader.follow(&*player);
            }
        }

        // A fresh shuffle each pass so no loader is always first in line for
        // the shared budget.
        let mut order: Vec<ViewerId> = self.loaders.keys().copied().collect();
        order.sort_unstable();
        fastrand::shuffle(&mut order);

        let mut budget = self.config.max_chunk_loads_per_pass;
        let mut loaded = 0;
        'pass: for viewer in order {
            let Some(loader) = self.loaders.get_mut(&viewer) else {
                continue;
            };
            let Some(client) = self.viewers.get(&viewer) else {
                continue;
            };
            loader.calc_loading_queue();
            for pos in loader.take_load_queue() {
                if !loader.limiter().allow() {
                    break;
                }
                if !self.store.contains(pos) {
                    if budget == 0 || !self.store.load(pos) {
                        break 'pass;
                    }
                    budget -= 1;
                    loaded += 1;
                }
                let Some(chunk) = self.store.get(pos) else {
                    continue;
                };
                loader.mark_loaded(pos);
                chunk.add_viewer(viewer);
                client.view_chunk_load(pos, chunk.chunk());
            }
        }

        for (viewer, loader) in self.loaders.iter_mut() {
            loader.calc_unused_chunks();
            for pos in loader.take_unload_queue() {
                loader.mark_unloaded(&pos);
                let removed = self
                    .store
                    .get(pos)
                    .is_some_and(|chunk| chunk.remove_viewer(*viewer));
                if !removed {
                    panic!("{viewer} is not registered on its loaded chunk {pos}");
                }
                if let Some(client) = self.viewers.get(viewer) {
                    client.view_chunk_unload(pos);
                }
            }
        }

        let idle = self.store.idle();
        let unloaded = idle.len();
        for pos in idle {
            self.store.unload(pos);
        }
        (loaded, unloaded)
    }

    /// Reconcile every player's proposed pose. Returns the viewers that sent
    /// an invalid move and have been told to disconnect.
    pub fn subtick_update_players(&mut self) -> Vec<ViewerId> {
        let threshold = self.config.movement_threshold;
        // A negative configured maximum behaves like zero.
        let max_view = self.config.max_view_distance.max(0);
        let mut invalid = Vec::new();

        for (viewer, player) in self.players.iter_mut() {
            let Some(client) = self.viewers.get(viewer) else {
                continue;
            };
            let inputs = Arc::clone(player.inputs());
            let Some(mut inputs) = inputs.try_lock() else {
                continue;
            };
            player.latency = inputs.latency;
            player.view_distance = inputs.view_distance.clamp(0, max_view);

            match movement::reconcile(player, &mut inputs, client.as_ref(), threshold) {
                Reconciliation::Invalid => {
                    client.send_disconnect(DisconnectReason::InvalidPlayerMovement);
                    invalid.push(*viewer);
                }
                Reconciliation::Corrected { teleport_id } => {
                    debug!(
                        "Player {} moved too quickly, teleport #{} issued",
                        player.name(),
                        teleport_id
                    );
                }
                _ => {}
            }
        }
        invalid
    }

    /// Broadcast this tick's moves and keep every player's view table in
    /// step with its interest box.
    pub fn subtick_update_entities(&mut self) {
        // Roll poses forward and refresh interest boxes.
        let mut moves: HashMap<EntityId, (MoveUpdate, bool)> = HashMap::new();
        for (viewer, player) in self.players.iter_mut() {
            let view = player.view_box();
            let current = player.view.and_then(|h| self.player_views.bound(h).copied());
            if current != Some(view) {
                let handle = match player.view.and_then(|h| self.player_views.update(h, view)) {
                    Some(handle) => handle,
                    None => self.player_views.insert(
                        view,
                        PlayerView {
                            viewer: *viewer,
                            entity: player.id(),
                        },
                    ),
                };
                player.view = Some(handle);
            }
            if let Some(update) = player.entity.take_movement() {
                moves.insert(player.id(), (update, player.entity.on_ground));
            }
        }

        // Drop whatever left each viewer's box.
        let positions: HashMap<EntityId, Position> = self
            .players
            .values()
            .map(|p| (p.id(), p.position()))
            .collect();
        for (viewer, player) in self.players.iter_mut() {
            let view = player.view_box();
            let mut gone = Vec::new();
            player.entities_in_view.retain(|id| {
                let visible = positions
                    .get(id)
                    .is_some_and(|pos| view.within(pos.to_vec3()));
                if !visible {
                    gone.push(*id);
                }
                visible
            });
            if !gone.is_empty() {
                gone.sort_unstable();
                if let Some(client) = self.viewers.get(viewer) {
                    client.view_remove_entities(&gone);
                }
            }
        }

        // Introduce newcomers, forward moves to existing watchers.
        let infos: Vec<PlayerInfo> = self.players.values().map(Player::info).collect();
        for info in &infos {
            let id = info.entity_id;
            let mut watchers = Vec::new();
            self.player_views
                .find(info.position.to_vec3(), |_, node| {
                    if node.entity != id {
                        watchers.push(node.viewer);
                    }
                    true
                });

            for watcher in watchers {
                let (Some(player), Some(client)) =
                    (self.players.get_mut(&watcher), self.viewers.get(&watcher))
                else {
                    continue;
                };
                if player.entities_in_view.insert(id) {
                    client.view_add_player(info);
                } else if let Some((update, on_ground)) = moves.get(&id) {
                    update.dispatch(client.as_ref(), id, *on_ground);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> WorldStats {
        WorldStats {
            resident_chunks: self.store.len(),
            loaders: self.loaders.len(),
            players: self.players.len(),
            total_ticks: self.tick_count,
        }
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn chunk_viewer_count(&self, pos: ChunkPos) -> Option<usize> {
        self.store.get(pos).map(LoadedChunk::viewer_count)
    }

    pub fn loader(&self, viewer: ViewerId) -> Option<&Loader> {
        self.loaders.get(&viewer)
    }

    pub fn player(&self, viewer: ViewerId) -> Option<&Player> {
        self.players.get(&viewer)
    }

    pub fn player_mut(&mut self, viewer: ViewerId) -> Option<&mut Player> {
        self.players.get_mut(&viewer)
    }

    pub fn viewer_of(&self, entity: EntityId) -> Option<ViewerId> {
        self.entity_index.get(&entity).copied()
    }

    pub fn players(&self) -> impl Iterator<Item = (ViewerId, &Player)> {
        self.players.iter().map(|(v, p)| (*v, p))
    }

    pub fn player_views(&self) -> &ViewTree {
        &self.player_views
    }
}
