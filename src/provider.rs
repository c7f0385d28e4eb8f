//! Storage collaborators: where chunks and player data come from and go to.
//!
//! Both providers distinguish "never stored" ([`StorageError::NotExist`]) from
//! real failures so callers can fall back to defaults. Chunk providers may
//! additionally answer [`StorageError::RateLimited`] when their own I/O budget
//! is spent.

use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::chunk::Chunk;
use crate::entity::{EntityIdAllocator, Player, PlayerProfile};
use crate::error::StorageError;
use crate::limiter::RateLimiter;
use crate::types::{ChunkPos, Position, Rotation};

// ---------------------------------------------------------------------------
// Chunks
// ---------------------------------------------------------------------------

pub trait ChunkProvider: Send + Sync {
    fn get_chunk(&self, pos: ChunkPos) -> Result<Chunk, StorageError>;
    fn put_chunk(&self, pos: ChunkPos, chunk: &Chunk) -> Result<(), StorageError>;
}

fn check_limit(limiter: &Option<RateLimiter>) -> Result<(), StorageError> {
    match limiter {
        Some(limiter) if !limiter.allow() => Err(StorageError::RateLimited),
        _ => Ok(()),
    }
}

/// Keeps chunks in a map; used by tests and throwaway worlds.
#[derive(Default)]
pub struct MemoryChunkProvider {
    chunks: Mutex<HashMap<ChunkPos, Chunk>>,
    limiter: Option<RateLimiter>,
}

impl MemoryChunkProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limiter(limiter: RateLimiter) -> Self {
        Self {
            chunks: Mutex::new(HashMap::new()),
            limiter: Some(limiter),
        }
    }

    pub fn insert(&self, pos: ChunkPos, chunk: Chunk) {
        self.chunks.lock().insert(pos, chunk);
    }

    pub fn stored(&self, pos: ChunkPos) -> Option<Chunk> {
        self.chunks.lock().get(&pos).cloned()
    }

    pub fn len(&self) -> usize {
        self.chunks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.lock().is_empty()
    }
}

impl ChunkProvider for MemoryChunkProvider {
    fn get_chunk(&self, pos: ChunkPos) -> Result<Chunk, StorageError> {
        check_limit(&self.limiter)?;
        self.chunks
            .lock()
            .get(&pos)
            .cloned()
            .ok_or(StorageError::NotExist)
    }

    fn put_chunk(&self, pos: ChunkPos, chunk: &Chunk) -> Result<(), StorageError> {
        self.chunks.lock().insert(pos, chunk.clone());
        Ok(())
    }
}

/// One JSON document per chunk: `<dir>/c.<x>.<z>.json`.
pub struct DirChunkProvider {
    dir: PathBuf,
    limiter: Option<RateLimiter>,
}

impl DirChunkProvider {
    pub fn new(dir: impl Into<PathBuf>, limiter: Option<RateLimiter>) -> Self {
        Self {
            dir: dir.into(),
            limiter,
        }
    }

    pub fn path_for(&self, pos: ChunkPos) -> PathBuf {
        self.dir.join(format!("c.{}.{}.json", pos.x, pos.z))
    }
}

impl ChunkProvider for DirChunkProvider {
    fn get_chunk(&self, pos: ChunkPos) -> Result<Chunk, StorageError> {
        check_limit(&self.limiter)?;
        let bytes = read_existing(&self.path_for(pos))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn put_chunk(&self, pos: ChunkPos, chunk: &Chunk) -> Result<(), StorageError> {
        write_atomic(&self.path_for(pos), &serde_json::to_vec(chunk)?)
    }
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// Persisted part of a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    pub position: Position,
    pub rotation: Rotation,
    pub game_mode: i32,
}

impl PlayerData {
    pub fn of(player: &Player) -> Self {
        Self {
            position: player.position(),
            rotation: player.rotation(),
            game_mode: player.game_mode,
        }
    }
}

pub trait PlayerProvider: Send + Sync {
    fn load_player(&self, uuid: Uuid) -> Result<PlayerData, StorageError>;
    fn save_player(&self, uuid: Uuid, data: &PlayerData) -> Result<(), StorageError>;

    /// Hydrate a player from storage. The entity id is only allocated once
    /// the data has been read.
    fn get_player(
        &self,
        profile: PlayerProfile,
        ids: &EntityIdAllocator,
        view_distance: i32,
    ) -> Result<Player, StorageError> {
        let data = self.load_player(profile.uuid)?;
        Ok(Player::new(
            ids.allocate(),
            profile,
            data.position,
            data.rotation,
            data.game_mode,
            view_distance,
        ))
    }
}

#[derive(Default)]
pub struct MemoryPlayerProvider {
    players: Mutex<HashMap<Uuid, PlayerData>>,
}

impl MemoryPlayerProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlayerProvider for MemoryPlayerProvider {
    fn load_player(&self, uuid: Uuid) -> Result<PlayerData, StorageError> {
        self.players
            .lock()
            .get(&uuid)
            .cloned()
            .ok_or(StorageError::NotExist)
    }

    fn save_player(&self, uuid: Uuid, data: &PlayerData) -> Result<(), StorageError> {
        self.players.lock().insert(uuid, data.clone());
        Ok(())
    }
}

/// One JSON document per player: `<dir>/<uuid>.json`.
pub struct DirPlayerProvider {
    dir: PathBuf,
}

impl DirPlayerProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, uuid: Uuid) -> PathBuf {
        self.dir.join(format!("{uuid}.json"))
    }
}

impl PlayerProvider for DirPlayerProvider {
    fn load_player(&self, uuid: Uuid) -> Result<PlayerData, StorageError> {
        let bytes = read_existing(&self.path_for(uuid))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn save_player(&self, uuid: Uuid, data: &PlayerData) -> Result<(), StorageError> {
        write_atomic(&self.path_for(uuid), &serde_json::to_vec_pretty(data)?)
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn read_existing(path: &Path) -> Result<Vec<u8>, StorageError> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotExist),
        Err(e) => Err(e.into()),
    }
}

/// Write through a sibling temp file so readers never see a torn document.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    debug!("Stored {}", path.display());
    Ok(())
}
