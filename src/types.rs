//! Core world types shared across all modules.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::bvh::Vec3;
use crate::limiter::RateLimiter;

/// Width of a chunk column in world units (blocks).
pub const CHUNK_WIDTH: i32 = 16;

/// Process-unique entity identifier.
pub type EntityId = i32;

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// No component is NaN or infinite.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn distance(&self, other: &Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Column containing this position.
    pub fn chunk_pos(&self) -> ChunkPos {
        let width = f64::from(CHUNK_WIDTH);
        ChunkPos::new(
            (self.x / width).floor() as i32,
            (self.z / width).floor() as i32,
        )
    }

    pub fn to_vec3(self) -> Vec3<f64> {
        Vec3([self.x, self.y, self.z])
    }
}

impl From<[f64; 3]> for Position {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Yaw/pitch in degrees.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Rotation {
    pub yaw: f32,
    pub pitch: f32,
}

impl Rotation {
    pub fn new(yaw: f32, pitch: f32) -> Self {
        Self { yaw, pitch }
    }

    pub fn is_valid(&self) -> bool {
        self.yaw.is_finite() && self.pitch.is_finite()
    }
}

// ---------------------------------------------------------------------------
// Spatial chunking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Saturates at the edge of the coordinate space.
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.z.saturating_add(dz))
    }

    /// `None` past the edge of the coordinate space.
    pub fn checked_offset(self, dx: i32, dz: i32) -> Option<Self> {
        Some(Self::new(self.x.checked_add(dx)?, self.z.checked_add(dz)?))
    }

    /// Euclidean distance between two columns, in chunks.
    pub fn distance(self, other: ChunkPos) -> f64 {
        let dx = f64::from(other.x) - f64::from(self.x);
        let dz = f64::from(other.z) - f64::from(self.z);
        (dx * dx + dz * dz).sqrt()
    }
}

impl std::fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.x, self.z)
    }
}

// ---------------------------------------------------------------------------
// Stats & config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorldStats {
    pub resident_chunks: usize,
    pub loaders: usize,
    pub players: usize,
    pub total_ticks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Tick period in microseconds.
    pub tick_period_us: u64,
    /// Chunk maintenance runs on every N-th tick.
    pub chunk_load_interval: u64,
    /// Proposed moves farther than this (world units) are corrected.
    pub movement_threshold: f64,
    /// Chunks the store may instantiate in a single maintenance pass.
    pub max_chunk_loads_per_pass: usize,
    /// View distance (chunks) given to players without persisted settings.
    pub view_distance: i32,
    /// Upper clamp for client-requested view distances.
    pub max_view_distance: i32,
    pub spawn_position: [i32; 3],
    pub spawn_angle: f32,
    pub default_game_mode: i32,
    /// Vertical sections in a placeholder chunk.
    pub chunk_sections: usize,
    /// Outbound events buffered per client before new ones are dropped.
    pub outbound_queue_capacity: usize,
}

impl WorldConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(self.tick_period_us.max(1))
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_period_us: 20_000,
            chunk_load_interval: 8,
            movement_threshold: 100.0,
            max_chunk_loads_per_pass: 256,
            view_distance: 10,
            max_view_distance: crate::loader::MAX_RADIUS,
            spawn_position: [48, 100, 35],
            spawn_angle: 0.0,
            default_game_mode: 1,
            chunk_sections: 24,
            outbound_queue_capacity: 256,
        }
    }
}

/// Token-bucket parameters: one token every `every_ms`, at most `burst`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LimiterConfig {
    pub every_ms: u64,
    pub burst: u32,
}

impl LimiterConfig {
    pub fn limiter(&self) -> RateLimiter {
        RateLimiter::new(Duration::from_millis(self.every_ms), self.burst)
    }
}
