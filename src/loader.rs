//! Per-viewer chunk loader.
//!
//! A loader follows a source (a player, or a fixed spawn anchor) and works out,
//! each maintenance pass, which columns must be requested and which released.
//! Requests are ordered nearest-first using a process-wide table of offsets
//! sorted by distance, so a rate-limited viewer always receives its immediate
//! surroundings before the fringe.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::limiter::RateLimiter;
use crate::types::ChunkPos;

/// Largest supported view radius, in chunks.
pub const MAX_RADIUS: i32 = 32;

/// Anything a loader can follow.
pub trait LoaderSource {
    fn chunk_position(&self) -> ChunkPos;
    fn chunk_radius(&self) -> i32;
}

/// A source that never moves, e.g. the spawn area keep-alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSource {
    pub center: ChunkPos,
    pub radius: i32,
}

impl LoaderSource for FixedSource {
    fn chunk_position(&self) -> ChunkPos {
        self.center
    }

    fn chunk_radius(&self) -> i32 {
        self.radius
    }
}

// ---------------------------------------------------------------------------
// Offset table
// ---------------------------------------------------------------------------

/// Every offset within [`MAX_RADIUS`] of the origin, nearest first, plus the
/// prefix length for each integer radius.
pub struct LoadTable {
    offsets: Vec<(i32, i32)>,
    prefix: Vec<usize>,
}

impl LoadTable {
    fn build(max_radius: i32) -> Self {
        let mut offsets = Vec::new();
        for x in -max_radius..=max_radius {
            for z in -max_radius..=max_radius {
                if offset_distance((x, z)) <= f64::from(max_radius) {
                    offsets.push((x, z));
                }
            }
        }
        // Stable sort keeps the x-major scan order among equal distances.
        offsets.sort_by(|a, b| offset_distance(*a).total_cmp(&offset_distance(*b)));

        let prefix = (0..=max_radius)
            .map(|r| offsets.partition_point(|o| offset_distance(*o) <= f64::from(r)))
            .collect();

        Self { offsets, prefix }
    }

    pub fn offsets(&self) -> &[(i32, i32)] {
        &self.offsets
    }

    /// Offsets whose distance from the origin is at most `radius`, nearest
    /// first. Radii are clamped to `0..=MAX_RADIUS`.
    pub fn within(&self, radius: i32) -> &[(i32, i32)] {
        let r = radius.clamp(0, MAX_RADIUS) as usize;
        &self.offsets[..self.prefix[r]]
    }
}

pub fn load_table() -> &'static LoadTable {
    static TABLE: OnceLock<LoadTable> = OnceLock::new();
    TABLE.get_or_init(|| LoadTable::build(MAX_RADIUS))
}

pub fn offset_distance((x, z): (i32, i32)) -> f64 {
    (f64::from(x) * f64::from(x) + f64::from(z) * f64::from(z)).sqrt()
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

pub struct Loader {
    center: ChunkPos,
    radius: i32,
    loaded: HashSet<ChunkPos>,
    load_queue: Vec<ChunkPos>,
    unload_queue: Vec<ChunkPos>,
    limiter: RateLimiter,
}

impl Loader {
    pub fn new(source: &impl LoaderSource, limiter: RateLimiter) -> Self {
        let mut loader = Self {
            center: source.chunk_position(),
            radius: source.chunk_radius().clamp(0, MAX_RADIUS),
            loaded: HashSet::new(),
            load_queue: Vec::new(),
            unload_queue: Vec::new(),
            limiter,
        };
        loader.calc_loading_queue();
        loader
    }

    /// Pick up the source's current column and radius.
    pub fn follow(&mut self, source: &impl LoaderSource) {
        self.center = source.chunk_position();
        self.radius = source.chunk_radius().clamp(0, MAX_RADIUS);
    }

    pub fn center(&self) -> ChunkPos {
        self.center
    }

    pub fn radius(&self) -> i32 {
        self.radius
    }

    pub fn loaded(&self) -> &HashSet<ChunkPos> {
        &self.loaded
    }

    pub fn is_loaded(&self, pos: &ChunkPos) -> bool {
        self.loaded.contains(pos)
    }

    pub fn load_queue(&self) -> &[ChunkPos] {
        &self.load_queue
    }

    pub fn unload_queue(&self) -> &[ChunkPos] {
        &self.unload_queue
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Replace the load queue with every column in range that is not yet
    /// loaded, nearest first.
    pub fn calc_loading_queue(&mut self) {
        self.load_queue.clear();
        for &(dx, dz) in load_table().within(self.radius) {
            let Some(pos) = self.center.checked_offset(dx, dz) else {
                continue;
            };
            if !self.loaded.contains(&pos) {
                self.load_queue.push(pos);
            }
        }
    }

    /// Replace the unload queue with every loaded column now out of range.
    pub fn calc_unused_chunks(&mut self) {
        self.unload_queue.clear();
        let r = f64::from(self.radius);
        for pos in &self.loaded {
            if self.center.distance(*pos) > r {
                self.unload_queue.push(*pos);
            }
        }
    }

    pub(crate) fn mark_loaded(&mut self, pos: ChunkPos) {
        self.loaded.insert(pos);
    }

    pub(crate) fn mark_unloaded(&mut self, pos: &ChunkPos) -> bool {
        self.loaded.remove(pos)
    }

    pub(crate) fn take_load_queue(&mut self) -> Vec<ChunkPos> {
        std::mem::take(&mut self.load_queue)
    }

    pub(crate) fn take_unload_queue(&mut self) -> Vec<ChunkPos> {
        std::mem::take(&mut self.unload_queue)
    }
}
