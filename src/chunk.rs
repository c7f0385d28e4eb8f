//! Chunk column data and its resident wrapper.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::viewer::ViewerId;

/// Blocks along one edge of a section.
pub const SECTION_WIDTH: usize = 16;
/// Blocks in one 16³ section.
pub const SECTION_VOLUME: usize = SECTION_WIDTH * SECTION_WIDTH * SECTION_WIDTH;

/// Numeric block state identifier.
#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockState(pub u16);

impl BlockState {
    pub const AIR: BlockState = BlockState(0);
    pub const STONE: BlockState = BlockState(1);
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    #[default]
    Empty,
    Full,
}

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// Paletted 16³ block container.
///
/// A uniform section stores only its single palette entry; the first write of
/// a different block expands it to one palette index per block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    palette: Vec<BlockState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    indices: Vec<u16>,
}

impl Section {
    pub fn filled(block: BlockState) -> Self {
        Self {
            palette: vec![block],
            indices: Vec::new(),
        }
    }

    pub fn is_uniform(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn block(&self, index: usize) -> BlockState {
        if self.indices.is_empty() {
            return self.palette[0];
        }
        self.palette[usize::from(self.indices[index])]
    }

    pub fn set_block(&mut self, index: usize, block: BlockState) {
        if self.indices.is_empty() {
            if self.palette[0] == block {
                return;
            }
            self.indices = vec![0; SECTION_VOLUME];
        }
        let slot = match self.palette.iter().position(|b| *b == block) {
            Some(slot) => slot,
            None => {
                self.palette.push(block);
                self.palette.len() - 1
            }
        };
        // Palettes top out far below u16::MAX: a section holds 4096 blocks.
        self.indices[index] = slot as u16;
    }
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub sections: Vec<Section>,
    pub status: ChunkStatus,
}

impl Chunk {
    pub fn empty(sections: usize) -> Self {
        Self {
            sections: vec![Section::filled(BlockState::AIR); sections],
            status: ChunkStatus::Empty,
        }
    }

    /// Stand-in for terrain generation: every block set to `block`, marked
    /// as fully generated.
    pub fn placeholder(sections: usize, block: BlockState) -> Self {
        Self {
            sections: vec![Section::filled(block); sections],
            status: ChunkStatus::Full,
        }
    }
}

// ---------------------------------------------------------------------------
// Resident chunk
// ---------------------------------------------------------------------------

/// A chunk held by the store together with the viewers observing it.
pub struct LoadedChunk {
    chunk: Arc<Chunk>,
    viewers: Mutex<Vec<ViewerId>>,
}

impl LoadedChunk {
    pub fn new(chunk: Chunk) -> Self {
        Self {
            chunk: Arc::new(chunk),
            viewers: Mutex::new(Vec::new()),
        }
    }

    pub fn chunk(&self) -> &Arc<Chunk> {
        &self.chunk
    }

    /// Register a viewer.
    ///
    /// # Panics
    ///
    /// If the viewer is already registered: loader and store bookkeeping
    /// have diverged.
    pub fn add_viewer(&self, viewer: ViewerId) {
        let mut viewers = self.viewers.lock();
        if viewers.contains(&viewer) {
            panic!("viewer {viewer} is already registered on this chunk");
        }
        viewers.push(viewer);
    }

    /// Unregister a viewer; `false` if it was not registered.
    pub fn remove_viewer(&self, viewer: ViewerId) -> bool {
        let mut viewers = self.viewers.lock();
        match viewers.iter().position(|v| *v == viewer) {
            Some(i) => {
                viewers.swap_remove(i);
                true
            }
            None => false,
        }
    }

    pub fn viewers(&self) -> Vec<ViewerId> {
        self.viewers.lock().clone()
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.lock().len()
    }

    pub fn has_viewer(&self, viewer: ViewerId) -> bool {
        self.viewers.lock().contains(&viewer)
    }
}
