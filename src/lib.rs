//! Tickworld
//!
//! An authoritative world tick engine: streams chunks to players around
//! their position, validates player movement, and keeps each player's view
//! of nearby entities in sync.
//!
//! ## Architecture
//!
//! ```text
//! Ticker  (ticker.rs)            ← fixed-period loop (server feature)
//!   └── World  (world.rs)        ← lock owner, join/leave pairing
//!         └── WorldService  (service.rs)
//!               ├── ChunkStore + Loader  (chunk.rs, loader.rs, provider.rs)
//!               ├── reconcile            (movement.rs)
//!               └── interest index       (bvh/)
//! session.rs / client.rs         ← per-connection tasks, outbound queue
//! ```
//!
//! Packet handlers never touch tick state: they write each player's
//! [`Inputs`](entity::Inputs) mailbox, and the tick reads it.

// Core engine modules are always available.
pub mod bvh;
pub mod chunk;
pub mod entity;
pub mod error;
pub mod limiter;
pub mod loader;
pub mod movement;
pub mod protocol;
pub mod provider;
pub mod service;
pub mod settings;
pub mod types;
pub mod viewer;
pub mod world;

// Networking modules require the `server` feature.
#[cfg(feature = "server")]
pub mod client;
#[cfg(feature = "server")]
pub mod session;
#[cfg(feature = "server")]
pub mod ticker;

// Convenience re-exports
#[cfg(feature = "server")]
pub use client::QueuedClient;
#[cfg(feature = "server")]
pub use ticker::Ticker;

pub use chunk::{BlockState, Chunk, ChunkStatus, LoadedChunk};
pub use entity::{EntityIdAllocator, Inputs, Player, PlayerProfile};
pub use error::{StorageError, WorldError};
pub use limiter::RateLimiter;
pub use loader::Loader;
pub use service::{TickReport, WorldService};
pub use settings::ServerSettings;
pub use types::{ChunkPos, EntityId, Position, Rotation, WorldConfig, WorldStats};
pub use viewer::{ChunkViewer, Client, EntityViewer, NoopViewer, ViewerId};
pub use world::{PlayerSession, World};
