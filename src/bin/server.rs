//! tickworld-server binary
//!
//! Runs the world tick loop and accepts JSON-lines player connections.
//!
//! ## Configuration (TOML via `--config`, then `TICKWORLD__*` env)
//!
//! | Key                                   | Default         | Description                       |
//! |---------------------------------------|-----------------|-----------------------------------|
//! | `listen_address`                      | `0.0.0.0:25565` | TCP listen address                |
//! | `level_dir`                           | `world`         | Chunk and player data root        |
//! | `spawn_chunk_radius`                  | `2`             | Chunks kept resident around spawn |
//! | `world.tick_period_us`                | `20000`         | Tick period                       |
//! | `world.view_distance`                 | `10`            | Default view distance (chunks)    |
//! | `world.movement_threshold`            | `100.0`         | Max accepted move per tick        |
//! | `chunk_loading_limiter.every_ms`      | `1`             | Global chunk read rate            |
//! | `player_chunk_loading_limiter.burst`  | `64`            | Per-player chunk burst            |

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tickworld::{
    provider::{DirChunkProvider, DirPlayerProvider},
    session,
    settings::ServerSettings,
    ticker::Ticker,
    types::Position,
    world::World,
};
use tokio::net::TcpListener;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "tickworld-server", about = "Tickworld world server", version)]
struct Args {
    /// TOML settings file
    #[arg(long, env = "TICKWORLD_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address (overrides settings)
    #[arg(long, env = "TICKWORLD_LISTEN")]
    listen: Option<String>,

    /// Level directory (overrides settings)
    #[arg(long, env = "TICKWORLD_LEVEL_DIR")]
    level_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tickworld=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut settings =
        ServerSettings::load(args.config.as_deref()).context("loading settings")?;
    if let Some(listen) = args.listen {
        settings.listen_address = listen;
    }
    if let Some(level_dir) = args.level_dir {
        settings.level_dir = level_dir;
    }

    tracing::info!(
        listen = %settings.listen_address,
        level = %settings.level_dir.display(),
        view_distance = settings.world.view_distance,
        "starting tickworld-server"
    );

    let chunks = Arc::new(DirChunkProvider::new(
        settings.region_dir(),
        Some(settings.chunk_loading_limiter.limiter()),
    ));
    let players = Arc::new(DirPlayerProvider::new(settings.playerdata_dir()));
    let player_limiter = settings.player_chunk_loading_limiter;
    let world = World::new(settings.world.clone(), chunks, players)
        .with_player_limiter(move || player_limiter.limiter());

    let [x, y, z] = settings.world.spawn_position;
    let spawn = Position::new(f64::from(x), f64::from(y), f64::from(z)).chunk_pos();
    world.add_keep_alive(
        spawn,
        settings.spawn_chunk_radius,
        settings.chunk_loading_limiter.limiter(),
    );

    let listener = TcpListener::bind(&settings.listen_address)
        .await
        .with_context(|| format!("binding {}", settings.listen_address))?;

    let ticker = tokio::spawn(Ticker::new(world.clone()).run(async {
        tokio::signal::ctrl_c().await.ok();
    }));

    let accept = async {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let world = world.clone();
                    tokio::spawn(async move {
                        if let Err(e) = session::serve(world, stream, peer).await {
                            tracing::debug!(%peer, error = %e, "connection closed");
                        }
                    });
                }
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            }
        }
    };

    tokio::select! {
        _ = accept => {}
        res = ticker => {
            let ticks = res.context("tick loop panicked")?;
            tracing::info!(ticks, "shutting down");
        }
    }
    Ok(())
}
