//! World save synchronization between the project and the game
//!
//! The project keeps its world in `./world`; the game keeps it in
//! `<mcdir>/minecraftWorlds/<pack>`.

use std::path::{Path, PathBuf};

use crate::fs_utils::copy_recursive;
use crate::paths::{world_slot, ProjectLayout};
use crate::types::{BuildConfig, PackType};

/// Errors from world sync commands
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("The pack type isn't 'world' (got '{0}')")]
    NotWorldPack(String),

    #[error("World copy failed: {0}")]
    IoError(#[from] std::io::Error),
}

/// Which way a sync copied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Live slot pulled into the project
    LiveToLocal,
    /// Project pushed into a fresh live slot
    LocalToLive,
}

/// Result of a world copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldSync {
    pub direction: SyncDirection,
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Fail with a usage error unless the project ships a world
pub fn ensure_world_pack(config: &BuildConfig) -> Result<(), WorldError> {
    if config.pack_type != PackType::World {
        return Err(WorldError::NotWorldPack(
            format!("{:?}", config.pack_type).to_lowercase(),
        ));
    }
    Ok(())
}

/// Copy the world one way or the other
///
/// If the live slot exists it is the source of truth and is copied into the project;
/// otherwise the project world seeds the live slot. Only valid for world packs, and
/// the pack type is checked before anything is touched.
pub fn sync_world(
    config: &BuildConfig,
    layout: &ProjectLayout,
    mcdir: &Path,
) -> Result<WorldSync, WorldError> {
    ensure_world_pack(config)?;

    let live = world_slot(mcdir, &config.pack_name);
    let local = layout.world_dir();

    let sync = if live.exists() {
        WorldSync {
            direction: SyncDirection::LiveToLocal,
            from: live,
            to: local,
        }
    } else {
        WorldSync {
            direction: SyncDirection::LocalToLive,
            from: local,
            to: live,
        }
    };

    tracing::info!("Syncing world {} -> {}", sync.from.display(), sync.to.display());
    copy_recursive(&sync.from, &sync.to)?;
    Ok(sync)
}

/// Force the project world over the live slot
pub fn override_world(
    config: &BuildConfig,
    layout: &ProjectLayout,
    mcdir: &Path,
) -> Result<WorldSync, WorldError> {
    let sync = WorldSync {
        direction: SyncDirection::LocalToLive,
        from: layout.world_dir(),
        to: world_slot(mcdir, &config.pack_name),
    };

    tracing::info!("Overriding world {} -> {}", sync.from.display(), sync.to.display());
    copy_recursive(&sync.from, &sync.to)?;
    Ok(sync)
}
