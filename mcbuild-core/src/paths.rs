//! Project layout and pack destination paths
//!
//! Staging destinations come in two families that are never mixed within a run:
//! the live game data directories used by a dev-mode `watch`, and the local
//! `build/` tree used everywhere else.

use std::path::{Path, PathBuf};

use crate::types::BuildConfig;

/// The pipeline command a run was started with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildCommand {
    /// One-shot build
    Build,
    /// Continuous rebuild with live reload
    Watch,
}

/// Fixed locations inside the project directory
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `behavior_packs/<pack>`
    pub fn behavior_source(&self, pack_name: &str) -> PathBuf {
        self.root.join("behavior_packs").join(pack_name)
    }

    /// `resource_packs/<pack>`
    pub fn resource_source(&self, pack_name: &str) -> PathBuf {
        self.root.join("resource_packs").join(pack_name)
    }

    /// Top-level build output, wiped at the start of every build
    pub fn build_dir(&self) -> PathBuf {
        self.root.join("build")
    }

    /// Staged world contents (`build/world`)
    pub fn world_build_dir(&self) -> PathBuf {
        self.build_dir().join("world")
    }

    /// Release archives
    pub fn dist_dir(&self) -> PathBuf {
        self.root.join("dist")
    }

    /// The project's copy of the world save
    pub fn world_dir(&self) -> PathBuf {
        self.root.join("world")
    }

    /// World template metadata merged into the packaged world
    pub fn world_template_dir(&self) -> PathBuf {
        self.root.join("world_template")
    }

    /// Resolve a configured path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Staging destinations for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackPaths {
    /// Behavior pack destination
    pub bp: PathBuf,
    /// Resource pack destination
    pub rp: PathBuf,
    /// True when the destinations live in the game data directory
    pub live: bool,
}

impl PackPaths {
    /// Whether the destinations are inside the wiped `build/` tree
    pub fn inside(&self, dir: &Path) -> bool {
        self.bp.starts_with(dir) && self.rp.starts_with(dir)
    }
}

/// Compute staging destinations for a run
///
/// A dev-mode `watch` stages into `<mcdir>/development_{behavior,resource}_packs/<pack>`
/// so the game picks changes up directly; everything else stages into `build/{bp,rp}/<pack>`.
/// `mcdir` is only consulted for the live family.
pub fn resolve_pack_paths(
    config: &BuildConfig,
    command: BuildCommand,
    layout: &ProjectLayout,
    mcdir: Option<&Path>,
) -> PackPaths {
    let name = config.pack_name.as_str();
    match (command, config.is_dev(), mcdir) {
        (BuildCommand::Watch, true, Some(mcdir)) => PackPaths {
            bp: mcdir.join("development_behavior_packs").join(name),
            rp: mcdir.join("development_resource_packs").join(name),
            live: true,
        },
        _ => PackPaths {
            bp: layout.build_dir().join("bp").join(name),
            rp: layout.build_dir().join("rp").join(name),
            live: false,
        },
    }
}

/// Whether a command needs the game data directory to resolve its paths
pub fn needs_minecraft_dir(config: &BuildConfig, command: BuildCommand) -> bool {
    command == BuildCommand::Watch && config.is_dev()
}

/// The live world save slot (`<mcdir>/minecraftWorlds/<pack>`)
pub fn world_slot(mcdir: &Path, pack_name: &str) -> PathBuf {
    mcdir.join("minecraftWorlds").join(pack_name)
}

/// Get the default Minecraft Bedrock data directory (`com.mojang`) for the current platform
pub fn default_minecraft_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        dirs::data_local_dir().map(|local| {
            local
                .join("Packages")
                .join("Microsoft.MinecraftUWP_8wekyb3d8bbwe")
                .join("LocalState")
                .join("games")
                .join("com.mojang")
        })
    }

    #[cfg(not(target_os = "windows"))]
    {
        // No native client; mcpelauncher keeps its data here
        dirs::data_local_dir().map(|local| {
            local
                .join("mcpelauncher")
                .join("games")
                .join("com.mojang")
        })
    }
}
