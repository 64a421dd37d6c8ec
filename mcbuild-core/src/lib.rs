//! MCBuild Core Library
//!
//! This crate provides the synchronous building blocks of MCBuild:
//! - Build configuration and layered config loading
//! - Pack destination path resolution
//! - Staging copy/remove primitives and archive packaging
//! - The bundler boundary (options, results, lifecycle hooks)
//! - The reload wire protocol
//! - World save sync and Script API release lookup

pub mod archive;
pub mod bundler;
pub mod fs_utils;
pub mod paths;
pub mod protocol;
pub mod registry;
pub mod status;
pub mod types;
pub mod world;

// Re-export commonly used types
pub use archive::{compress, ArchiveError};
pub use bundler::{BuildHooks, BuildMessage, BuildOptions, BuildResult, OutputFormat};
pub use fs_utils::{clean_dir, copy_recursive, normalize_path, path_to_string, remove_path};
pub use paths::{resolve_pack_paths, BuildCommand, PackPaths, ProjectLayout};
pub use protocol::{tellraw_notice, CommandRequest, CommandSink, NullSink, RELOAD_COMMAND};
pub use registry::{ApiRelease, RegistryError};
pub use types::{
    BuildConfig, BundlerOverrides, ConfigError, ConfigLayer, Lang, Mode, PackType, ServerLayer,
    ServerOptions,
};
pub use world::{
    ensure_world_pack, override_world, sync_world, SyncDirection, WorldError, WorldSync,
};
