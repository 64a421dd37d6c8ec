//! MCBuild Server
//!
//! The long-running half of MCBuild: the WebSocket reload channel the game
//! connects to, the pack mirror watcher, the build orchestrator and the
//! esbuild-backed bundler.

pub mod bundler;
pub mod esbuild;
pub mod file_watcher;
pub mod orchestrator;
pub mod reload;

pub use bundler::Bundler;
pub use esbuild::{parse_diagnostics, EsbuildBundler};
pub use file_watcher::{mirror_targets, start_mirror_watcher, MirrorAction, MirrorTarget, MirrorWatcher};
pub use orchestrator::{BuildCallbacks, Callback, Orchestrator, StagingState};
pub use reload::ReloadChannel;
