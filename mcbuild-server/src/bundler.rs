//! Script bundler engine interface

use std::sync::Arc;

use async_trait::async_trait;
use mcbuild_core::{BuildHooks, BuildOptions, BuildResult};
use tokio::task::JoinHandle;

/// A script bundler driven through declarative options and lifecycle hooks
///
/// Every build attempt calls `hooks.on_start()` first and `hooks.on_end()` exactly
/// once afterwards, whether or not the attempt succeeded.
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Run one build attempt
    async fn build(
        &self,
        options: &BuildOptions,
        hooks: Arc<dyn BuildHooks>,
    ) -> anyhow::Result<BuildResult>;

    /// Build once, then rebuild whenever the script sources change
    ///
    /// The returned task runs until aborted or until the engine fails.
    async fn watch(
        &self,
        options: BuildOptions,
        hooks: Arc<dyn BuildHooks>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>>;
}
