//! Build orchestrator
//!
//! Implements the bundler lifecycle hooks: staging before each build, and
//! packaging plus reload notification after each successful one.
//!
//! ```text
//! Idle -> Staging -> Bundling -> Success -> [Packaging] -> Notifying -> Idle
//!                             -> Failure -----------------------------> Idle
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use anyhow::Context;
use mcbuild_core::{
    clean_dir, compress, copy_recursive, status, tellraw_notice, BuildCommand, BuildConfig,
    BuildHooks, BuildResult, CommandSink, PackPaths, PackType, ProjectLayout, RELOAD_COMMAND,
};

/// User callback run around a build
pub type Callback = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Optional pre/post-build callbacks
#[derive(Clone, Default)]
pub struct BuildCallbacks {
    /// Runs at the start of every attempt; failing it fails the attempt
    pub before: Option<Callback>,
    /// Runs after every successful build; failures are logged
    pub after: Option<Callback>,
}

impl BuildCallbacks {
    /// Shell-command callbacks from `beforeBuild` / `afterBuild`
    pub fn from_config(config: &BuildConfig, layout: &ProjectLayout) -> Self {
        Self {
            before: config
                .before_build
                .clone()
                .map(|cmd| shell_callback(cmd, layout.root.clone())),
            after: config
                .after_build
                .clone()
                .map(|cmd| shell_callback(cmd, layout.root.clone())),
        }
    }
}

fn shell_callback(command: String, cwd: PathBuf) -> Callback {
    Arc::new(move || {
        tracing::info!("Running hook: {}", command);
        let status = shell(&command)
            .current_dir(&cwd)
            .status()
            .with_context(|| format!("Failed to run hook `{}`", command))?;
        if !status.success() {
            anyhow::bail!("Hook `{}` exited with {}", command, status);
        }
        Ok(())
    })
}

#[cfg(windows)]
fn shell(command: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("cmd");
    cmd.args(["/C", command]);
    cmd
}

#[cfg(not(windows))]
fn shell(command: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}

/// Whether the pack sources have been copied into the staging destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingState {
    NotYetStaged,
    Staged,
}

#[derive(Debug)]
struct CycleState {
    staging: StagingState,
    /// Completed build attempts, successful or not
    builds: u64,
    started_at: Option<Instant>,
}

/// Drives staging, packaging and notification around bundler builds
pub struct Orchestrator {
    config: Arc<BuildConfig>,
    command: BuildCommand,
    layout: ProjectLayout,
    paths: PackPaths,
    sink: Arc<dyn CommandSink>,
    callbacks: BuildCallbacks,
    state: Mutex<CycleState>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<BuildConfig>,
        command: BuildCommand,
        layout: ProjectLayout,
        paths: PackPaths,
        sink: Arc<dyn CommandSink>,
    ) -> Self {
        Self {
            config,
            command,
            layout,
            paths,
            sink,
            callbacks: BuildCallbacks::default(),
            state: Mutex::new(CycleState {
                staging: StagingState::NotYetStaged,
                builds: 0,
                started_at: None,
            }),
        }
    }

    pub fn with_callbacks(mut self, callbacks: BuildCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    fn state(&self) -> MutexGuard<'_, CycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Completed build attempts
    pub fn builds(&self) -> u64 {
        self.state().builds
    }

    pub fn staging_state(&self) -> StagingState {
        self.state().staging
    }

    pub fn paths(&self) -> &PackPaths {
        &self.paths
    }

    /// One-shot builds always stage; `watch` stages until it has succeeded once.
    /// Destinations inside `build/` are wiped every cycle and need staging again.
    fn needs_full_staging(&self, staging: StagingState) -> bool {
        match self.command {
            BuildCommand::Build => true,
            BuildCommand::Watch => {
                staging == StagingState::NotYetStaged
                    || self.paths.inside(&self.layout.build_dir())
            }
        }
    }

    fn stage_packs(&self) -> anyhow::Result<()> {
        let name = &self.config.pack_name;
        let has_rp = self.config.pack_type.has_resource_pack();

        status::clean(&self.paths.bp);
        clean_dir(&self.paths.bp).context("Failed to clean behavior pack destination")?;
        if has_rp {
            status::clean(&self.paths.rp);
            clean_dir(&self.paths.rp).context("Failed to clean resource pack destination")?;
        }

        status::copy("behavior pack", &self.paths.bp);
        copy_recursive(&self.layout.behavior_source(name), &self.paths.bp)
            .context("Failed to copy behavior pack")?;
        if has_rp {
            status::copy("resource pack", &self.paths.rp);
            copy_recursive(&self.layout.resource_source(name), &self.paths.rp)
                .context("Failed to copy resource pack")?;
        }

        Ok(())
    }

    fn stage_world(&self) -> anyhow::Result<()> {
        let dest = self.layout.world_build_dir();

        status::copy("world", &dest);
        copy_recursive(&self.layout.world_dir(), &dest).context("Failed to copy world")?;

        let template = self.layout.world_template_dir();
        if template.exists() {
            copy_recursive(&template, &dest).context("Failed to copy world template")?;
        } else {
            tracing::debug!("No world template at {}", template.display());
        }

        Ok(())
    }

    /// Write the release archives into `dist/`
    ///
    /// Archives are written one at a time; a failed archive is logged and the rest
    /// still get written. Returns the archives that were created.
    pub fn package(&self) -> anyhow::Result<Vec<PathBuf>> {
        let name = &self.config.pack_name;
        let dist = self.layout.dist_dir();
        let mut jobs: Vec<(PathBuf, PathBuf)> = Vec::new();

        if self.config.pack_type == PackType::World {
            let world = self.layout.world_build_dir();
            copy_recursive(&self.paths.bp, &world.join("behavior_packs").join(name))
                .context("Failed to copy behavior pack into world")?;
            copy_recursive(&self.paths.rp, &world.join("resource_packs").join(name))
                .context("Failed to copy resource pack into world")?;

            jobs.push((dist.join(format!("{}.mcworld", name)), world.clone()));
            jobs.push((dist.join(format!("{}.mctemplate", name)), world));
        }

        jobs.push((dist.join(format!("{}_bp.mcpack", name)), self.paths.bp.clone()));
        if self.config.pack_type.has_resource_pack() {
            jobs.push((dist.join(format!("{}_rp.mcpack", name)), self.paths.rp.clone()));
        }

        let mut written = Vec::with_capacity(jobs.len());
        for (output, content) in jobs {
            match compress(&output, &content) {
                Ok(path) => {
                    status::compressed(&content, &path);
                    written.push(path);
                }
                Err(e) => {
                    tracing::error!(
                        "Compressed file failed to be created at {}: {}",
                        output.display(),
                        e
                    );
                }
            }
        }

        Ok(written)
    }

    fn notify_reload(&self) {
        self.sink.send(RELOAD_COMMAND);
        self.sink.send(&tellraw_notice("reloaded"));
    }
}

impl BuildHooks for Orchestrator {
    fn on_start(&self) -> anyhow::Result<()> {
        if let Some(before) = &self.callbacks.before {
            before().context("beforeBuild hook failed")?;
        }

        let staging = {
            let mut state = self.state();
            state.started_at = Some(Instant::now());
            state.staging
        };

        clean_dir(&self.layout.build_dir()).context("Failed to clean build directory")?;

        if self.needs_full_staging(staging) {
            self.stage_packs()?;
            self.state().staging = StagingState::Staged;
        }

        if self.config.is_release() && self.config.pack_type == PackType::World {
            self.stage_world()?;
        }

        Ok(())
    }

    fn on_end(&self, result: &BuildResult) {
        if !result.is_success() {
            self.state().builds += 1;
            for error in &result.errors {
                tracing::error!("{}", error.text);
            }
            status::build_failed(result.errors.len());
            return;
        }

        if let Some(after) = &self.callbacks.after {
            if let Err(e) = after() {
                tracing::error!("afterBuild hook failed: {:#}", e);
            }
        }

        if self.command == BuildCommand::Build && self.config.is_release() {
            if let Err(e) = self.package() {
                tracing::error!("Packaging failed: {:#}", e);
            }
        }

        let started_at = {
            let mut state = self.state();
            state.builds += 1;
            state.started_at.take()
        };
        status::built(started_at.map(|t| t.elapsed()).unwrap_or_default());

        self.notify_reload();
    }
}
