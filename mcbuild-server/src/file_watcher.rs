//! Mirror watcher for live sync
//!
//! Watches the pack source directories and replicates every change into the
//! staged pack directories, so asset edits reach the game without a rebuild.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mcbuild_core::{copy_recursive, remove_path, status, BuildConfig, PackPaths, ProjectLayout};
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::task::JoinHandle;

/// A source tree and the staged directory it is mirrored into
#[derive(Debug, Clone)]
pub struct MirrorTarget {
    /// Short tag used in status lines (`BP`, `RP`)
    pub label: String,
    pub source: PathBuf,
    pub dest: PathBuf,
}

/// What a filesystem event means for the mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorAction {
    /// Created or modified: copy it over
    Update,
    /// Deleted: remove it from the destination
    Remove,
}

impl MirrorTarget {
    pub fn new(label: impl Into<String>, source: PathBuf, dest: PathBuf) -> Self {
        Self {
            label: label.into(),
            source,
            dest,
        }
    }

    /// Path relative to the watched root; `None` for the root itself or foreign paths
    pub fn relative(&self, path: &Path) -> Option<PathBuf> {
        let rel = path.strip_prefix(&self.source).ok()?;
        if rel.as_os_str().is_empty() {
            None
        } else {
            Some(rel.to_path_buf())
        }
    }

    /// Replicate one change; returns the relative path that was touched
    pub fn apply(&self, action: MirrorAction, path: &Path) -> std::io::Result<Option<PathBuf>> {
        let Some(rel) = self.relative(path) else {
            return Ok(None);
        };
        let dest = self.dest.join(&rel);

        match action {
            MirrorAction::Update => match copy_recursive(path, &dest) {
                Ok(()) => status::update(&self.label, &rel),
                // Gone between the event and the copy (editor temp files)
                Err(e) if e.kind() == std::io::ErrorKind::NotFound && !path.exists() => {
                    remove_path(&dest)?;
                    status::remove(&self.label, &rel);
                }
                Err(e) => return Err(e),
            },
            MirrorAction::Remove => {
                remove_path(&dest)?;
                status::remove(&self.label, &rel);
            }
        }

        Ok(Some(rel))
    }
}

/// Targets for a pack: BP always, RP only for pack types that carry one
pub fn mirror_targets(
    config: &BuildConfig,
    layout: &ProjectLayout,
    paths: &PackPaths,
) -> Vec<MirrorTarget> {
    let mut targets = vec![MirrorTarget::new(
        "BP",
        layout.behavior_source(&config.pack_name),
        paths.bp.clone(),
    )];
    if config.pack_type.has_resource_pack() {
        targets.push(MirrorTarget::new(
            "RP",
            layout.resource_source(&config.pack_name),
            paths.rp.clone(),
        ));
    }
    targets
}

/// Map a notify event kind to a mirror action
///
/// Existence is re-checked because several platforms report deletions as
/// renames or content changes.
pub fn classify(kind: &EventKind, path: &Path) -> Option<MirrorAction> {
    let exists_or_removed = || {
        if path.exists() {
            MirrorAction::Update
        } else {
            MirrorAction::Remove
        }
    };

    match kind {
        // A create for something already gone is a temp file; nothing to copy
        EventKind::Create(_) => path.exists().then_some(MirrorAction::Update),
        EventKind::Remove(_) => Some(MirrorAction::Remove),
        EventKind::Modify(modify_kind) => match modify_kind {
            ModifyKind::Name(_) | ModifyKind::Data(_) | ModifyKind::Any => {
                Some(exists_or_removed())
            }
            // Ignore metadata-only changes
            _ => None,
        },
        _ => None,
    }
}

/// A running mirror session
pub struct MirrorWatcher {
    watcher: RecommendedWatcher,
    stop: Arc<AtomicBool>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl MirrorWatcher {
    /// Wait for the mirror loop to fail
    ///
    /// The loop never finishes on its own unless a copy or delete fails, so in a
    /// watch session this resolves only with the fatal error.
    pub async fn wait(&mut self) -> anyhow::Result<()> {
        (&mut self.task).await.context("File watcher task panicked")?
    }

    /// Stop watching and wait for the loop to exit
    pub async fn stop(self) -> anyhow::Result<()> {
        self.stop.store(true, Ordering::Relaxed);
        drop(self.watcher);
        self.task.await.context("File watcher task panicked")?
    }
}

/// Start mirroring the given targets
pub fn start_mirror_watcher(targets: Vec<MirrorTarget>) -> anyhow::Result<MirrorWatcher> {
    let (tx, rx) = std::sync::mpsc::channel();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            let _ = tx.send(res);
        },
        Config::default().with_poll_interval(Duration::from_millis(500)),
    )
    .context("Failed to create file watcher")?;

    // Events arrive with canonical paths on some platforms
    let mut watched = Vec::with_capacity(targets.len());
    for target in targets {
        let source = target.source.canonicalize().with_context(|| {
            format!("Source directory does not exist: {}", target.source.display())
        })?;
        watcher
            .watch(&source, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", source.display()))?;
        tracing::info!("Mirroring {} -> {}", source.display(), target.dest.display());
        watched.push(MirrorTarget { source, ..target });
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let task = tokio::task::spawn_blocking(move || {
        while !stop_flag.load(Ordering::Relaxed) {
            let event = match rx.recv_timeout(Duration::from_secs(1)) {
                Ok(Ok(event)) => event,
                Ok(Err(e)) => {
                    tracing::warn!("File watcher error: {}", e);
                    continue;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!("File watcher channel closed");
                    break;
                }
            };

            for path in &event.paths {
                let Some(action) = classify(&event.kind, path) else {
                    continue;
                };
                let Some(target) = watched.iter().find(|t| path.starts_with(&t.source)) else {
                    continue;
                };
                target.apply(action, path).with_context(|| {
                    format!("Failed to mirror {:?} of {}", action, path.display())
                })?;
            }
        }

        Ok(())
    });

    Ok(MirrorWatcher {
        watcher,
        stop,
        task,
    })
}
