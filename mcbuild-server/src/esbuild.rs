//! esbuild driver
//!
//! Runs the `esbuild` executable once per build attempt and turns its
//! diagnostics into a [`BuildResult`]. Watch mode uses notify on the entry
//! point's directory instead of esbuild's own watcher so that every rebuild
//! goes through the lifecycle hooks.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use mcbuild_core::{BuildConfig, BuildHooks, BuildMessage, BuildOptions, BuildResult, ProjectLayout};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bundler::Bundler;

/// Quiet period after a source change before rebuilding
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

#[cfg(windows)]
const LOCAL_EXECUTABLE: &str = "esbuild.cmd";
#[cfg(not(windows))]
const LOCAL_EXECUTABLE: &str = "esbuild";

/// [`Bundler`] backed by the esbuild command-line tool
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    executable: PathBuf,
    cwd: PathBuf,
    debounce: Duration,
    /// Paths whose changes never trigger a rebuild
    ignored: Vec<PathBuf>,
}

impl EsbuildBundler {
    pub fn new(executable: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            cwd: cwd.into(),
            debounce: DEFAULT_DEBOUNCE,
            ignored: Vec::new(),
        }
    }

    /// Pick the executable for a project
    ///
    /// An explicit `esbuild` setting wins, then the project's
    /// `node_modules/.bin/esbuild`, then whatever `esbuild` is on `PATH`.
    /// Build output, archives, dependencies and the pack sources (handled by the
    /// mirror watcher) are ignored in watch mode.
    pub fn locate(config: &BuildConfig, layout: &ProjectLayout) -> Self {
        let executable = match &config.esbuild {
            Some(path) => layout.resolve(path),
            None => {
                let local = layout.root.join("node_modules").join(".bin").join(LOCAL_EXECUTABLE);
                if local.is_file() {
                    local
                } else {
                    PathBuf::from("esbuild")
                }
            }
        };
        tracing::debug!("Using esbuild at {}", executable.display());

        Self::new(executable, layout.root.clone())
            .ignore(layout.build_dir())
            .ignore(layout.dist_dir())
            .ignore(layout.root.join("node_modules"))
            .ignore(layout.root.join("behavior_packs"))
            .ignore(layout.root.join("resource_packs"))
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Never rebuild for changes under `path`
    pub fn ignore(mut self, path: impl Into<PathBuf>) -> Self {
        self.ignored.push(path.into());
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Translate build options into esbuild arguments
    pub fn command_args(options: &BuildOptions) -> Vec<String> {
        let mut args = vec![options.entry.to_string_lossy().to_string()];

        if options.bundle {
            args.push("--bundle".to_string());
        }
        args.push(format!("--format={}", options.format.as_str()));
        args.push(format!("--outfile={}", options.outfile.to_string_lossy()));
        for module in &options.external {
            args.push(format!("--external:{}", module));
        }
        for (key, value) in &options.define {
            args.push(format!("--define:{}={}", key, value));
        }
        if options.sourcemap {
            args.push("--sourcemap".to_string());
        }
        if options.minify {
            args.push("--minify".to_string());
        }
        if let Some(target) = &options.target {
            args.push(format!("--target={}", target));
        }
        // Diagnostics are parsed from stderr; the build summary is noise
        args.push("--log-level=warning".to_string());
        args.extend(options.extra_args.iter().cloned());

        args
    }

    async fn run_engine(&self, options: &BuildOptions) -> anyhow::Result<BuildResult> {
        let output = tokio::process::Command::new(&self.executable)
            .args(Self::command_args(options))
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let result = parse_diagnostics(&stderr, output.status.success());
        for warning in &result.warnings {
            tracing::warn!("{}", warning.text);
        }
        Ok(result)
    }

    /// One attempt: start hook, engine, end hook
    async fn run_cycle(
        &self,
        options: &BuildOptions,
        hooks: Arc<dyn BuildHooks>,
    ) -> anyhow::Result<BuildResult> {
        let start_hooks = hooks.clone();
        let started = tokio::task::spawn_blocking(move || start_hooks.on_start())
            .await
            .context("Build start hook panicked")?;

        let result = match started {
            Ok(()) => match self.run_engine(options).await {
                Ok(result) => result,
                Err(e) => BuildResult::failed(format!("{:#}", e)),
            },
            Err(e) => BuildResult::failed(format!("{:#}", e)),
        };

        let end_result = result.clone();
        tokio::task::spawn_blocking(move || hooks.on_end(&end_result))
            .await
            .context("Build end hook panicked")?;

        Ok(result)
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignored.iter().any(|ignored| path.starts_with(ignored))
    }

    /// Whether a filesystem event should trigger a rebuild
    fn triggers_rebuild(&self, event: &Event) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return false;
        }
        event.paths.iter().any(|path| !self.is_ignored(path))
    }
}

#[async_trait]
impl Bundler for EsbuildBundler {
    async fn build(
        &self,
        options: &BuildOptions,
        hooks: Arc<dyn BuildHooks>,
    ) -> anyhow::Result<BuildResult> {
        self.run_cycle(options, hooks).await
    }

    async fn watch(
        &self,
        options: BuildOptions,
        hooks: Arc<dyn BuildHooks>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        let source_dir = options
            .entry
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.cwd.clone());
        let source_dir = source_dir
            .canonicalize()
            .with_context(|| format!("Script directory not found: {}", source_dir.display()))?;

        let mut bundler = self.clone();
        if let Some(outdir) = options.outfile.parent() {
            bundler = bundler.ignore(outdir);
        }
        // notify reports canonical paths once the root is canonical
        let canonical: Vec<PathBuf> = bundler
            .ignored
            .iter()
            .filter_map(|p| p.canonicalize().ok())
            .collect();
        bundler.ignored.extend(canonical);

        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let filter = bundler.clone();
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if filter.triggers_rebuild(&event) {
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!("Script watch error: {:?}", e),
            })?;
        watcher.watch(&source_dir, RecursiveMode::Recursive)?;
        tracing::info!("Watching scripts in {}", source_dir.display());

        Ok(tokio::spawn(async move {
            // Dropping the watcher ends the event stream
            let _watcher = watcher;

            bundler.run_cycle(&options, hooks.clone()).await?;
            while rx.recv().await.is_some() {
                tokio::time::sleep(bundler.debounce).await;
                while rx.try_recv().is_ok() {}
                bundler.run_cycle(&options, hooks.clone()).await?;
            }
            Ok(())
        }))
    }
}

/// Collect `[ERROR]` and `[WARNING]` diagnostics from esbuild's stderr
///
/// The first location line under a diagnostic is appended to its message. A failed
/// run with no recognizable diagnostic still counts as one error.
pub fn parse_diagnostics(stderr: &str, exit_success: bool) -> BuildResult {
    let mut result = BuildResult::default();
    let mut lines = stderr.lines().peekable();

    while let Some(line) = lines.next() {
        let (is_error, text) = if let Some((_, text)) = line.split_once("[ERROR]") {
            (true, text.trim())
        } else if let Some((_, text)) = line.split_once("[WARNING]") {
            (false, text.trim())
        } else {
            continue;
        };

        let mut message = text.to_string();
        while let Some(next) = lines.peek() {
            let next = next.trim();
            if next.is_empty() {
                lines.next();
                continue;
            }
            if let Some(location) = next.strip_suffix(':') {
                message = format!("{} ({})", message, location);
                lines.next();
            }
            break;
        }

        if is_error {
            result.errors.push(BuildMessage::new(message));
        } else {
            result.warnings.push(BuildMessage::new(message));
        }
    }

    if !exit_success && result.errors.is_empty() {
        let detail = stderr.trim();
        result.errors.push(BuildMessage::new(if detail.is_empty() {
            "esbuild exited with an error".to_string()
        } else {
            detail.to_string()
        }));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcbuild_core::{resolve_pack_paths, BuildCommand, Mode};
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const ESBUILD_STDERR: &str = r#"▲ [WARNING] Comparison with -0 using the "===" operator will also match 0 [equals-negative-zero]

    src/index.ts:3:8:
      3 │ if (x === -0) {}
        ╵         ~~

✘ [ERROR] Could not resolve "./missing"

    src/index.ts:1:7:
      1 │ import "./missing";
        ╵        ~~~~~~~~~~~

✘ [ERROR] Expected ";" but found "world"

    src/util.ts:4:12:
      4 │ let hello world;
        ╵             ~~~~~

2 errors
"#;

    #[derive(Default)]
    struct RecordingHooks {
        events: Mutex<Vec<String>>,
        fail_start: bool,
    }

    impl RecordingHooks {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl BuildHooks for RecordingHooks {
        fn on_start(&self) -> anyhow::Result<()> {
            self.events.lock().unwrap().push("start".to_string());
            if self.fail_start {
                anyhow::bail!("staging failed");
            }
            Ok(())
        }

        fn on_end(&self, result: &BuildResult) {
            self.events
                .lock()
                .unwrap()
                .push(format!("end:{}", result.errors.len()));
        }
    }

    fn demo_options(mode: Mode) -> BuildOptions {
        let config = BuildConfig {
            pack_name: "demo".to_string(),
            mode,
            ..Default::default()
        };
        let layout = ProjectLayout::new("/project");
        let paths = resolve_pack_paths(&config, BuildCommand::Build, &layout, None);
        BuildOptions::from_config(&config, &layout, &paths)
    }

    #[test]
    fn test_command_args_dev() {
        let args = EsbuildBundler::command_args(&demo_options(Mode::Dev));

        assert_eq!(args[0], "/project/src/index.ts");
        assert!(args.contains(&"--bundle".to_string()));
        assert!(args.contains(&"--format=esm".to_string()));
        assert!(args.contains(&"--outfile=/project/build/bp/demo/scripts/main.js".to_string()));
        assert!(args.contains(&"--external:@minecraft/server".to_string()));
        assert!(args.contains(&"--external:@minecraft/server-ui".to_string()));
        assert!(args.contains(&"--define:isDevMode=true".to_string()));
        assert!(args.contains(&"--define:BUILD_ID=\"DEV\"".to_string()));
        assert!(args.contains(&"--sourcemap".to_string()));
        assert!(!args.contains(&"--minify".to_string()));
    }

    #[test]
    fn test_command_args_release_with_extras() {
        let mut options = demo_options(Mode::Release);
        options.target = Some("es2020".to_string());
        options.extra_args = vec!["--charset=utf8".to_string()];
        let args = EsbuildBundler::command_args(&options);

        assert!(args.contains(&"--minify".to_string()));
        assert!(!args.contains(&"--sourcemap".to_string()));
        assert!(args.contains(&"--define:isDevMode=false".to_string()));
        assert!(args.contains(&"--target=es2020".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--charset=utf8"));
    }

    #[test]
    fn test_parse_diagnostics() {
        let result = parse_diagnostics(ESBUILD_STDERR, false);

        assert_eq!(result.errors.len(), 2);
        assert_eq!(
            result.errors[0].text,
            "Could not resolve \"./missing\" (src/index.ts:1:7)"
        );
        assert_eq!(
            result.errors[1].text,
            "Expected \";\" but found \"world\" (src/util.ts:4:12)"
        );
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].text.ends_with("(src/index.ts:3:8)"));
    }

    #[test]
    fn test_parse_diagnostics_clean_run() {
        assert!(parse_diagnostics("", true).is_success());
    }

    #[test]
    fn test_parse_diagnostics_unrecognized_failure() {
        let result = parse_diagnostics("node: not found\n", false);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].text, "node: not found");

        let result = parse_diagnostics("", false);
        assert_eq!(result.errors[0].text, "esbuild exited with an error");
    }

    #[test]
    fn test_locate_prefers_explicit_then_local() {
        let temp_dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp_dir.path());
        let config = BuildConfig::default();

        let bundler = EsbuildBundler::locate(&config, &layout);
        assert_eq!(bundler.executable(), Path::new("esbuild"));

        let bin = temp_dir.path().join("node_modules/.bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join(LOCAL_EXECUTABLE), "").unwrap();
        let bundler = EsbuildBundler::locate(&config, &layout);
        assert_eq!(bundler.executable(), bin.join(LOCAL_EXECUTABLE));

        let config = BuildConfig {
            esbuild: Some(PathBuf::from("tools/esbuild")),
            ..Default::default()
        };
        let bundler = EsbuildBundler::locate(&config, &layout);
        assert_eq!(bundler.executable(), temp_dir.path().join("tools/esbuild"));
    }

    #[test]
    fn test_ignores_output_and_access_events() {
        let bundler = EsbuildBundler::new("esbuild", "/project").ignore("/project/build");

        let change = Event::new(EventKind::Modify(notify::event::ModifyKind::Any))
            .add_path(PathBuf::from("/project/src/index.ts"));
        assert!(bundler.triggers_rebuild(&change));

        let output = Event::new(EventKind::Create(notify::event::CreateKind::File))
            .add_path(PathBuf::from("/project/build/bp/demo/scripts/main.js"));
        assert!(!bundler.triggers_rebuild(&output));

        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/project/src/index.ts"));
        assert!(!bundler.triggers_rebuild(&access));
    }

    #[test]
    fn test_pack_sources_do_not_trigger_rebuild() {
        let layout = ProjectLayout::new("/project");
        let bundler = EsbuildBundler::locate(&BuildConfig::default(), &layout);

        let modify = |path: &str| {
            Event::new(EventKind::Modify(notify::event::ModifyKind::Any))
                .add_path(PathBuf::from(path))
        };

        assert!(bundler.triggers_rebuild(&modify("/project/index.ts")));
        assert!(!bundler.triggers_rebuild(&modify(
            "/project/behavior_packs/demo/items/sword.json"
        )));
        assert!(!bundler.triggers_rebuild(&modify(
            "/project/resource_packs/demo/textures/sword.png"
        )));
        assert!(!bundler.triggers_rebuild(&modify("/project/build/bp/demo/scripts/main.js")));
        assert!(!bundler.triggers_rebuild(&modify("/project/node_modules/esbuild/package.json")));
    }

    #[tokio::test]
    async fn test_missing_executable_reports_failed_build() {
        let temp_dir = TempDir::new().unwrap();
        let bundler = EsbuildBundler::new(temp_dir.path().join("no-such-esbuild"), temp_dir.path());
        let hooks = Arc::new(RecordingHooks::default());

        let result = bundler
            .build(&demo_options(Mode::Dev), hooks.clone())
            .await
            .unwrap();

        assert!(!result.is_success());
        assert_eq!(hooks.events(), vec!["start", "end:1"]);
    }

    #[tokio::test]
    async fn test_failed_start_skips_engine() {
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join("ran");
        // Would create the marker if the engine ran
        let bundler = EsbuildBundler::new("touch", temp_dir.path());
        let mut options = demo_options(Mode::Dev);
        options.entry = marker.clone();
        let hooks = Arc::new(RecordingHooks {
            fail_start: true,
            ..Default::default()
        });

        let result = bundler.build(&options, hooks.clone()).await.unwrap();

        assert_eq!(result.errors[0].text, "staging failed");
        assert_eq!(hooks.events(), vec!["start", "end:1"]);
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_diagnostics_reach_hooks() {
        let temp_dir = TempDir::new().unwrap();
        // `sh <entry> <args...>` stands in for esbuild
        let script = temp_dir.path().join("fake-esbuild.sh");
        fs::write(
            &script,
            "echo '✘ [ERROR] Could not resolve \"./missing\"' >&2\nexit 1\n",
        )
        .unwrap();
        let bundler = EsbuildBundler::new("sh", temp_dir.path());
        let mut options = demo_options(Mode::Dev);
        options.entry = script;
        let hooks = Arc::new(RecordingHooks::default());

        let result = bundler.build(&options, hooks.clone()).await.unwrap();

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].text, "Could not resolve \"./missing\"");
        assert_eq!(hooks.events(), vec!["start", "end:1"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_watch_rebuilds_on_change() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        let script = src.join("index.sh");
        fs::write(&script, "exit 0\n").unwrap();

        let bundler = EsbuildBundler::new("sh", temp_dir.path())
            .with_debounce(Duration::from_millis(20));
        let mut options = demo_options(Mode::Dev);
        options.entry = script.clone();
        options.outfile = temp_dir.path().join("out/main.js");
        let hooks = Arc::new(RecordingHooks::default());

        let task = bundler.watch(options, hooks.clone()).await.unwrap();

        let wait_for = |count: usize| {
            let hooks = hooks.clone();
            async move {
                for _ in 0..100 {
                    if hooks.events().len() >= count {
                        return true;
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                false
            }
        };

        assert!(wait_for(2).await, "initial build did not run");
        fs::write(src.join("util.sh"), "true\n").unwrap();
        assert!(wait_for(4).await, "change did not trigger a rebuild");
        assert_eq!(&hooks.events()[..4], ["start", "end:0", "start", "end:0"]);

        task.abort();
    }
}
