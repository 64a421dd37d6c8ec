//! MCBuild CLI
//!
//! Command-line interface for building, packaging and live-reloading
//! Minecraft Bedrock add-ons.

mod check_update;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use mcbuild_core::paths::needs_minecraft_dir;
use mcbuild_core::registry::DEFAULT_REGISTRY;
use mcbuild_core::{
    ensure_world_pack, override_world, resolve_pack_paths, status, sync_world, BuildCommand,
    BuildConfig, BuildOptions, CommandSink, ConfigLayer, Lang, Mode, NullSink, PackType,
    ProjectLayout, ServerLayer, SyncDirection,
};
use mcbuild_server::{
    mirror_targets, start_mirror_watcher, BuildCallbacks, Bundler, EsbuildBundler, Orchestrator,
    ReloadChannel,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mcbuild")]
#[command(about = "Build, package and live-reload Minecraft Bedrock add-ons")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: mcbuild.config.json, then mcbuild.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    overrides: ConfigArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Bundle scripts and stage packs once
    Build,

    /// Rebuild on change and reload the connected game
    Watch,

    /// Copy the world between the project and the game
    SyncWorld,

    /// Overwrite the game's copy of the world with the project's
    OverrideWorld,

    /// Look up the latest Script API releases
    CheckUpdate {
        /// npm registry to query
        #[arg(long, default_value = DEFAULT_REGISTRY)]
        registry: String,
    },
}

/// Flags that override configuration file values
#[derive(Args, Debug, Default)]
struct ConfigArgs {
    /// Pack folder name under behavior_packs/ and resource_packs/
    #[arg(long, global = true)]
    pack_name: Option<String>,

    #[arg(long, global = true, value_enum)]
    mode: Option<ModeArg>,

    /// What the project ships
    #[arg(long = "type", global = true, value_enum)]
    pack_type: Option<PackTypeArg>,

    /// Script language
    #[arg(long, global = true, value_enum)]
    lang: Option<LangArg>,

    /// Script entry point
    #[arg(long, global = true)]
    entry: Option<PathBuf>,

    /// Bundled script name under <bp>/scripts/
    #[arg(long, global = true)]
    out_file: Option<String>,

    /// Host shown in the /connect hint
    #[arg(long, global = true)]
    host: Option<String>,

    /// Reload channel port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Minecraft data directory (com.mojang)
    #[arg(long, global = true)]
    mcdir: Option<PathBuf>,

    /// Package release archives and stage the world
    #[arg(long, global = true)]
    release: bool,

    /// Value of the BUILD_ID define
    #[arg(long, global = true, env = "BUILD_ID")]
    build_id: Option<String>,

    /// esbuild executable
    #[arg(long, global = true)]
    esbuild: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Dev,
    Release,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PackTypeArg {
    Bp,
    Addon,
    World,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LangArg {
    Ts,
    Js,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Dev => Mode::Dev,
            ModeArg::Release => Mode::Release,
        }
    }
}

impl From<PackTypeArg> for PackType {
    fn from(arg: PackTypeArg) -> Self {
        match arg {
            PackTypeArg::Bp => PackType::Bp,
            PackTypeArg::Addon => PackType::Addon,
            PackTypeArg::World => PackType::World,
        }
    }
}

impl From<LangArg> for Lang {
    fn from(arg: LangArg) -> Self {
        match arg {
            LangArg::Ts => Lang::Ts,
            LangArg::Js => Lang::Js,
        }
    }
}

impl ConfigArgs {
    /// The command-line configuration layer
    fn into_layer(self) -> ConfigLayer {
        let server = (self.host.is_some() || self.port.is_some()).then(|| ServerLayer {
            host: self.host,
            port: self.port,
        });

        ConfigLayer {
            pack_name: self.pack_name,
            mode: self.mode.map(Into::into),
            pack_type: self.pack_type.map(Into::into),
            lang: self.lang.map(Into::into),
            entry: self.entry,
            out_file: self.out_file,
            server,
            mcdir: self.mcdir,
            // Absent flag leaves the file's value alone
            release: self.release.then_some(true),
            build_id: self.build_id,
            esbuild: self.esbuild,
            ..Default::default()
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "mcbuild={level},mcbuild_core={level},mcbuild_server={level}"
        ))
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let root = std::env::current_dir().context("Failed to get current directory")?;

    if let Commands::CheckUpdate { registry } = &cli.command {
        return check_update::cmd_check_update(&root, registry).await;
    }

    let config = BuildConfig::load(&root, cli.config.as_deref(), cli.overrides.into_layer())
        .context("Failed to load configuration")?;
    let layout = ProjectLayout::new(root);
    tracing::debug!("Configuration: {:?}", config);

    match cli.command {
        Commands::Build => cmd_build(config, layout).await,
        Commands::Watch => cmd_watch(config, layout).await,
        Commands::SyncWorld => cmd_sync_world(&config, &layout),
        Commands::OverrideWorld => cmd_override_world(&config, &layout),
        Commands::CheckUpdate { .. } => Ok(()),
    }
}

/// Bundle once; build errors are reported but do not fail the process
async fn cmd_build(config: BuildConfig, layout: ProjectLayout) -> Result<()> {
    let command = BuildCommand::Build;
    let paths = resolve_pack_paths(&config, command, &layout, None);
    let options = BuildOptions::from_config(&config, &layout, &paths);
    let bundler = EsbuildBundler::locate(&config, &layout);
    let callbacks = BuildCallbacks::from_config(&config, &layout);

    let orchestrator = Orchestrator::new(
        Arc::new(config),
        command,
        layout,
        paths,
        Arc::new(NullSink),
    )
    .with_callbacks(callbacks);

    let result = bundler.build(&options, Arc::new(orchestrator)).await?;
    tracing::debug!(
        "Build finished with {} errors, {} warnings",
        result.errors.len(),
        result.warnings.len()
    );

    Ok(())
}

/// Watch until interrupted
async fn cmd_watch(config: BuildConfig, layout: ProjectLayout) -> Result<()> {
    let command = BuildCommand::Watch;
    let mcdir = if needs_minecraft_dir(&config, command) {
        Some(config.minecraft_dir()?)
    } else {
        None
    };
    let paths = resolve_pack_paths(&config, command, &layout, mcdir.as_deref());

    let sink: Arc<dyn CommandSink> = if config.is_dev() {
        let channel = ReloadChannel::new();
        channel
            .start(&config.server)
            .await
            .context("Failed to start reload channel")?;
        Arc::new(channel)
    } else {
        Arc::new(NullSink)
    };

    let options = BuildOptions::from_config(&config, &layout, &paths);
    let targets = mirror_targets(&config, &layout, &paths);
    let bundler = EsbuildBundler::locate(&config, &layout);
    let callbacks = BuildCallbacks::from_config(&config, &layout);

    let orchestrator = Orchestrator::new(Arc::new(config), command, layout, paths, sink)
        .with_callbacks(callbacks);

    let mut build_task = bundler.watch(options, Arc::new(orchestrator)).await?;
    let mut mirror = start_mirror_watcher(targets)?;
    status::watching();

    enum Exit {
        Interrupted,
        Mirror(Result<()>),
        Bundler(Result<()>),
    }

    let exit = tokio::select! {
        _ = tokio::signal::ctrl_c() => Exit::Interrupted,
        res = mirror.wait() => Exit::Mirror(res),
        res = &mut build_task => Exit::Bundler(match res {
            Ok(res) => res,
            Err(e) => Err(anyhow::Error::new(e).context("Bundler task panicked")),
        }),
    };

    build_task.abort();
    match exit {
        Exit::Interrupted => {
            tracing::info!("Shutting down");
            mirror.stop().await
        }
        Exit::Mirror(res) => res,
        Exit::Bundler(res) => {
            mirror.stop().await?;
            res.context("Bundler stopped")
        }
    }
}

fn game_dir(config: &BuildConfig) -> Result<PathBuf> {
    config
        .minecraft_dir()
        .context("Failed to locate the Minecraft data directory")
}

fn cmd_sync_world(config: &BuildConfig, layout: &ProjectLayout) -> Result<()> {
    // Usage error before the game directory is even looked up
    ensure_world_pack(config)?;
    let mcdir = game_dir(config)?;
    let sync = sync_world(config, layout, &mcdir)?;

    let direction = match sync.direction {
        SyncDirection::LiveToLocal => "Pulled world from game",
        SyncDirection::LocalToLive => "Pushed world to game",
    };
    report_world_copy(direction, &sync.from, &sync.to);
    Ok(())
}

fn cmd_override_world(config: &BuildConfig, layout: &ProjectLayout) -> Result<()> {
    let mcdir = game_dir(config)?;
    let sync = override_world(config, layout, &mcdir)?;
    report_world_copy("Overrode game world", &sync.from, &sync.to);
    Ok(())
}

fn report_world_copy(what: &str, from: &Path, to: &Path) {
    println!("{}: {} -> {}", what, from.display(), to.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_parse_subcommands() {
        for (name, expected) in [
            ("build", "build"),
            ("watch", "watch"),
            ("sync-world", "sync-world"),
            ("override-world", "override-world"),
            ("check-update", "check-update"),
        ] {
            let cli = Cli::try_parse_from(["mcbuild", name]).unwrap();
            let parsed = match cli.command {
                Commands::Build => "build",
                Commands::Watch => "watch",
                Commands::SyncWorld => "sync-world",
                Commands::OverrideWorld => "override-world",
                Commands::CheckUpdate { .. } => "check-update",
            };
            assert_eq!(parsed, expected);
        }
    }

    #[test]
    fn test_unknown_subcommand_is_an_error() {
        let err = Cli::try_parse_from(["mcbuild", "deploy"]).err().unwrap();
        assert!(matches!(
            err.kind(),
            ErrorKind::InvalidSubcommand | ErrorKind::UnknownArgument
        ));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["mcbuild"]).is_err());
    }

    #[test]
    fn test_flags_become_config_layer() {
        let cli = Cli::try_parse_from([
            "mcbuild",
            "watch",
            "--pack-name",
            "demo",
            "--type",
            "addon",
            "--mode",
            "release",
            "--port",
            "2000",
            "--release",
            "--build-id",
            "42",
        ])
        .unwrap();

        let mut config = BuildConfig::default();
        config.apply(cli.overrides.into_layer());

        assert_eq!(config.pack_name, "demo");
        assert_eq!(config.pack_type, PackType::Addon);
        assert_eq!(config.mode, Mode::Release);
        assert_eq!(config.server.port, 2000);
        assert_eq!(config.server.host, "localhost");
        assert!(config.release);
        assert_eq!(config.build_id(), "42");
    }

    #[test]
    fn test_global_flags_before_subcommand() {
        let cli = Cli::try_parse_from(["mcbuild", "--lang", "js", "-v", "build"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Build));

        let mut config = BuildConfig::default();
        config.apply(cli.overrides.into_layer());
        assert_eq!(config.lang, Lang::Js);
        assert_eq!(config.entry, PathBuf::from("src/index.js"));
    }

    #[test]
    fn test_absent_release_flag_keeps_file_value() {
        let cli = Cli::try_parse_from(["mcbuild", "build"]).unwrap();
        let layer = cli.overrides.into_layer();
        assert!(layer.release.is_none());
        assert!(layer.server.is_none());
    }

    #[test]
    fn test_sync_world_rejects_bp_before_locating_game_dir() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp_dir.path());
        let config = BuildConfig {
            pack_type: PackType::Bp,
            mcdir: None,
            ..Default::default()
        };

        let err = cmd_sync_world(&config, &layout).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<mcbuild_core::WorldError>(),
            Some(mcbuild_core::WorldError::NotWorldPack(_))
        ));
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_check_update_registry() {
        let cli = Cli::try_parse_from(["mcbuild", "check-update"]).unwrap();
        match cli.command {
            Commands::CheckUpdate { registry } => assert_eq!(registry, DEFAULT_REGISTRY),
            _ => panic!("expected check-update"),
        }

        let cli =
            Cli::try_parse_from(["mcbuild", "check-update", "--registry", "http://localhost:4873"])
                .unwrap();
        match cli.command {
            Commands::CheckUpdate { registry } => assert_eq!(registry, "http://localhost:4873"),
            _ => panic!("expected check-update"),
        }
    }
}
