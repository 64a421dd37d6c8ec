//! MCBuild project configuration
//!
//! Defines the `mcbuild.config.json` / `mcbuild.toml` format and the layered merge
//! (built-in defaults, then the project file, then command-line flags).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Config file names searched in the project root, in order
pub const CONFIG_FILE_NAMES: [&str; 2] = ["mcbuild.config.json", "mcbuild.toml"];

/// Default port of the reload channel
pub const DEFAULT_PORT: u16 = 1145;

/// Build mode
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Source maps, no minification, live reload
    #[default]
    Dev,

    /// Minified output
    Release,
}

/// What the project ships
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PackType {
    /// Behavior pack only
    #[default]
    Bp,

    /// Behavior pack plus resource pack
    Addon,

    /// Behavior and resource packs shipped inside a world
    World,
}

impl PackType {
    /// Whether this pack type carries a resource pack
    pub fn has_resource_pack(self) -> bool {
        matches!(self, PackType::Addon | PackType::World)
    }
}

/// Script source language
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Ts,
    Js,
}

impl Lang {
    fn default_entry(self) -> PathBuf {
        match self {
            Lang::Ts => PathBuf::from("src/index.ts"),
            Lang::Js => PathBuf::from("src/index.js"),
        }
    }
}

/// Reload channel address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerOptions {
    /// Host shown in the `/connect` hint (the listener always binds every interface)
    pub host: String,
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Extra bundler settings (`esbuildOptions` in the config file)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BundlerOverrides {
    /// Additional external module names
    #[serde(default)]
    pub external: Vec<String>,

    /// Additional compile-time constants
    #[serde(default)]
    pub define: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcemap: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,

    /// Language target, e.g. `es2020`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Raw arguments appended to the bundler command line
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// The effective build configuration
///
/// Produced once by [`BuildConfig::load`] and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub pack_name: String,
    pub mode: Mode,
    pub pack_type: PackType,
    pub lang: Lang,
    /// Script entry point, relative to the project root unless absolute
    pub entry: PathBuf,
    /// Bundled script file name under `<bp>/scripts/`
    pub out_file: String,
    pub bundler: BundlerOverrides,
    pub server: ServerOptions,
    /// Explicit game data directory (`com.mojang`)
    pub mcdir: Option<PathBuf>,
    /// Explicit release flag (packaging and world staging)
    pub release: bool,
    pub build_id: Option<String>,
    /// Explicit esbuild executable
    pub esbuild: Option<PathBuf>,
    /// Shell command run before each build
    pub before_build: Option<String>,
    /// Shell command run after each successful build
    pub after_build: Option<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            pack_name: "unknown".to_string(),
            mode: Mode::default(),
            pack_type: PackType::default(),
            lang: Lang::default(),
            entry: Lang::default().default_entry(),
            out_file: "main.js".to_string(),
            bundler: BundlerOverrides::default(),
            server: ServerOptions::default(),
            mcdir: None,
            release: false,
            build_id: None,
            esbuild: None,
            before_build: None,
            after_build: None,
        }
    }
}

/// One configuration layer: every field is optional so layers can be stacked.
///
/// This is both the on-disk file format and the shape command-line flags are collected into.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigLayer {
    pub pack_name: Option<String>,
    pub mode: Option<Mode>,
    #[serde(rename = "type")]
    pub pack_type: Option<PackType>,
    pub lang: Option<Lang>,
    pub entry: Option<PathBuf>,
    pub out_file: Option<String>,
    pub esbuild_options: Option<BundlerOverrides>,
    pub server: Option<ServerLayer>,
    pub mcdir: Option<PathBuf>,
    pub release: Option<bool>,
    pub build_id: Option<String>,
    pub esbuild: Option<PathBuf>,
    pub before_build: Option<String>,
    pub after_build: Option<String>,
}

/// Partial server settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerLayer {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON config: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse TOML config: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Unsupported config file extension: {0}")]
    UnsupportedFormat(String),

    #[error("Could not determine the Minecraft data directory; pass --mcdir")]
    NoGameDirectory,
}

impl ConfigLayer {
    /// Parse a config file, picking the format from its extension
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Find the project config file in a directory
pub fn find_config_file(root: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| root.join(name))
        .find(|c| c.exists())
}

impl BuildConfig {
    /// Merge defaults, the project config file and command-line flags
    ///
    /// `explicit_file` must exist when given; otherwise the project root is searched
    /// for a config file and a missing file just means "defaults only".
    pub fn load(
        root: &Path,
        explicit_file: Option<&Path>,
        flags: ConfigLayer,
    ) -> Result<Self, ConfigError> {
        let mut config = BuildConfig::default();

        let file = match explicit_file {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    root.join(path)
                };
                Some(path)
            }
            None => find_config_file(root),
        };
        if let Some(path) = file {
            tracing::debug!("Loading config from {}", path.display());
            config.apply(ConfigLayer::from_file(&path)?);
        }

        config.apply(flags);
        Ok(config)
    }

    /// Overlay a layer on top of this configuration
    pub fn apply(&mut self, layer: ConfigLayer) {
        let entry_was_set = layer.entry.is_some();

        if let Some(v) = layer.pack_name {
            self.pack_name = v;
        }
        if let Some(v) = layer.mode {
            self.mode = v;
        }
        if let Some(v) = layer.pack_type {
            self.pack_type = v;
        }
        if let Some(v) = layer.lang {
            // Entry follows the language unless someone chose it explicitly
            if !entry_was_set && self.entry == self.lang.default_entry() {
                self.entry = v.default_entry();
            }
            self.lang = v;
        }
        if let Some(v) = layer.entry {
            self.entry = v;
        }
        if let Some(v) = layer.out_file {
            self.out_file = v;
        }
        if let Some(v) = layer.esbuild_options {
            self.bundler = v;
        }
        if let Some(server) = layer.server {
            if let Some(host) = server.host {
                self.server.host = host;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }
        if let Some(v) = layer.mcdir {
            self.mcdir = Some(v);
        }
        if let Some(v) = layer.release {
            self.release = v;
        }
        if let Some(v) = layer.build_id {
            self.build_id = Some(v);
        }
        if let Some(v) = layer.esbuild {
            self.esbuild = Some(v);
        }
        if let Some(v) = layer.before_build {
            self.before_build = Some(v);
        }
        if let Some(v) = layer.after_build {
            self.after_build = Some(v);
        }
    }

    /// Whether release packaging and world staging are active
    pub fn is_release(&self) -> bool {
        self.release || self.mode == Mode::Release
    }

    pub fn is_dev(&self) -> bool {
        self.mode == Mode::Dev
    }

    /// Value of the `BUILD_ID` define
    pub fn build_id(&self) -> &str {
        self.build_id.as_deref().unwrap_or("DEV")
    }

    /// Game data directory: the explicit `mcdir`, or the platform default
    pub fn minecraft_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.mcdir {
            Some(dir) => Ok(dir.clone()),
            None => crate::paths::default_minecraft_dir().ok_or(ConfigError::NoGameDirectory),
        }
    }
}
