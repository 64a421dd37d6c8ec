//! Bundler boundary
//!
//! The script bundler is an external engine. MCBuild hands it a declarative
//! [`BuildOptions`] and receives lifecycle events through [`BuildHooks`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::paths::{PackPaths, ProjectLayout};
use crate::types::BuildConfig;

/// Modules provided by the game at runtime
pub const GAME_MODULES: [&str; 3] = [
    "@minecraft/server",
    "@minecraft/server-ui",
    "@minecraft/server-editor",
];

/// Output module format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Esm,
    Cjs,
    Iife,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Esm => "esm",
            OutputFormat::Cjs => "cjs",
            OutputFormat::Iife => "iife",
        }
    }
}

/// Declarative bundler input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub entry: PathBuf,
    pub external: Vec<String>,
    pub format: OutputFormat,
    /// Compile-time constants; values are JS expressions
    pub define: BTreeMap<String, String>,
    pub sourcemap: bool,
    pub minify: bool,
    pub bundle: bool,
    pub outfile: PathBuf,
    pub target: Option<String>,
    pub extra_args: Vec<String>,
}

impl BuildOptions {
    /// Derive bundler options from the merged configuration
    pub fn from_config(config: &BuildConfig, layout: &ProjectLayout, paths: &PackPaths) -> Self {
        let dev = config.is_dev();
        let overrides = &config.bundler;

        let mut external: Vec<String> = GAME_MODULES.iter().map(|s| s.to_string()).collect();
        for module in &overrides.external {
            if !external.contains(module) {
                external.push(module.clone());
            }
        }

        let mut define = BTreeMap::new();
        define.insert("isDevMode".to_string(), dev.to_string());
        define.insert("BUILD_ID".to_string(), format!("\"{}\"", config.build_id()));
        define.extend(overrides.define.clone());

        Self {
            entry: layout.resolve(&config.entry),
            external,
            format: OutputFormat::Esm,
            define,
            sourcemap: overrides.sourcemap.unwrap_or(dev),
            minify: overrides.minify.unwrap_or(!dev),
            bundle: true,
            outfile: script_outfile(&paths.bp, &config.out_file),
            target: overrides.target.clone(),
            extra_args: overrides.extra_args.clone(),
        }
    }
}

/// `<bp>/scripts/<out_file>`, adding `.js` when the name has no extension
pub fn script_outfile(bp: &Path, out_file: &str) -> PathBuf {
    let file = if Path::new(out_file).extension().is_some() {
        out_file.to_string()
    } else {
        format!("{}.js", out_file)
    };
    bp.join("scripts").join(file)
}

/// One diagnostic reported by the bundler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildMessage {
    pub text: String,
}

impl BuildMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Outcome of one build attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildResult {
    pub errors: Vec<BuildMessage>,
    pub warnings: Vec<BuildMessage>,
}

impl BuildResult {
    pub fn success() -> Self {
        Self::default()
    }

    /// A result with a single error
    pub fn failed(text: impl Into<String>) -> Self {
        Self {
            errors: vec![BuildMessage::new(text)],
            warnings: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Lifecycle callbacks a bundler invokes around each build attempt
///
/// `on_start` runs before the engine touches any output. If it fails the engine
/// skips bundling and reports the failure as a build error to `on_end`, which is
/// called exactly once per attempt.
pub trait BuildHooks: Send + Sync {
    fn on_start(&self) -> anyhow::Result<()>;
    fn on_end(&self, result: &BuildResult);
}
