//! Script API release lookup
//!
//! `@minecraft/server` publishes versions like `1.8.0-beta.1.20.50-stable`:
//! the API version, a `-beta` marker, then the game version the build targets.

use regex::Regex;
use std::sync::OnceLock;

/// Packages checked by `check-update`
pub const SCRIPT_API_PACKAGES: [&str; 2] = ["@minecraft/server", "@minecraft/server-ui"];

/// Default npm registry
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

fn stable_beta_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<detail>.*-beta)\.(?P<game>.+)-stable$").expect("static regex is valid")
    })
}

/// A stable-channel beta release of a Script API package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRelease {
    /// Full npm version, e.g. `1.8.0-beta.1.20.50-stable`
    pub version: String,
    /// Game version the release targets, e.g. `1.20.50`
    pub minecraft_version: String,
    /// Version string used in `manifest.json` dependencies, e.g. `1.8.0-beta`
    pub manifest_version: String,
}

impl ApiRelease {
    /// Parse a version tag; `None` for anything that is not a stable beta
    pub fn parse(version: &str) -> Option<Self> {
        let caps = stable_beta_regex().captures(version)?;
        Some(Self {
            version: version.to_string(),
            minecraft_version: caps["game"].to_string(),
            manifest_version: caps["detail"].to_string(),
        })
    }
}

/// Errors from registry lookups
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Registry response for {0} has no versions")]
    MissingVersions(String),

    #[error("No stable beta release found for {0}")]
    NoStableBeta(String),
}

/// Pick the last published stable beta from registry metadata
///
/// `metadata` is the package document (`GET <registry>/<package>`); its `versions`
/// object is in publish order.
pub fn latest_stable_beta(
    package: &str,
    metadata: &serde_json::Value,
) -> Result<ApiRelease, RegistryError> {
    let versions = metadata
        .get("versions")
        .and_then(|v| v.as_object())
        .ok_or_else(|| RegistryError::MissingVersions(package.to_string()))?;

    versions
        .keys()
        .filter_map(|v| ApiRelease::parse(v))
        .last()
        .ok_or_else(|| RegistryError::NoStableBeta(package.to_string()))
}

/// The version range a project's `package.json` currently pins for a package
pub fn current_dependency<'a>(package_json: &'a serde_json::Value, package: &str) -> Option<&'a str> {
    ["dependencies", "devDependencies"]
        .iter()
        .find_map(|section| package_json.get(section)?.get(package)?.as_str())
}

/// `npm i` command installing the given releases
pub fn upgrade_command(releases: &[(String, ApiRelease)]) -> String {
    let specs: Vec<String> = releases
        .iter()
        .map(|(package, release)| format!("{}@{}", package, release.version))
        .collect();
    format!("npm i {} --force", specs.join(" "))
}
