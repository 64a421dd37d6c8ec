//! `check-update`: compare pinned Script API packages with the latest stable betas

use std::path::Path;

use anyhow::{Context, Result};
use mcbuild_core::registry::{
    current_dependency, latest_stable_beta, upgrade_command, SCRIPT_API_PACKAGES,
};
use mcbuild_core::ApiRelease;
use owo_colors::{OwoColorize, Stream};

/// Registry document URL for a possibly scoped package
fn package_url(registry: &str, package: &str) -> String {
    format!(
        "{}/{}",
        registry.trim_end_matches('/'),
        package.replace('/', "%2f")
    )
}

/// The project's `package.json`, if there is one
fn read_package_json(root: &Path) -> Result<Option<serde_json::Value>> {
    let path = root.join("package.json");
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path).context("Failed to read package.json")?;
    let value = serde_json::from_str(&content).context("Failed to parse package.json")?;
    Ok(Some(value))
}

fn label(text: &str) -> String {
    text.if_supports_color(Stream::Stdout, |t| t.bold().green().to_string())
        .to_string()
}

/// Report block for one package
fn render_release(package: &str, release: &ApiRelease, current: Option<&str>) -> String {
    let heading = format!("Package: {}", package);
    format!(
        "{}\n{} {}\n{} {}\n{} {}\n{} {}\n",
        heading.if_supports_color(Stream::Stdout, |t| t.bold().magenta().to_string()),
        label("Dependency version:"),
        release.version,
        label("Minecraft version:"),
        release.minecraft_version,
        label("Manifest detail:"),
        release.manifest_version,
        "Current:".if_supports_color(Stream::Stdout, |t| t.bold().blue().to_string()),
        current.unwrap_or("not installed"),
    )
}

async fn fetch_metadata(
    client: &reqwest::Client,
    registry: &str,
    package: &str,
) -> Result<serde_json::Value> {
    let url = package_url(registry, package);
    tracing::debug!("GET {}", url);

    let metadata = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("Failed to reach registry for {}", package))?
        .error_for_status()
        .with_context(|| format!("Registry lookup failed for {}", package))?
        .json::<serde_json::Value>()
        .await
        .with_context(|| format!("Invalid registry response for {}", package))?;

    Ok(metadata)
}

pub async fn cmd_check_update(root: &Path, registry: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let package_json = read_package_json(root)?;

    let mut releases = Vec::with_capacity(SCRIPT_API_PACKAGES.len());
    for package in SCRIPT_API_PACKAGES {
        let metadata = fetch_metadata(&client, registry, package).await?;
        let release = latest_stable_beta(package, &metadata)?;
        let current = package_json
            .as_ref()
            .and_then(|p| current_dependency(p, package));

        println!("{}", render_release(package, &release, current));
        releases.push((package.to_string(), release));
    }

    let hint = format!("Run '{}' to update", upgrade_command(&releases));
    println!("{}", hint.if_supports_color(Stream::Stdout, |t| t.bold().to_string()));

    Ok(())
}
