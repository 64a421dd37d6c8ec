//! Operator-facing status lines
//!
//! Each pipeline event prints one line with a colored prefix so a running
//! `watch` reads as a narrative. Colors are dropped when stdout is not a terminal.
//! The same events are also emitted through `tracing` at debug level.

use std::path::Path;
use std::time::Duration;

use owo_colors::{OwoColorize, Stream};

use crate::fs_utils::path_to_string;

fn line(prefix: &str, color: fn(&str) -> String, message: &str) {
    let tag = format!("[{}]", prefix);
    println!(
        "{} {}",
        tag.if_supports_color(Stream::Stdout, |t| color(t)),
        message
    );
}

fn blue(t: &str) -> String {
    t.bold().blue().to_string()
}

fn red(t: &str) -> String {
    t.bold().red().to_string()
}

fn yellow(t: &str) -> String {
    t.bold().yellow().to_string()
}

fn cyan(t: &str) -> String {
    t.bold().cyan().to_string()
}

/// A staging directory was wiped
pub fn clean(path: &Path) {
    tracing::debug!("clean {}", path.display());
    line("clean", yellow, &path_to_string(path));
}

/// A tree was copied into the staging area
pub fn copy(what: &str, dest: &Path) {
    tracing::debug!("copy {} -> {}", what, dest.display());
    line("copy", cyan, &format!("{} -> {}", what, path_to_string(dest)));
}

/// The mirror watcher replicated a change
pub fn update(label: &str, relative: &Path) {
    tracing::debug!("mirror update {}/{}", label, relative.display());
    line("update", blue, &format!("{}/{}", label, path_to_string(relative)));
}

/// The mirror watcher replicated a deletion
pub fn remove(label: &str, relative: &Path) {
    tracing::debug!("mirror remove {}/{}", label, relative.display());
    line("remove", red, &format!("{}/{}", label, path_to_string(relative)));
}

/// An archive was written
pub fn compressed(content: &Path, output: &Path) {
    tracing::debug!("compressed {} -> {}", content.display(), output.display());
    println!(
        "> Compressed: {} -> {}",
        path_to_string(content),
        path_to_string(output)
    );
}

/// A build finished without errors
pub fn built(elapsed: Duration) {
    let msg = format!("Built in {}ms", elapsed.as_millis());
    println!("{}", msg.if_supports_color(Stream::Stdout, |t| t.bold().green().to_string()));
}

/// A build reported errors
pub fn build_failed(errors: usize) {
    let msg = format!("Build failed. {} errors found.", errors);
    println!("{}", msg.if_supports_color(Stream::Stdout, |t| t.bold().red().to_string()));
}

/// Watch mode is up
pub fn watching() {
    let msg = "Watching for file changes...";
    println!("{}", msg.if_supports_color(Stream::Stdout, |t| t.bold().green().to_string()));
}
