//! Configuration types
//!
//! The merged build configuration and the layers it is assembled from.

mod config;

pub use config::*;
