//! Mirror storage management.
//!
//! This module provides the on-disk mirror entry: configuration and path
//! layout, plus clone/fetch/query operations against one bare mirror.

mod config;
mod mirror;

pub use config::{CACHE_VERSION, MirrorConfig, MirrorConfigBuilder};
pub use mirror::{CommitInfo, RemoteMirror};
