//! Quarry Core - Domain types
//!
//! This crate provides the foundational types for the Quarry git mirror
//! cache: the remote URL model and its protocol classification.

pub mod url;

pub use url::{Protocol, RemoteUrl};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
