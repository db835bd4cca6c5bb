//! # Quarry Git Mirror Cache
//!
//! Local, deduplicated cache of remote git repositories used as build
//! inputs. Given a remote URL and a branch, the cache guarantees a single
//! bare local mirror exists, keeps it reasonably fresh, and resolves
//! branch/commit state against that mirror.
//!
//! ## Features
//!
//! - Process-scoped [`MirrorRegistry`] deduplicating mirrors across
//!   fetch-equivalent requests
//! - Cross-process clone/fetch serialization via named file locks
//! - ssh-agent credentials resolved from the remote URL
//! - Typed error taxonomy covering transport, branch and commit failures
//!
//! ## Example
//!
//! ```ignore
//! use quarry_git::{MirrorConfig, MirrorRegistry};
//!
//! let config = MirrorConfig::builder()
//!     .cache_root("/var/cache/quarry")
//!     .build()?;
//!
//! let registry = MirrorRegistry::new(config);
//! let mirror = registry
//!     .get_or_create("app", "https://example.com/app.git", "main", false)
//!     .await?;
//!
//! let head = mirror.latest_commit("main").await?;
//! ```

pub mod credentials;
pub mod error;
pub mod lock;
pub mod registry;
pub mod repository;

// Re-exports
pub use credentials::CredentialSpec;
pub use error::MirrorError;
pub use lock::NamedLock;
pub use registry::{MirrorRegistry, RegistryKey};
pub use repository::{CACHE_VERSION, CommitInfo, MirrorConfig, MirrorConfigBuilder, RemoteMirror};

// Re-export quarry_core for consumers
pub use quarry_core;
