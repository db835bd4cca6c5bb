//! Process-scoped mirror registry.
//!
//! The registry is the single entry point for build processes that need a
//! remote repository: it maps (url, branch, fetch-policy) requests onto
//! shared [`RemoteMirror`] entries, deduplicating clones across
//! fetch-equivalent requests and serializing concurrent requests for the
//! same repository.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use quarry_core::RemoteUrl;

use crate::error::MirrorError;
use crate::repository::{CACHE_VERSION, MirrorConfig, RemoteMirror};

/// Identifies one requested repository/branch/fetch-policy combination.
///
/// Two keys differing only in `ignore_fetch` are *fetch-equivalent*: they
/// may legitimately share one underlying mirror.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    url: String,
    branch: String,
    ignore_fetch: bool,
}

impl RegistryKey {
    /// Creates a new registry key.
    pub fn new(url: impl Into<String>, branch: impl Into<String>, ignore_fetch: bool) -> Self {
        Self {
            url: url.into(),
            branch: branch.into(),
            ignore_fetch,
        }
    }

    /// Returns the fetch-equivalent key differing only in fetch policy.
    pub fn inverse(&self) -> Self {
        Self {
            url: self.url.clone(),
            branch: self.branch.clone(),
            ignore_fetch: !self.ignore_fetch,
        }
    }

    /// Returns the remote URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the branch.
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Returns whether the request skips fetching.
    pub fn ignore_fetch(&self) -> bool {
        self.ignore_fetch
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.url, self.branch)?;
        if self.ignore_fetch {
            write!(f, " (no-fetch)")?;
        }
        Ok(())
    }
}

type Gate = Arc<tokio::sync::Mutex<()>>;

/// Process-wide registry of remote mirrors.
///
/// Created empty, grows monotonically, never evicts; its lifetime is the
/// process. Share it behind an `Arc` across tasks.
pub struct MirrorRegistry {
    config: Arc<MirrorConfig>,
    entries: Mutex<HashMap<RegistryKey, Arc<RemoteMirror>>>,
    /// One async gate per (url, branch): fetch-equivalent requests are
    /// serialized, distinct repositories proceed independently.
    gates: Mutex<HashMap<(String, String), Gate>>,
}

impl MirrorRegistry {
    /// Creates a new, empty registry.
    pub fn new(config: MirrorConfig) -> Self {
        Self {
            config: Arc::new(config),
            entries: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the registry configuration.
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Returns the cached mirror for the request, creating it as needed.
    ///
    /// The lookup runs in two steps: an exact key hit is returned
    /// unchanged (no fetch is re-triggered); otherwise an entry stored
    /// under the fetch-equivalent key is adopted for this key too, so one
    /// caller wanting a fresh mirror and another tolerating a stale one
    /// still share a single clone. Only when both lookups miss is a new
    /// mirror constructed (cloning if its path is absent on disk).
    ///
    /// Unless `ignore_fetch` is set, adoption and construction are
    /// followed by a fetch of `branch`; the request's own flag governs
    /// that fetch, not the policy the entry was first created under. A
    /// clone or fetch failure propagates to the caller and registers
    /// nothing under the requested key.
    pub async fn get_or_create(
        &self,
        name: &str,
        url: &str,
        branch: &str,
        ignore_fetch: bool,
    ) -> Result<Arc<RemoteMirror>, MirrorError> {
        let key = RegistryKey::new(url, branch, ignore_fetch);

        let gate = self.gate(&key);
        let _serialized = gate.lock().await;

        if let Some(existing) = self.entries.lock().get(&key) {
            debug!(key = %key, "registry hit");
            return Ok(Arc::clone(existing));
        }

        let adopted = self.entries.lock().get(&key.inverse()).cloned();
        let mirror = match adopted {
            Some(mirror) => {
                debug!(key = %key, "adopting fetch-equivalent mirror");
                mirror
            }
            None => {
                info!(key = %key, "creating mirror entry");
                Arc::new(
                    RemoteMirror::open(Arc::clone(&self.config), name, RemoteUrl::new(url))
                        .await?,
                )
            }
        };

        if !ignore_fetch {
            mirror.fetch(Some(branch), false).await?;
        }

        self.entries.lock().insert(key, Arc::clone(&mirror));
        Ok(mirror)
    }

    /// Returns the number of registered keys.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no key has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns true if `key` is registered.
    pub fn contains(&self, key: &RegistryKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Removes mirror trees cloned under older cache layout versions.
    ///
    /// Returns the removed version directories. In dry-run mode the
    /// candidates are logged and nothing is removed.
    pub async fn sweep_stale_versions(&self) -> Result<Vec<PathBuf>, MirrorError> {
        let remote_root = self.config.remote_root();
        let dry_run = self.config.dry_run();

        tokio::task::spawn_blocking(move || sweep_blocking(&remote_root, dry_run))
            .await
            .map_err(|e| MirrorError::git(format!("sweep task failed: {e}")))?
    }

    fn gate(&self, key: &RegistryKey) -> Gate {
        let mut gates = self.gates.lock();
        Arc::clone(
            gates
                .entry((key.url.clone(), key.branch.clone()))
                .or_default(),
        )
    }
}

impl fmt::Debug for MirrorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorRegistry")
            .field("cache_root", &self.config.cache_root())
            .field("entries", &self.len())
            .finish()
    }
}

fn sweep_blocking(remote_root: &Path, dry_run: bool) -> Result<Vec<PathBuf>, MirrorError> {
    let mut removed = Vec::new();
    if !remote_root.exists() {
        return Ok(removed);
    }

    let live = CACHE_VERSION.to_string();
    for entry in std::fs::read_dir(remote_root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() || entry.file_name().to_string_lossy() == live {
            continue;
        }

        if dry_run {
            info!(path = %path.display(), "dry run: would remove stale mirror tree");
        } else {
            info!(path = %path.display(), "removing stale mirror tree");
            std::fs::remove_dir_all(&path)?;
            removed.push(path);
        }
    }

    Ok(removed)
}
