//! Mirror cache configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// On-disk layout version of the mirror cache.
///
/// Mirrors cloned under a different version are never reused; they are
/// candidates for the maintenance sweep.
pub const CACHE_VERSION: u32 = 1;

/// Configuration for the mirror cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorConfig {
    /// Root directory holding mirrors and lock files.
    cache_root: PathBuf,

    /// Branch to fetch when a request names none.
    #[serde(default = "default_branch")]
    default_branch: String,

    /// How long clone/fetch may wait for the per-mirror named lock.
    #[serde(default = "default_lock_timeout", with = "duration_secs")]
    lock_timeout: Duration,

    /// When set, fetches are skipped entirely; cloning is unaffected.
    #[serde(default)]
    dry_run: bool,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_lock_timeout() -> Duration {
    Duration::from_secs(120)
}

impl MirrorConfig {
    /// Creates a new builder for MirrorConfig.
    pub fn builder() -> MirrorConfigBuilder {
        MirrorConfigBuilder::default()
    }

    /// Returns the cache root directory.
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Returns the default branch.
    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    /// Returns the named-lock acquisition timeout.
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Returns whether fetches are skipped.
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Returns the directory holding every mirror version tree.
    pub fn remote_root(&self) -> PathBuf {
        self.cache_root.join("remote")
    }

    /// Resolves the deterministic mirror path for a logical name.
    pub fn mirror_path(&self, name: &str) -> PathBuf {
        self.remote_root().join(CACHE_VERSION.to_string()).join(name)
    }

    /// Returns the directory holding named lock files.
    pub fn locks_dir(&self) -> PathBuf {
        self.cache_root.join("locks")
    }
}

/// Builder for MirrorConfig.
#[derive(Debug, Default)]
pub struct MirrorConfigBuilder {
    cache_root: Option<PathBuf>,
    default_branch: Option<String>,
    lock_timeout: Option<Duration>,
    dry_run: bool,
}

impl MirrorConfigBuilder {
    /// Sets the cache root directory.
    pub fn cache_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(path.into());
        self
    }

    /// Sets the default branch.
    pub fn default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = Some(branch.into());
        self
    }

    /// Sets the named-lock acquisition timeout.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Sets whether fetches are skipped.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<MirrorConfig, &'static str> {
        let cache_root = self.cache_root.ok_or("cache_root is required")?;

        Ok(MirrorConfig {
            cache_root,
            default_branch: self.default_branch.unwrap_or_else(default_branch),
            lock_timeout: self.lock_timeout.unwrap_or_else(default_lock_timeout),
            dry_run: self.dry_run,
        })
    }
}


mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
