//! Mirror entry operations using git2.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use git2::build::RepoBuilder;
use git2::{ErrorClass, ErrorCode, FetchOptions, Repository};
use tracing::{debug, info};

use quarry_core::{Protocol, RemoteUrl};

use crate::credentials::CredentialSpec;
use crate::error::MirrorError;
use crate::lock::NamedLock;
use crate::repository::config::MirrorConfig;

/// Commit metadata resolved from the mirror's object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Full hex object id.
    pub id: String,
    /// First line of the commit message.
    pub summary: String,
    /// Author name.
    pub author: String,
    /// Commit time, seconds since epoch.
    pub time_secs: i64,
}

/// One cached bare mirror of one remote repository.
///
/// Constructing the mirror clones it if its deterministic local path does
/// not exist yet; an existing path is trusted as a complete clone and
/// freshness is delegated to explicit [`fetch`](Self::fetch) calls. All
/// clone/fetch work happens under the mirror's named lock, so concurrent
/// processes sharing a cache root never race on one mirror directory.
pub struct RemoteMirror {
    config: Arc<MirrorConfig>,
    name: String,
    url: RemoteUrl,
    local_path: PathBuf,
    credentials: OnceLock<CredentialSpec>,
}

impl RemoteMirror {
    /// Opens the mirror named `name` for `url`, cloning it when absent.
    ///
    /// # Errors
    ///
    /// - [`MirrorError::LockTimeout`] if the named lock stays contended
    /// - [`MirrorError::ProtocolNotSupported`] for transports the backend
    ///   was built without
    /// - [`MirrorError::RemoteConnection`] for network/TLS/OS failures;
    ///   no partial mirror is left behind
    pub async fn open(
        config: Arc<MirrorConfig>,
        name: impl Into<String>,
        url: RemoteUrl,
    ) -> Result<Self, MirrorError> {
        let name = name.into();
        let local_path = config.mirror_path(&name);

        let mirror = Self {
            config,
            name,
            url,
            local_path,
            credentials: OnceLock::new(),
        };

        if mirror.local_path.exists() {
            debug!(path = %mirror.local_path.display(), "mirror already cloned");
        } else {
            mirror.clone_mirror().await?;
        }

        Ok(mirror)
    }

    /// Returns the remote URL.
    pub fn url(&self) -> &RemoteUrl {
        &self.url
    }

    /// Returns the logical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the mirror's local path.
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Returns true if the mirror directory exists on disk.
    pub fn is_cloned(&self) -> bool {
        self.local_path.exists()
    }

    /// Returns the credential strategy, resolving it on first use.
    pub fn credentials(&self) -> &CredentialSpec {
        self.credentials
            .get_or_init(|| CredentialSpec::resolve(&self.url))
    }

    fn lock_name(&self) -> String {
        format!("remote_git_mirror.{}", self.name)
    }

    async fn clone_mirror(&self) -> Result<(), MirrorError> {
        let locks_dir = self.config.locks_dir();
        let lock_name = self.lock_name();
        let timeout = self.config.lock_timeout();
        let url = self.url.clone();
        let path = self.local_path.clone();
        let creds = self.credentials().clone();

        info!(url = %url, path = %path.display(), "cloning remote mirror");

        tokio::task::spawn_blocking(move || {
            let _lock = NamedLock::acquire(&locks_dir, &lock_name, timeout)?;
            clone_blocking(&url, &path, &creds)
        })
        .await
        .map_err(|e| MirrorError::git(format!("clone task failed: {e}")))?
    }

    /// Fetches `branch` from origin, defaulting to the configured branch.
    ///
    /// No-op when `ignore_fetch` is set or the cache is in dry-run mode.
    /// After the fetch the branch must exist as a remote-tracking ref; a
    /// fetch that silently omits it fails with
    /// [`MirrorError::BranchNotFound`].
    pub async fn fetch(&self, branch: Option<&str>, ignore_fetch: bool) -> Result<(), MirrorError> {
        if ignore_fetch {
            debug!(url = %self.url, "fetch skipped (ignore_fetch)");
            return Ok(());
        }
        if self.config.dry_run() {
            info!(url = %self.url, "fetch skipped (dry run)");
            return Ok(());
        }

        let branch = branch.unwrap_or_else(|| self.config.default_branch());
        let branch = normalize_branch(branch).to_string();

        let locks_dir = self.config.locks_dir();
        let lock_name = self.lock_name();
        let timeout = self.config.lock_timeout();
        let url = self.url.clone();
        let path = self.local_path.clone();
        let creds = self.credentials().clone();

        info!(url = %url, branch = %branch, "fetching remote mirror");

        tokio::task::spawn_blocking(move || {
            let _lock = NamedLock::acquire(&locks_dir, &lock_name, timeout)?;
            fetch_blocking(&url, &path, &branch, &creds)
        })
        .await
        .map_err(|e| MirrorError::git(format!("fetch task failed: {e}")))?
    }

    /// Checks whether `origin/<name>` exists as a remote-tracking ref.
    ///
    /// A pre-existing `origin/` prefix in `name` is stripped first.
    pub async fn branch_exists(&self, name: &str) -> Result<bool, MirrorError> {
        let branch = normalize_branch(name).to_string();
        let path = self.local_path.clone();

        tokio::task::spawn_blocking(move || {
            let repo = open_mirror(&path)?;
            Ok(branch_exists_blocking(&repo, &branch))
        })
        .await
        .map_err(|e| MirrorError::git(format!("branch lookup task failed: {e}")))?
    }

    /// Resolves the target id of `refs/remotes/origin/<name>`.
    pub async fn latest_commit(&self, name: &str) -> Result<String, MirrorError> {
        let branch = normalize_branch(name).to_string();
        let path = self.local_path.clone();
        let url = self.url.clone();

        tokio::task::spawn_blocking(move || {
            let repo = open_mirror(&path)?;
            repo.refname_to_id(&format!("refs/remotes/origin/{branch}"))
                .map(|oid| oid.to_string())
                .map_err(|_| MirrorError::branch_not_found(&branch, url.as_str()))
        })
        .await
        .map_err(|e| MirrorError::git(format!("ref lookup task failed: {e}")))?
    }

    /// Looks up a commit in the mirror's local object store.
    pub async fn lookup_commit(&self, id: &str) -> Result<CommitInfo, MirrorError> {
        let commit = id.to_string();
        let path = self.local_path.clone();
        let url = self.url.clone();

        tokio::task::spawn_blocking(move || {
            let repo = open_mirror(&path)?;
            lookup_commit_blocking(&repo, &commit)
                .map_err(|_| MirrorError::commit_not_found(&commit, url.as_str()))
        })
        .await
        .map_err(|e| MirrorError::git(format!("commit lookup task failed: {e}")))?
    }

    /// Lists remote-tracking branch names (`origin/<branch>`).
    pub async fn remote_branches(&self) -> Result<Vec<String>, MirrorError> {
        let path = self.local_path.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<String>, MirrorError> {
            let repo = open_mirror(&path)?;
            let mut branches = Vec::new();

            let iter = repo
                .branches(Some(git2::BranchType::Remote))
                .map_err(|e| MirrorError::git(e.message()))?;
            for entry in iter {
                let (branch, _) = entry.map_err(|e| MirrorError::git(e.message()))?;
                if let Ok(Some(name)) = branch.name() {
                    branches.push(name.to_string());
                }
            }

            Ok(branches)
        })
        .await
        .map_err(|e| MirrorError::git(format!("branch list task failed: {e}")))?
    }
}

impl std::fmt::Debug for RemoteMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteMirror")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("local_path", &self.local_path)
            .finish()
    }
}

/// Strips one `origin/` prefix so ref formatting never doubles it.
fn normalize_branch(name: &str) -> &str {
    name.strip_prefix("origin/").unwrap_or(name)
}

fn open_mirror(path: &Path) -> Result<Repository, MirrorError> {
    Repository::open_bare(path).map_err(|e| {
        MirrorError::git(format!(
            "failed to open mirror at {}: {}",
            path.display(),
            e.message()
        ))
    })
}

fn ensure_protocol_supported(url: &RemoteUrl, protocol: Protocol) -> Result<(), MirrorError> {
    let version = git2::Version::get();
    let supported = match protocol {
        Protocol::Ssh => version.ssh(),
        Protocol::Https => version.https(),
        Protocol::Other => true,
    };

    if supported {
        Ok(())
    } else {
        Err(MirrorError::ProtocolNotSupported {
            url: url.to_string(),
            protocol,
        })
    }
}

fn map_transport_error(url: &RemoteUrl, err: git2::Error) -> MirrorError {
    match err.class() {
        ErrorClass::Net
        | ErrorClass::Ssl
        | ErrorClass::Ssh
        | ErrorClass::Http
        | ErrorClass::Os => MirrorError::remote(url.as_str(), err.message().trim()),
        _ => MirrorError::git(err.message()),
    }
}

fn clone_blocking(url: &RemoteUrl, path: &Path, creds: &CredentialSpec) -> Result<(), MirrorError> {
    // Another process may have finished the clone while we waited.
    if path.exists() {
        debug!(path = %path.display(), "mirror appeared while waiting for lock");
        return Ok(());
    }

    ensure_protocol_supported(url, url.protocol())?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut fetch_opts = FetchOptions::new();
    fetch_opts.remote_callbacks(creds.callbacks());

    let mut builder = RepoBuilder::new();
    builder.bare(true);
    builder.fetch_options(fetch_opts);

    match builder.clone(url.as_str(), path) {
        Ok(_) => Ok(()),
        Err(e) => {
            // A half-written mirror must not look usable.
            if path.exists() {
                let _ = std::fs::remove_dir_all(path);
            }
            Err(map_transport_error(url, e))
        }
    }
}

fn fetch_blocking(
    url: &RemoteUrl,
    path: &Path,
    branch: &str,
    creds: &CredentialSpec,
) -> Result<(), MirrorError> {
    let repo = open_mirror(path)?;
    migrate_origin_url(&repo, url)?;

    let mut remote = repo
        .find_remote("origin")
        .map_err(|e| MirrorError::git(e.message()))?;

    let refspec = format!("+refs/heads/{branch}:refs/remotes/origin/{branch}");
    let mut fetch_opts = FetchOptions::new();
    fetch_opts.remote_callbacks(creds.callbacks());

    remote
        .fetch(&[refspec.as_str()], Some(&mut fetch_opts), None)
        .map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                MirrorError::branch_not_found(branch, url.as_str())
            } else {
                map_transport_error(url, e)
            }
        })?;

    // A fetch that silently omits the branch is a failure, not a stale
    // success.
    if !branch_exists_blocking(&repo, branch) {
        return Err(MirrorError::branch_not_found(branch, url.as_str()));
    }

    Ok(())
}

/// Rewrites the mirror's recorded origin URL when the remote moved.
///
/// Lets a mirror survive a remote rename without re-cloning.
fn migrate_origin_url(repo: &Repository, url: &RemoteUrl) -> Result<(), MirrorError> {
    let mut config = repo.config().map_err(|e| MirrorError::git(e.message()))?;

    let recorded = config
        .snapshot()
        .and_then(|snap| snap.get_string("remote.origin.url"))
        .ok();

    if let Some(old) = recorded
        && old != url.as_str()
    {
        info!(old = %old, new = %url, "migrating mirror origin url");
        config
            .set_str("remote.origin.url", url.as_str())
            .map_err(|e| MirrorError::git(e.message()))?;
    }

    Ok(())
}

fn branch_exists_blocking(repo: &Repository, branch: &str) -> bool {
    repo.find_branch(&format!("origin/{branch}"), git2::BranchType::Remote)
        .is_ok()
}

fn lookup_commit_blocking(repo: &Repository, id: &str) -> Result<CommitInfo, git2::Error> {
    let oid = git2::Oid::from_str(id)?;
    let commit = repo.find_commit(oid)?;

    Ok(CommitInfo {
        id: commit.id().to_string(),
        summary: commit.summary().unwrap_or_default().to_string(),
        author: commit.author().name().unwrap_or_default().to_string(),
        time_secs: commit.time().seconds(),
    })
}
