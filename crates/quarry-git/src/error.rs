//! Error types for the mirror cache.

use quarry_core::Protocol;

/// Errors that can occur while caching or querying remote mirrors.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// The git backend was built without support for the URL's transport.
    #[error("protocol {protocol} is not supported by the git backend: {url}")]
    ProtocolNotSupported {
        /// The remote URL that was requested.
        url: String,
        /// The unsupported transport protocol.
        protocol: Protocol,
    },

    /// A network, TLS or OS-level failure during clone or fetch.
    #[error("cannot reach remote {url}: {message}")]
    RemoteConnection {
        /// The remote URL that was being contacted.
        url: String,
        /// The backend's raw failure message.
        message: String,
    },

    /// The requested branch does not exist in the remote repository.
    #[error("branch {branch} does not exist in remote {url}")]
    BranchNotFound {
        /// The branch that was requested.
        branch: String,
        /// The remote the branch was expected in.
        url: String,
    },

    /// The requested commit does not exist in the remote repository.
    #[error("commit {commit} does not exist in remote {url}")]
    CommitNotFound {
        /// The commit id that was requested.
        commit: String,
        /// The remote the commit was expected in.
        url: String,
    },

    /// Waiting for a named lock exceeded its timeout.
    #[error("timed out after {seconds}s waiting for lock {name}")]
    LockTimeout {
        /// The lock name that was contended.
        name: String,
        /// The timeout that expired, in seconds.
        seconds: u64,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A git operation failed in a way that fits no category above.
    #[error("git error: {0}")]
    Git(String),
}

impl MirrorError {
    /// Creates a new residual git error.
    pub fn git(msg: impl Into<String>) -> Self {
        Self::Git(msg.into())
    }

    /// Creates a new remote connection error.
    pub fn remote(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteConnection {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new branch-not-found error.
    pub fn branch_not_found(branch: impl Into<String>, url: impl Into<String>) -> Self {
        Self::BranchNotFound {
            branch: branch.into(),
            url: url.into(),
        }
    }

    /// Creates a new commit-not-found error.
    pub fn commit_not_found(commit: impl Into<String>, url: impl Into<String>) -> Self {
        Self::CommitNotFound {
            commit: commit.into(),
            url: url.into(),
        }
    }

    /// Returns true if this error might succeed on a caller-driven retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RemoteConnection { .. } | Self::LockTimeout { .. }
        )
    }
}
