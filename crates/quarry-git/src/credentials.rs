//! Credential resolution for remote transports.

use git2::{Cred, RemoteCallbacks};
use quarry_core::{Protocol, RemoteUrl};

/// Authentication material for one remote, resolved once per mirror.
///
/// ssh remotes authenticate through the locally running ssh agent only:
/// no key-file paths, no passphrase prompting. Every other transport uses
/// the backend's library-default (anonymous) auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSpec {
    /// Ask the ssh agent for the given user, falling back to the user the
    /// transport extracted from the URL.
    SshAgent {
        /// User component of the URL authority, when one was named.
        username: Option<String>,
    },
    /// No credential object.
    Anonymous,
}

impl CredentialSpec {
    /// Resolves the credential strategy for `url` from its protocol.
    pub fn resolve(url: &RemoteUrl) -> Self {
        match url.protocol() {
            Protocol::Ssh => Self::SshAgent {
                username: url.ssh_user().map(str::to_owned),
            },
            Protocol::Https | Protocol::Other => Self::Anonymous,
        }
    }

    /// Builds the remote callbacks realizing this strategy.
    pub fn callbacks(&self) -> RemoteCallbacks<'static> {
        let mut callbacks = RemoteCallbacks::new();

        if let Self::SshAgent { username } = self {
            let username = username.clone();
            callbacks.credentials(move |_url, username_from_url, _allowed| {
                let user = username.as_deref().or(username_from_url).unwrap_or("git");
                Cred::ssh_key_from_agent(user)
            });
        }

        callbacks
    }
}
