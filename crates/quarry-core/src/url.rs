//! Remote URL model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport protocol of a remote URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// `ssh://` URLs and scp-like `user@host:path` addresses.
    Ssh,
    /// `https://` URLs.
    Https,
    /// Anything else (http, git, file, plain local paths).
    Other,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ssh => write!(f, "ssh"),
            Self::Https => write!(f, "https"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A remote repository URL.
///
/// Wraps the raw URL string and answers the questions the mirror cache
/// needs: which transport the URL uses, which ssh user it names, and what
/// the "humanish" repository name is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteUrl(String);

impl RemoteUrl {
    /// Creates a new RemoteUrl from a raw URL string.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Returns the raw URL string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classifies the URL's transport protocol.
    ///
    /// Scheme-less addresses with a `:` before the first `/` are treated
    /// as scp-like ssh addresses (`git@host:owner/repo.git`).
    pub fn protocol(&self) -> Protocol {
        if let Some((scheme, _)) = self.0.split_once("://") {
            return match scheme {
                "ssh" => Protocol::Ssh,
                "https" => Protocol::Https,
                _ => Protocol::Other,
            };
        }

        let head = self.0.split('/').next().unwrap_or("");
        if head.contains(':') {
            Protocol::Ssh
        } else {
            Protocol::Other
        }
    }

    /// Returns the user component of the URL authority, if present.
    ///
    /// For `ssh://git@host/path` and `git@host:path` this is `git`. When
    /// no user is named the ssh agent's own default applies, so `None`.
    pub fn ssh_user(&self) -> Option<&str> {
        let authority = match self.0.split_once("://") {
            Some((_, rest)) => rest.split('/').next().unwrap_or(""),
            None => self.0.split(':').next().unwrap_or(""),
        };
        let (user, _host) = authority.split_once('@')?;
        if user.is_empty() { None } else { Some(user) }
    }

    /// Derives the "humanish" repository name from the URL.
    ///
    /// Mirrors git's own convention: the last path segment with a
    /// trailing `.git` stripped. Returns `None` when no segment remains.
    pub fn humanish_name(&self) -> Option<&str> {
        let path = match self.0.split_once("://") {
            Some((_, rest)) => rest,
            None => match self.0.split_once(':') {
                Some((_, path)) => path,
                None => &self.0,
            },
        };

        let path = path.trim_end_matches('/');
        let last = path.rsplit('/').next()?;
        let last = last.strip_suffix(".git").unwrap_or(last);
        if last.is_empty() { None } else { Some(last) }
    }
}

impl fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RemoteUrl {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RemoteUrl {
    fn from(s: String) -> Self {
        Self(s)
    }
}
