#![allow(dead_code)]
use std::path::Path;
use std::sync::Arc;

use git2::{Oid, Repository, Signature};
use tempfile::TempDir;

use quarry_git::MirrorConfig;

/// A throwaway "remote" repository reachable over the local transport.
pub struct FixtureRemote {
    dir: TempDir,
    pub head: Oid,
}

impl FixtureRemote {
    /// Returns the URL build processes would request (a plain path).
    pub fn url(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }

    /// Adds a commit on the fixture's current branch.
    pub fn push_commit(&mut self, file: &str, contents: &str, message: &str) -> Oid {
        let repo = Repository::open(self.dir.path()).expect("reopen fixture remote");
        let oid = commit_file(&repo, file, contents, message);
        self.head = oid;
        oid
    }
}

/// Creates a remote repository with one commit on `branch`.
pub fn fixture_remote(branch: &str) -> FixtureRemote {
    let dir = TempDir::new().expect("create remote dir");
    let repo = Repository::init(dir.path()).expect("init fixture remote");
    repo.set_head(&format!("refs/heads/{branch}"))
        .expect("point HEAD at fixture branch");

    let head = commit_file(&repo, "README.md", "hello quarry", "initial");
    FixtureRemote { dir, head }
}

/// Commits `file` with `contents` on the repository's current branch.
pub fn commit_file(repo: &Repository, file: &str, contents: &str, message: &str) -> Oid {
    let workdir = repo.workdir().expect("fixture remote has a worktree");
    std::fs::write(workdir.join(file), contents).expect("write fixture file");

    let mut index = repo.index().expect("open index");
    index.add_path(Path::new(file)).expect("stage fixture file");
    index.write().expect("write index");
    let tree_id = index.write_tree().expect("write tree");
    let tree = repo.find_tree(tree_id).expect("find tree");

    let sig = Signature::now("Quarry Tests", "tests@example.com").expect("signature");
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .expect("commit fixture file")
}

/// Builds a cache configuration rooted in a test directory.
pub fn cache_config(root: &Path, default_branch: &str) -> MirrorConfig {
    MirrorConfig::builder()
        .cache_root(root)
        .default_branch(default_branch)
        .build()
        .expect("build cache config")
}

/// Same, wrapped for direct `RemoteMirror::open` calls.
pub fn shared_config(root: &Path, default_branch: &str) -> Arc<MirrorConfig> {
    Arc::new(cache_config(root, default_branch))
}
