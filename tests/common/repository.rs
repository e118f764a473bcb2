//! Local git remotes for exercising the sync against real repositories.
//!
//! A [`TestRemote`] is a bare repository with one commit on `main`, reachable
//! through a plain filesystem URL so no SSH setup is needed.

#![allow(dead_code)]

use git2::{BranchType, Repository, Signature};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The TempDir must outlive the test or the remote is deleted underneath it.
pub struct TestRemote {
    pub temp_dir: TempDir,
    pub remote_path: PathBuf,
}

impl TestRemote {
    pub fn url(&self) -> String {
        self.remote_path.to_string_lossy().into_owned()
    }

    /// Where a clone for this remote should live
    pub fn clone_path(&self) -> PathBuf {
        self.temp_dir.path().join("clone")
    }

    pub fn bare(&self) -> anyhow::Result<Repository> {
        Ok(Repository::open_bare(&self.remote_path)?)
    }

    pub fn branches(&self) -> anyhow::Result<Vec<String>> {
        let repo = self.bare()?;
        let mut names = Vec::new();
        for branch in repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Paths changed by the tip commit of `branch` relative to its parent
    pub fn changed_paths(&self, branch: &str) -> anyhow::Result<Vec<String>> {
        let repo = self.bare()?;
        let commit = repo
            .find_branch(branch, BranchType::Local)?
            .get()
            .peel_to_commit()?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };
        let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&commit.tree()?), None)?;
        let mut paths: Vec<String> = diff
            .deltas()
            .filter_map(|d| d.new_file().path().or_else(|| d.old_file().path()))
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect();
        paths.sort();
        Ok(paths)
    }

    pub fn commit_count(&self, branch: &str) -> anyhow::Result<usize> {
        let repo = self.bare()?;
        let tip = repo
            .find_branch(branch, BranchType::Local)?
            .get()
            .peel_to_commit()?;
        let mut walk = repo.revwalk()?;
        walk.push(tip.id())?;
        Ok(walk.count())
    }

    pub fn tip_message(&self, branch: &str) -> anyhow::Result<String> {
        let repo = self.bare()?;
        let commit = repo
            .find_branch(branch, BranchType::Local)?
            .get()
            .peel_to_commit()?;
        Ok(commit.message().unwrap_or_default().to_string())
    }
}

/// Bare remote whose `main` holds the given files
pub fn setup_remote_with_files(files: &[(&str, &str)]) -> anyhow::Result<TestRemote> {
    let temp_dir = TempDir::new()?;
    let remote_path = temp_dir.path().join("remote.git");
    let seed_path = temp_dir.path().join("seed");

    Repository::init_bare(&remote_path)?.set_head("refs/heads/main")?;
    let seed = Repository::init(&seed_path)?;
    let mut index = seed.index()?;
    for (name, content) in files {
        let path = seed_path.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        index.add_path(Path::new(name))?;
    }
    index.write()?;

    let tree = seed.find_tree(index.write_tree()?)?;
    let sig = Signature::now("Seed", "seed@example.com")?;
    seed.commit(Some("refs/heads/main"), &sig, &sig, "Initial commit", &tree, &[])?;
    seed.remote("origin", &remote_path.to_string_lossy())?
        .push(&["refs/heads/main:refs/heads/main"], None)?;

    Ok(TestRemote {
        temp_dir,
        remote_path,
    })
}

pub fn setup_remote() -> anyhow::Result<TestRemote> {
    setup_remote_with_files(&[("README.md", "dashboards\n")])
}
