//! Git repository operations for the version-control sink.
//!
//! This module provides [`GitRepo`], a `git2`-backed implementation of the
//! [`VersionControl`] trait the sync driver commits through.
//!
//! # Key Features
//! - **Clone or reopen**: the working tree is cloned once and reused afterwards
//! - **Branch handling**: existence checks and checkouts across local and `origin/*` refs
//! - **Commits**: stage additions and deletions, skip when the tree is unchanged
//! - **Push**: SSH key auth, known-hosts verification, rejected-update detection

use crate::core::error::{Result, SyncError};
use crate::core::known_hosts::{self, HostKeyStatus};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    BranchType, CertificateCheckStatus, Cred, CredentialType, FetchOptions, IndexAddOption,
    PushOptions, RemoteCallbacks, Repository, Signature,
};
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

pub const REMOTE_NAME: &str = "origin";
pub const COMMIT_MESSAGE: &str = "Update Grafana dashboards";

const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// The operations a sync cycle needs from version control.
pub trait VersionControl {
    fn branch_exists(&self, name: &str) -> Result<bool>;
    fn checkout_existing(&self, name: &str) -> Result<()>;
    fn checkout_new_from(&self, base: &str, name: &str) -> Result<String>;
    /// Stage everything and commit. Returns false when there was nothing to commit.
    fn commit_all(&self, author_name: &str, author_email: &str) -> Result<bool>;
    fn push(&self, branch: &str) -> Result<()>;
}

/// SSH credentials and host verification settings for remote operations
#[derive(Debug, Clone, Default)]
pub struct GitAuth {
    pub ssh_key: Option<PathBuf>,
    pub ssh_key_password: Option<String>,
    pub known_hosts_path: PathBuf,
    pub accept_unknown_hosts: bool,
}

pub struct GitRepo {
    repo: Repository,
    auth: GitAuth,
}

impl GitRepo {
    pub fn open<P: AsRef<Path>>(path: P, auth: GitAuth) -> Result<Self> {
        let repo = Repository::open(path)?;
        Ok(GitRepo { repo, auth })
    }

    pub fn clone_from<P: AsRef<Path>>(url: &str, path: P, auth: GitAuth) -> Result<Self> {
        let attempts = Cell::new(0);
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks(&auth, &attempts));

        let repo = RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(url, path.as_ref())?;
        log::info!("Cloned {} into {}", url, path.as_ref().display());
        Ok(GitRepo { repo, auth })
    }

    /// Reuse an existing clone at `path`, cloning `url` there otherwise
    pub fn open_or_clone<P: AsRef<Path>>(url: &str, path: P, auth: GitAuth) -> Result<Self> {
        let path = path.as_ref();
        if path.join(".git").exists() {
            log::debug!("Reusing existing clone at {}", path.display());
            Self::open(path, auth)
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
            }
            Self::clone_from(url, path, auth)
        }
    }

    pub fn get_repository(&self) -> &Repository {
        &self.repo
    }

    pub fn workdir(&self) -> Result<&Path> {
        self.repo
            .workdir()
            .ok_or_else(|| SyncError::invalid_config("repository has no working directory"))
    }

    pub fn get_current_branch(&self) -> Result<String> {
        let head = self.repo.head()?;
        match head.shorthand() {
            Some(name) if head.is_branch() => Ok(name.to_string()),
            _ => Ok("-none-".to_string()),
        }
    }

    /// Fetch `branch` from origin into `refs/remotes/origin/<branch>`
    pub fn fetch_branch(&self, branch: &str) -> Result<()> {
        let mut remote = self.repo.find_remote(REMOTE_NAME)?;
        let attempts = Cell::new(0);
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks(&self.auth, &attempts));

        let refspec = format!("+refs/heads/{branch}:refs/remotes/{REMOTE_NAME}/{branch}");
        remote.fetch(&[refspec.as_str()], Some(&mut fetch_options), None)?;
        log::debug!("Fetched {REMOTE_NAME}/{branch}");
        Ok(())
    }

    fn checkout_ref(&self, refname: &str) -> Result<()> {
        let target = self.repo.revparse_single(refname)?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force().remove_untracked(true);
        self.repo.checkout_tree(&target, Some(&mut checkout))?;
        self.repo.set_head(refname)?;
        Ok(())
    }

    fn remote_branch_commit(&self, name: &str) -> Option<git2::Commit<'_>> {
        self.repo
            .find_branch(&format!("{REMOTE_NAME}/{name}"), BranchType::Remote)
            .ok()
            .and_then(|b| b.get().peel_to_commit().ok())
    }
}

impl VersionControl for GitRepo {
    fn branch_exists(&self, name: &str) -> Result<bool> {
        if self.repo.find_branch(name, BranchType::Local).is_ok() {
            return Ok(true);
        }
        Ok(self.remote_branch_commit(name).is_some())
    }

    fn checkout_existing(&self, name: &str) -> Result<()> {
        if self.repo.find_branch(name, BranchType::Local).is_err() {
            let commit = self.remote_branch_commit(name).ok_or_else(|| {
                SyncError::Git(git2::Error::from_str(&format!("branch {name} not found")))
            })?;
            let upstream = format!("{REMOTE_NAME}/{name}");
            let mut branch = self.repo.branch(name, &commit, false)?;
            branch.set_upstream(Some(upstream.as_str()))?;
        }
        self.checkout_ref(&format!("refs/heads/{name}"))?;
        log::debug!("Checked out existing branch {name}");
        Ok(())
    }

    fn checkout_new_from(&self, base: &str, name: &str) -> Result<String> {
        if self.repo.find_remote(REMOTE_NAME).is_ok() {
            self.fetch_branch(base)?;
        }

        let base_commit = match self.remote_branch_commit(base) {
            Some(commit) => commit,
            None => self
                .repo
                .find_branch(base, BranchType::Local)?
                .get()
                .peel_to_commit()?,
        };

        self.repo.branch(name, &base_commit, false)?;
        self.checkout_ref(&format!("refs/heads/{name}"))?;
        log::debug!("Created branch {name} from {base}");
        Ok(name.to_string())
    }

    fn commit_all(&self, author_name: &str, author_email: &str) -> Result<bool> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        if parent.as_ref().is_some_and(|p| p.tree_id() == tree_id) {
            log::debug!("Working tree matches HEAD, nothing to commit");
            return Ok(false);
        }

        let tree = self.repo.find_tree(tree_id)?;
        let signature = Signature::now(author_name, author_email)?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            COMMIT_MESSAGE,
            &tree,
            &parents,
        )?;
        log::info!("Committed {}", &oid.to_string()[..7]);
        Ok(true)
    }

    fn push(&self, branch: &str) -> Result<()> {
        let mut remote = self.repo.find_remote(REMOTE_NAME)?;
        let attempts = Cell::new(0);
        let rejection: RefCell<Option<String>> = RefCell::new(None);

        let mut callbacks = remote_callbacks(&self.auth, &attempts);
        callbacks.push_update_reference(|refname, status| {
            if let Some(message) = status {
                *rejection.borrow_mut() = Some(format!("{refname}: {message}"));
            }
            Ok(())
        });

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);

        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        remote.push(&[refspec.as_str()], Some(&mut push_options))?;

        let rejected = rejection.borrow_mut().take();
        if let Some(message) = rejected {
            return Err(SyncError::PushRejected {
                branch: branch.to_string(),
                message,
            });
        }
        log::info!("Pushed {branch} to {REMOTE_NAME}");
        Ok(())
    }
}

fn remote_callbacks<'a>(auth: &'a GitAuth, attempts: &'a Cell<usize>) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();

    callbacks.credentials(move |_url, username_from_url, allowed| {
        attempts.set(attempts.get() + 1);
        if attempts.get() > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("authentication failed: credentials rejected"));
        }
        let username = username_from_url.unwrap_or("git");
        match &auth.ssh_key {
            Some(key) if allowed.contains(CredentialType::SSH_KEY) => {
                Cred::ssh_key(username, None, key, auth.ssh_key_password.as_deref())
            }
            _ if allowed.contains(CredentialType::USERNAME) => Cred::username(username),
            _ => Cred::default(),
        }
    });

    callbacks.certificate_check(move |cert, host| {
        if auth.accept_unknown_hosts {
            return Ok(CertificateCheckStatus::CertificateOk);
        }
        let Some(key) = cert.as_hostkey().and_then(|h| h.hostkey()) else {
            return Ok(CertificateCheckStatus::CertificatePassthrough);
        };
        let status = known_hosts::verify(&auth.known_hosts_path, host, key)
            .map_err(|e| git2::Error::from_str(&e.to_string()))?;
        match status {
            HostKeyStatus::Match => Ok(CertificateCheckStatus::CertificateOk),
            HostKeyStatus::Mismatch => Err(git2::Error::from_str(&format!(
                "host key for {host} does not match {}",
                auth.known_hosts_path.display()
            ))),
            HostKeyStatus::Unknown => Err(git2::Error::from_str(&format!(
                "host {host} is not in {}",
                auth.known_hosts_path.display()
            ))),
        }
    });

    callbacks
}
