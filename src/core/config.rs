//! Statically-typed configuration read from environment variables.
//!
//! [`Config::from_lookup`] parses every field explicitly from a lookup function,
//! applying defaults and range checks; [`Config::from_env`] plugs in the process
//! environment. [`Config::validate`] then checks the things that depend on the
//! filesystem or on URL syntax.

use crate::core::branch::{BranchManager, BranchStrategy};
use crate::core::dirs::{default_clone_path, default_known_hosts_path};
use crate::core::error::{Result, SyncError};
use crate::core::git::GitAuth;
use crate::core::path_mapper::Layout;
use crate::core::reconcile::ReconcileOptions;
use crate::core::retry::RetryPolicy;
use std::fmt;
use std::path::{Component, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_BRANCH: &str = "main";
pub const DEFAULT_BRANCH_PREFIX: &str = "grafana-git-sync-";
pub const MIN_BRANCH_TTL: Duration = Duration::from_secs(60);
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    OneTime,
    Periodic,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "one-time" => Ok(Self::OneTime),
            "periodic" => Ok(Self::Periodic),
            _ => Err("expected one-time or periodic".to_string()),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneTime => write!(f, "one-time"),
            Self::Periodic => write!(f, "periodic"),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub grafana_url: String,
    pub grafana_token: String,

    pub ssh_url: String,
    pub ssh_key: PathBuf,
    pub ssh_key_password: Option<String>,
    pub ssh_user: String,
    pub ssh_email: String,
    pub ssh_known_hosts_path: PathBuf,
    pub ssh_accept_unknown_hosts: bool,

    pub repo_clone_path: PathBuf,
    pub repo_save_path: PathBuf,

    pub base_branch: String,
    pub branch_prefix: String,
    pub branch_strategy: BranchStrategy,
    pub branch_ttl: Duration,

    pub run_mode: RunMode,
    pub sync_interval: Duration,

    pub delete_missing: bool,
    pub ignore_folder_structure: bool,
    pub add_missing_newlines: bool,
    pub dry_run: bool,

    pub retry: RetryPolicy,
    pub log_level: log::LevelFilter,
}

// Secrets stay out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("grafana_url", &self.grafana_url)
            .field("grafana_token", &"<redacted>")
            .field("ssh_url", &self.ssh_url)
            .field("ssh_key", &self.ssh_key)
            .field("ssh_user", &self.ssh_user)
            .field("ssh_email", &self.ssh_email)
            .field("ssh_known_hosts_path", &self.ssh_known_hosts_path)
            .field("ssh_accept_unknown_hosts", &self.ssh_accept_unknown_hosts)
            .field("repo_clone_path", &self.repo_clone_path)
            .field("repo_save_path", &self.repo_save_path)
            .field("base_branch", &self.base_branch)
            .field("branch_prefix", &self.branch_prefix)
            .field("branch_strategy", &self.branch_strategy)
            .field("branch_ttl", &self.branch_ttl)
            .field("run_mode", &self.run_mode)
            .field("sync_interval", &self.sync_interval)
            .field("delete_missing", &self.delete_missing)
            .field("ignore_folder_structure", &self.ignore_folder_structure)
            .field("add_missing_newlines", &self.add_missing_newlines)
            .field("dry_run", &self.dry_run)
            .field("retry", &self.retry)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Parse every field from `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let branch_strategy = env.parsed("BRANCH_STRATEGY", BranchStrategy::NewBranch)?;
        let branch_ttl = env.duration("BRANCH_TTL", Duration::from_secs(24 * 60 * 60))?;
        if branch_strategy == BranchStrategy::ReuseBranch && branch_ttl < MIN_BRANCH_TTL {
            return Err(SyncError::invalid_variable(
                "BRANCH_TTL",
                format!("{branch_ttl:?}"),
                "must be at least 1m with reuse-branch",
            ));
        }

        let run_mode = env.parsed("RUN_MODE", RunMode::OneTime)?;
        let sync_interval = env.duration("SYNC_INTERVAL", Duration::from_secs(5 * 60))?;
        if run_mode == RunMode::Periodic && sync_interval < MIN_SYNC_INTERVAL {
            return Err(SyncError::invalid_variable(
                "SYNC_INTERVAL",
                format!("{sync_interval:?}"),
                "must be at least 1s in periodic mode",
            ));
        }

        let max_attempts: u32 = env.parsed("NUM_OF_RETRIES", 3)?;
        if max_attempts == 0 {
            return Err(SyncError::invalid_variable(
                "NUM_OF_RETRIES",
                "0",
                "must be at least 1",
            ));
        }
        let backoff_secs: u64 = env.parsed("RETRIES_BACKOFF", 5)?;

        Ok(Self {
            grafana_url: env.required("GRAFANA_URL")?,
            grafana_token: env.required("GRAFANA_SA_TOKEN")?,

            ssh_url: env.required("SSH_URL")?,
            ssh_key: PathBuf::from(env.required("SSH_KEY")?),
            ssh_key_password: env.optional("SSH_KEY_PASSWORD"),
            ssh_user: env.required("SSH_USER")?,
            ssh_email: env.required("SSH_EMAIL")?,
            ssh_known_hosts_path: env
                .optional("SSH_KNOWN_HOSTS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_known_hosts_path),
            ssh_accept_unknown_hosts: env.flag("SSH_ACCEPT_UNKNOWN_HOSTS", false)?,

            repo_clone_path: env
                .optional("REPO_CLONE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_clone_path),
            repo_save_path: PathBuf::from(env.required("REPO_SAVE_PATH")?),

            base_branch: env
                .optional("BASE_BRANCH")
                .unwrap_or_else(|| DEFAULT_BASE_BRANCH.to_string()),
            branch_prefix: env
                .optional("BRANCH_PREFIX")
                .unwrap_or_else(|| DEFAULT_BRANCH_PREFIX.to_string()),
            branch_strategy,
            branch_ttl,

            run_mode,
            sync_interval,

            delete_missing: env.flag("DELETE_MISSING", false)?,
            ignore_folder_structure: env.flag("IGNORE_FOLDER_STRUCTURE", false)?,
            add_missing_newlines: env.flag("ADD_MISSING_NEWLINES", false)?,
            dry_run: env.flag("DRY_RUN", false)?,

            retry: RetryPolicy {
                enabled: env.flag("ENABLE_RETRIES", true)?,
                max_attempts,
                backoff_unit: Duration::from_secs(backoff_secs),
            },
            log_level: env.parsed("LOG_LEVEL", log::LevelFilter::Info)?,
        })
    }

    /// Checks that need URL parsing or the filesystem
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.grafana_url).map_err(|e| {
            SyncError::invalid_variable("GRAFANA_URL", &self.grafana_url, e.to_string())
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::invalid_variable(
                "GRAFANA_URL",
                &self.grafana_url,
                "scheme must be http or https",
            ));
        }

        if !self.ssh_key.is_file() {
            return Err(SyncError::invalid_config(format!(
                "SSH key file does not exist: {}",
                self.ssh_key.display()
            )));
        }

        if !self.ssh_accept_unknown_hosts && !self.ssh_known_hosts_path.is_file() {
            return Err(SyncError::invalid_config(format!(
                "SSH known hosts file does not exist: {}",
                self.ssh_known_hosts_path.display()
            )));
        }

        if self
            .repo_save_path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(SyncError::invalid_variable(
                "REPO_SAVE_PATH",
                self.repo_save_path.display().to_string(),
                "must not contain '..'",
            ));
        }
        if self.repo_save_path.is_absolute() && !self.repo_save_path.starts_with(&self.repo_clone_path)
        {
            return Err(SyncError::invalid_variable(
                "REPO_SAVE_PATH",
                self.repo_save_path.display().to_string(),
                "must be inside REPO_CLONE_PATH",
            ));
        }

        Ok(())
    }

    /// Directory dashboards are written to
    pub fn save_dir(&self) -> PathBuf {
        if self.repo_save_path.is_absolute() {
            self.repo_save_path.clone()
        } else {
            self.repo_clone_path.join(&self.repo_save_path)
        }
    }

    pub fn layout(&self) -> Layout {
        Layout::from_ignore_folders(self.ignore_folder_structure)
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            layout: self.layout(),
            delete_missing: self.delete_missing,
            add_trailing_newline: self.add_missing_newlines,
        }
    }

    pub fn branch_manager(&self) -> BranchManager {
        let ttl = chrono::Duration::from_std(self.branch_ttl).unwrap_or(chrono::Duration::MAX);
        BranchManager::new(&self.branch_prefix, self.branch_strategy, ttl)
    }

    pub fn git_auth(&self) -> GitAuth {
        GitAuth {
            ssh_key: Some(self.ssh_key.clone()),
            ssh_key_password: self.ssh_key_password.clone(),
            known_hosts_path: self.ssh_known_hosts_path.clone(),
            accept_unknown_hosts: self.ssh_accept_unknown_hosts,
        }
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String> {
        self.optional(name)
            .ok_or(SyncError::MissingVariable { name })
    }

    fn flag(&self, name: &'static str, default: bool) -> Result<bool> {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => parse_bool(&value)
                .ok_or_else(|| SyncError::invalid_variable(name, value, "expected a boolean")),
        }
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|e: T::Err| SyncError::invalid_variable(name, &value, e.to_string())),
        }
    }

    fn duration(&self, name: &'static str, default: Duration) -> Result<Duration> {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => parse_duration(&value)
                .ok_or_else(|| SyncError::invalid_variable(name, value, "expected a duration like 90s, 5m or 1h30m")),
        }
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse `1h30m`, `90s`, `250ms` or a bare number of seconds
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = value;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit())?;
        if digits == 0 {
            return None;
        }
        let amount: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "ms" => Duration::from_millis(1),
            "s" => Duration::from_secs(1),
            "m" => Duration::from_secs(60),
            "h" => Duration::from_secs(60 * 60),
            _ => return None,
        };
        total = total.checked_add(unit.checked_mul(u32::try_from(amount).ok()?)?)?;
        rest = &rest[unit_len..];
    }
    Some(total)
}
