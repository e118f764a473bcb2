//! Dashboards, fake sources and configurations used across scenarios.

#![allow(dead_code)]

use super::repository::TestRemote;
use grafana_git_sync::core::error::Result;
use grafana_git_sync::{
    BranchStrategy, CancellationToken, Config, DashboardRecord, DashboardSource, RetryPolicy,
    RunMode,
};
use serde_json::json;
use std::cell::RefCell;
use std::path::PathBuf;
use std::time::Duration;

pub fn dashboard(uid: &str, folder_id: i64, folder_title: &str) -> DashboardRecord {
    DashboardRecord {
        uid: uid.to_string(),
        title: format!("Dashboard {uid}"),
        folder_id,
        folder_title: folder_title.to_string(),
        definition: json!({ "uid": uid, "title": format!("Dashboard {uid}"), "panels": [] }),
    }
}

/// `{a in Ops, b without folder}`
pub fn ops_scenario() -> Vec<DashboardRecord> {
    vec![dashboard("a", 7, "Ops"), dashboard("b", 0, "")]
}

/// Source whose dashboard set can be swapped between cycles
#[derive(Default)]
pub struct StaticSource {
    pub records: RefCell<Vec<DashboardRecord>>,
}

impl StaticSource {
    pub fn new(records: Vec<DashboardRecord>) -> Self {
        Self {
            records: RefCell::new(records),
        }
    }

    pub fn replace(&self, records: Vec<DashboardRecord>) {
        *self.records.borrow_mut() = records;
    }
}

impl DashboardSource for StaticSource {
    fn list_dashboards(&self, cancel: &CancellationToken) -> Result<Vec<DashboardRecord>> {
        cancel.check()?;
        Ok(self.records.borrow().clone())
    }
}

/// Configuration pointing at `remote`, saving into `dashboards/`
pub fn config_for(remote: &TestRemote) -> Config {
    Config {
        grafana_url: "http://127.0.0.1:3000".to_string(),
        grafana_token: "test-token".to_string(),
        ssh_url: remote.url(),
        ssh_key: PathBuf::from("unused"),
        ssh_key_password: None,
        ssh_user: "Sync Bot".to_string(),
        ssh_email: "sync-bot@example.com".to_string(),
        ssh_known_hosts_path: PathBuf::from("unused"),
        ssh_accept_unknown_hosts: true,
        repo_clone_path: remote.clone_path(),
        repo_save_path: PathBuf::from("dashboards"),
        base_branch: "main".to_string(),
        branch_prefix: "grafana-git-sync-".to_string(),
        branch_strategy: BranchStrategy::NewBranch,
        branch_ttl: Duration::from_secs(24 * 60 * 60),
        run_mode: RunMode::OneTime,
        sync_interval: Duration::from_secs(60),
        delete_missing: false,
        ignore_folder_structure: false,
        add_missing_newlines: false,
        dry_run: false,
        retry: RetryPolicy {
            enabled: true,
            max_attempts: 2,
            backoff_unit: Duration::from_millis(10),
        },
        log_level: log::LevelFilter::Info,
    }
}
