//! grafana-git-sync - mirror Grafana dashboards into a git repository.
//!
//! Each sync cycle fetches every dashboard from Grafana, writes them as JSON
//! files into a clone, optionally removes files for dashboards that no longer
//! exist, then commits and pushes the result to a sync branch.
//!
//! # Public API
//! - [`Syncer`] drives cycles over any [`DashboardSource`] and [`VersionControl`]
//! - [`GrafanaClient`] and [`GitRepo`] are the production adapters
//! - [`Config`] is loaded from the environment

pub mod commands;
pub mod core;

pub use commands::{run_once, run_periodic, CycleReport, Syncer};
pub use core::{
    BranchManager, BranchSession, BranchStrategy, CancellationToken, Config, DashboardRecord,
    DashboardSource, GitAuth, GitRepo, GrafanaClient, Layout, ReconcileOptions, Result,
    RetryPolicy, RunMode, SyncError, VersionControl,
};
