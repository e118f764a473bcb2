//! Core building blocks of the dashboard sync: configuration, the dashboard
//! source and version-control adapters, reconciliation and branch handling.

pub mod branch;
pub mod cancel;
pub mod config;
pub mod dashboard;
pub mod dirs;
pub mod error;
pub mod git;
pub mod grafana;
pub mod known_hosts;
pub mod logging;
pub mod output;
pub mod path_mapper;
pub mod reconcile;
pub mod retry;

// === Error handling ===
pub use error::{Result, SyncError};

// === Configuration ===
pub use config::{Config, RunMode};

// === Adapters ===
pub use dashboard::{DashboardRecord, DashboardSource};
pub use git::{GitAuth, GitRepo, VersionControl};
pub use grafana::GrafanaClient;

// === Sync building blocks ===
pub use branch::{BranchManager, BranchSession, BranchStrategy};
pub use cancel::CancellationToken;
pub use path_mapper::Layout;
pub use reconcile::{ApplyOutcome, ReconcileOptions, RepoSnapshot, SyncPlan};
pub use retry::RetryPolicy;

// === Output formatting ===
pub use output::{print_cycle_summary, print_error, print_info, print_success};
