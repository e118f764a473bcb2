//! Reconciliation of the fetched dashboard set against the save directory.
//!
//! A cycle goes through three steps:
//! 1. [`RepoSnapshot::scan`] lists every dashboard file already on disk.
//! 2. [`plan`] maps each record to its target path and derives the delete set
//!    as `snapshot \ wanted`.
//! 3. [`apply`] removes stale files, prunes directories left empty, then
//!    rewrites every dashboard.
//!
//! Files are always rewritten: serialization is deterministic, so an unchanged
//! dashboard produces byte-identical content and git sees no change.

use crate::core::cancel::CancellationToken;
use crate::core::dashboard::DashboardRecord;
use crate::core::error::{Result, SyncError};
use crate::core::path_mapper::{self, Layout, DASHBOARD_EXTENSION};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub layout: Layout,
    pub delete_missing: bool,
    pub add_trailing_newline: bool,
}

/// Dashboard files currently present under the save directory, relative to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoSnapshot {
    pub files: BTreeSet<PathBuf>,
}

impl RepoSnapshot {
    pub fn scan(save_dir: &Path) -> Result<Self> {
        let mut files = BTreeSet::new();
        if !save_dir.exists() {
            return Ok(Self { files });
        }

        for entry in WalkDir::new(save_dir)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_git_dir(e))
        {
            let entry = entry.map_err(|e| SyncError::walk(save_dir, e))?;
            if !entry.file_type().is_file() || !has_dashboard_extension(entry.path()) {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(save_dir) {
                files.insert(relative.to_path_buf());
            }
        }

        Ok(Self { files })
    }

    pub fn contains(&self, relative: &Path) -> bool {
        self.files.contains(relative)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWrite<'a> {
    pub record: &'a DashboardRecord,
    pub path: PathBuf,
}

/// What a cycle will do to the save directory. Paths are relative to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan<'a> {
    pub writes: Vec<PlannedWrite<'a>>,
    pub deletes: BTreeSet<PathBuf>,
}

impl SyncPlan<'_> {
    pub fn wanted(&self) -> BTreeSet<&Path> {
        self.writes.iter().map(|w| w.path.as_path()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub written: usize,
    pub deleted: usize,
    pub pruned_dirs: Vec<PathBuf>,
}

impl ApplyOutcome {
    /// Files written plus files deleted
    pub fn affected(&self) -> usize {
        self.written + self.deleted
    }
}

pub fn plan<'a>(
    records: &'a [DashboardRecord],
    snapshot: &RepoSnapshot,
    options: &ReconcileOptions,
) -> SyncPlan<'a> {
    let writes: Vec<PlannedWrite<'a>> = records
        .iter()
        .map(|record| PlannedWrite {
            record,
            path: path_mapper::relative_path(record, options.layout),
        })
        .collect();

    let deletes = if options.delete_missing {
        let wanted: BTreeSet<&Path> = writes.iter().map(|w| w.path.as_path()).collect();
        snapshot
            .files
            .iter()
            .filter(|existing| !wanted.contains(existing.as_path()))
            .cloned()
            .collect()
    } else {
        BTreeSet::new()
    };

    SyncPlan { writes, deletes }
}

/// Serialize a dashboard definition the way it is stored on disk
pub fn render(record: &DashboardRecord, add_trailing_newline: bool) -> Result<Vec<u8>> {
    let mut data = serde_json::to_vec_pretty(&record.definition)
        .map_err(|e| SyncError::encode(format!("dashboard {}", record.uid), e))?;
    if add_trailing_newline && data.last().is_some_and(|b| *b != b'\n') {
        data.push(b'\n');
    }
    Ok(data)
}

/// Apply `plan` under `save_dir`. Deletes and prunes first, then writes.
///
/// On failure the returned error is a [`SyncError::Partial`] carrying the
/// number of files already written and deleted.
pub fn apply(
    save_dir: &Path,
    plan: &SyncPlan<'_>,
    options: &ReconcileOptions,
    cancel: &CancellationToken,
) -> Result<ApplyOutcome> {
    let mut outcome = ApplyOutcome::default();

    match apply_steps(save_dir, plan, options, cancel, &mut outcome) {
        Ok(()) => Ok(outcome),
        Err(e) => Err(SyncError::partial(outcome.written, outcome.deleted, e)),
    }
}

fn apply_steps(
    save_dir: &Path,
    plan: &SyncPlan<'_>,
    options: &ReconcileOptions,
    cancel: &CancellationToken,
    outcome: &mut ApplyOutcome,
) -> Result<()> {
    for relative in &plan.deletes {
        cancel.check()?;
        let full = save_dir.join(relative);
        fs::remove_file(&full).map_err(|e| SyncError::io(&full, e))?;
        outcome.deleted += 1;
        log::info!("Deleted missing dashboard file {}", relative.display());
    }

    if options.delete_missing && options.layout == Layout::Hierarchical {
        outcome.pruned_dirs = prune_empty_dirs(save_dir)?;
    }

    for write in &plan.writes {
        cancel.check()?;
        let full = save_dir.join(&write.path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
        }
        let data = render(write.record, options.add_trailing_newline)?;
        fs::write(&full, data).map_err(|e| SyncError::io(&full, e))?;
        outcome.written += 1;
        log::debug!(
            "Saved dashboard {} ({}) to {}",
            write.record.uid,
            write.record.folder_title,
            write.path.display()
        );
    }

    Ok(())
}

/// Remove every directory under `root` that is empty once its children have
/// been pruned. `root` itself and `.git` are never touched.
pub fn prune_empty_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    if !root.exists() {
        return Ok(removed);
    }

    for entry in WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_git_dir(e))
    {
        let entry = entry.map_err(|e| SyncError::walk(root, e))?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        let mut children = fs::read_dir(path).map_err(|e| SyncError::io(path, e))?;
        if children.next().is_none() {
            fs::remove_dir(path).map_err(|e| SyncError::io(path, e))?;
            log::info!("Removed empty directory {}", path.display());
            removed.push(path.to_path_buf());
        }
    }

    Ok(removed)
}

/// Scan, plan and apply in one go
pub fn reconcile(
    save_dir: &Path,
    records: &[DashboardRecord],
    options: &ReconcileOptions,
    cancel: &CancellationToken,
) -> Result<ApplyOutcome> {
    let snapshot = RepoSnapshot::scan(save_dir).map_err(|e| SyncError::partial(0, 0, e))?;
    let plan = plan(records, &snapshot, options);
    log::debug!(
        "Sync plan: {} to write, {} to delete under {}",
        plan.writes.len(),
        plan.deletes.len(),
        save_dir.display()
    );
    apply(save_dir, &plan, options, cancel)
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == ".git"
}

fn has_dashboard_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == DASHBOARD_EXTENSION)
}
