//! Deterministic, filesystem-safe placement of dashboards on disk.
//!
//! # Layouts
//! - **Hierarchical**: `base/<sanitized folder title>/<uid>.json`; dashboards
//!   without a folder go straight to `base/<uid>.json`.
//! - **Flat**: `base/<uid>.json`, folder metadata ignored.
//!
//! Folder titles are sanitized so they always form exactly one path segment:
//! separators and other reserved characters become `-`, titles made only of
//! dots (`.`, `..`) are neutralised, and `.git` never survives as a segment.

use crate::core::dashboard::DashboardRecord;
use std::path::{Path, PathBuf};

/// Extension of every file the mapper produces, and the only one reconciled.
pub const DASHBOARD_EXTENSION: &str = "json";

const RESERVED: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Segment git refuses to stage below the work tree root
const GIT_DIR: &str = ".git";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Hierarchical,
    Flat,
}

impl Layout {
    pub fn from_ignore_folders(ignore_folder_structure: bool) -> Self {
        if ignore_folder_structure {
            Layout::Flat
        } else {
            Layout::Hierarchical
        }
    }
}

/// Replace reserved and control characters with `-` and trim whitespace.
///
/// Idempotent: `sanitize_folder(&sanitize_folder(x)) == sanitize_folder(x)`.
pub fn sanitize_folder(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| {
            if RESERVED.contains(&c) || (c as u32) < 0x20 {
                '-'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        return "-".to_string();
    }
    if trimmed.chars().all(|c| c == '.') {
        return "-".repeat(trimmed.chars().count());
    }
    if trimmed.eq_ignore_ascii_case(GIT_DIR) {
        return format!("-{}", &trimmed[1..]);
    }
    trimmed.to_string()
}

/// File name of a dashboard, independent of layout
pub fn file_name(record: &DashboardRecord) -> String {
    format!("{}.{}", sanitize_folder(&record.uid), DASHBOARD_EXTENSION)
}

/// Path of `record` relative to the save directory
pub fn relative_path(record: &DashboardRecord, layout: Layout) -> PathBuf {
    match layout {
        Layout::Hierarchical if record.has_folder() => {
            PathBuf::from(sanitize_folder(&record.folder_title)).join(file_name(record))
        }
        _ => PathBuf::from(file_name(record)),
    }
}

/// Full path of `record` under `base`
pub fn map(base: &Path, record: &DashboardRecord, layout: Layout) -> PathBuf {
    base.join(relative_path(record, layout))
}
