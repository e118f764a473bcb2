//! Dashboard records and the source they are fetched from.

use crate::core::cancel::CancellationToken;
use crate::core::error::Result;
use serde::{Deserialize, Serialize};

/// Folder id Grafana reports for dashboards that live outside any folder.
pub const NO_FOLDER_ID: i64 = 0;

/// One dashboard as reported by the source. The definition payload is kept
/// opaque; only the metadata below is ever interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardRecord {
    pub uid: String,
    pub title: String,
    pub folder_id: i64,
    pub folder_title: String,
    pub definition: serde_json::Value,
}

impl DashboardRecord {
    pub fn has_folder(&self) -> bool {
        self.folder_id != NO_FOLDER_ID
    }
}

/// Anything that can produce the full current dashboard set.
pub trait DashboardSource {
    fn list_dashboards(&self, cancel: &CancellationToken) -> Result<Vec<DashboardRecord>>;
}
