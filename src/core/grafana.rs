//! Grafana HTTP API client used as the dashboard source.
//!
//! A full listing takes `2 + n` requests: the folder list, a dashboard search,
//! then one definition fetch per dashboard. Cancellation is checked between the
//! per-dashboard requests.

use crate::core::cancel::CancellationToken;
use crate::core::dashboard::{DashboardRecord, DashboardSource, NO_FOLDER_ID};
use crate::core::error::{Result, SyncError};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct FolderHit {
    id: i64,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    uid: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "folderId", alias = "folderID", default)]
    folder_id: i64,
    #[serde(rename = "folderTitle", default)]
    folder_title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DashboardEnvelope {
    dashboard: serde_json::Value,
}

pub struct GrafanaClient {
    http: Client,
    base_url: reqwest::Url,
    token: String,
}

impl GrafanaClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let base_url = reqwest::Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| SyncError::invalid_variable("GRAFANA_URL", base_url, e.to_string()))?;
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("grafana-git-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            token: token.into(),
        })
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut url = self.base_url.clone();
        let full_path = format!("{}{}", url.path().trim_end_matches('/'), path);
        url.set_path(&full_path);
        let response = self
            .http
            .get(url.clone())
            .query(query)
            .bearer_auth(&self.token)
            .send()?;
        let body = check_status(response, url.as_str())?.text()?;
        serde_json::from_str(&body).map_err(|e| SyncError::decode(format!("response from {path}"), e))
    }

    fn folder_titles(&self) -> Result<HashMap<i64, String>> {
        let folders: Vec<FolderHit> = self.get_json("/api/folders", &[("limit", "1000")])?;
        Ok(folders.into_iter().map(|f| (f.id, f.title)).collect())
    }

    fn search_dashboards(&self) -> Result<Vec<SearchHit>> {
        self.get_json("/api/search", &[("type", "dash-db"), ("limit", "5000")])
    }

    fn dashboard_definition(&self, uid: &str) -> Result<serde_json::Value> {
        let envelope: DashboardEnvelope =
            self.get_json(&format!("/api/dashboards/uid/{uid}"), &[])?;
        Ok(envelope.dashboard)
    }
}

impl DashboardSource for GrafanaClient {
    fn list_dashboards(&self, cancel: &CancellationToken) -> Result<Vec<DashboardRecord>> {
        let folders = self.folder_titles()?;
        let hits = self.search_dashboards()?;
        log::debug!("Found {} dashboards in {} folders", hits.len(), folders.len());

        let mut records = Vec::with_capacity(hits.len());
        for hit in hits {
            cancel.check()?;
            let definition = self.dashboard_definition(&hit.uid)?;
            let folder_title = if hit.folder_id == NO_FOLDER_ID {
                String::new()
            } else {
                folders
                    .get(&hit.folder_id)
                    .cloned()
                    .or(hit.folder_title)
                    .unwrap_or_default()
            };
            records.push(DashboardRecord {
                uid: hit.uid,
                title: hit.title,
                folder_id: hit.folder_id,
                folder_title,
                definition,
            });
        }
        Ok(records)
    }
}

fn check_status(response: Response, url: &str) -> Result<Response> {
    let status = response.status();
    match status {
        s if s.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SyncError::GrafanaAuth {
            status: status.as_u16(),
            url: url.to_string(),
        }),
        _ => Err(SyncError::GrafanaStatus {
            status: status.as_u16(),
            url: url.to_string(),
        }),
    }
}
