//! Predicates over CLI output and helpers for checking files on disk.

#![allow(dead_code)]

use predicates::prelude::*;
use std::path::Path;

/// Error output naming a missing environment variable
pub fn missing_variable(name: &str) -> impl Predicate<str> {
    predicates::str::contains(format!("required environment variable {name} is not set"))
}

pub fn has_error_prefix() -> impl Predicate<str> {
    predicates::str::contains("Error:")
}

/// Parse a dashboard file written by the sync
pub fn read_dashboard(path: &Path) -> anyhow::Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
