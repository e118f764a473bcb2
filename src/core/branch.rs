//! Working-branch lifecycle across sync cycles.
//!
//! The [`BranchManager`] is stateless; the current [`BranchSession`] is owned by
//! the sync driver and handed to [`BranchManager::next_session`] at the start of
//! every cycle.
//!
//! # Rotation rule
//! A new session is created when the strategy is [`BranchStrategy::NewBranch`],
//! when no session exists yet, or when a [`BranchStrategy::ReuseBranch`]
//! session is older than the configured TTL.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;

/// Second-resolution timestamp appended to the branch prefix
pub const BRANCH_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchStrategy {
    NewBranch,
    ReuseBranch,
}

impl FromStr for BranchStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new-branch" => Ok(Self::NewBranch),
            "reuse-branch" => Ok(Self::ReuseBranch),
            _ => Err("expected new-branch or reuse-branch".to_string()),
        }
    }
}

impl fmt::Display for BranchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewBranch => write!(f, "new-branch"),
            Self::ReuseBranch => write!(f, "reuse-branch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSession {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub change_count: usize,
}

impl BranchSession {
    pub fn record_changes(&mut self, count: usize) {
        self.change_count += count;
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchManager {
    prefix: String,
    strategy: BranchStrategy,
    ttl: Duration,
}

impl BranchManager {
    pub fn new(prefix: impl Into<String>, strategy: BranchStrategy, ttl: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            strategy,
            ttl,
        }
    }

    pub fn strategy(&self) -> BranchStrategy {
        self.strategy
    }

    pub fn branch_name(&self, at: DateTime<Utc>) -> String {
        format!("{}{}", self.prefix, at.format(BRANCH_TIMESTAMP_FORMAT))
    }

    pub fn should_rotate(&self, current: Option<&BranchSession>, now: DateTime<Utc>) -> bool {
        match (self.strategy, current) {
            (BranchStrategy::NewBranch, _) | (_, None) => true,
            (BranchStrategy::ReuseBranch, Some(session)) => session.age(now) > self.ttl,
        }
    }

    /// Session to use for the cycle starting at `now`, and whether it is new.
    pub fn next_session(
        &self,
        current: Option<BranchSession>,
        now: DateTime<Utc>,
    ) -> (BranchSession, bool) {
        match current {
            Some(session) if !self.should_rotate(Some(&session), now) => (session, false),
            previous => {
                let session = BranchSession {
                    name: self.branch_name(now),
                    created_at: now,
                    change_count: 0,
                };
                match previous {
                    Some(old) => log::info!(
                        "Rotating branch {} ({} changes) to {}",
                        old.name,
                        old.change_count,
                        session.name
                    ),
                    None => log::info!("Starting branch session {}", session.name),
                }
                (session, true)
            }
        }
    }
}
