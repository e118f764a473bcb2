//! The sync cycle driver.
//!
//! One cycle runs `checkout branch -> fetch dashboards -> save dashboards ->
//! commit and push`, with every remote-facing stage wrapped in [`retry`]. The
//! driver owns the current [`BranchSession`] and carries it from one cycle to
//! the next.

use crate::core::{
    branch::{BranchManager, BranchSession},
    cancel::CancellationToken,
    config::Config,
    dashboard::DashboardSource,
    error::{Result, SyncError},
    git::VersionControl,
    reconcile::{self, ApplyOutcome},
    retry::retry,
};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// What a completed cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub branch: String,
    pub rotated: bool,
    pub fetched: usize,
    pub written: usize,
    pub deleted: usize,
    pub committed: bool,
    pub pushed: bool,
}

impl CycleReport {
    pub fn affected(&self) -> usize {
        self.written + self.deleted
    }
}

pub struct Syncer<S, V> {
    config: Config,
    source: S,
    vcs: V,
    branches: BranchManager,
    session: Option<BranchSession>,
    cancel: CancellationToken,
}

impl<S, V> Syncer<S, V>
where
    S: DashboardSource,
    V: VersionControl,
{
    pub fn new(config: Config, source: S, vcs: V, cancel: CancellationToken) -> Self {
        let branches = config.branch_manager();
        Self {
            config,
            source,
            vcs,
            branches,
            session: None,
            cancel,
        }
    }

    pub fn session(&self) -> Option<&BranchSession> {
        self.session.as_ref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        self.run_cycle_at(Utc::now())
    }

    /// Run one cycle as if it started at `now`
    pub fn run_cycle_at(&mut self, now: DateTime<Utc>) -> Result<CycleReport> {
        let (session, rotated) = self.branches.next_session(self.session.take(), now);
        let branch = session.name.clone();
        self.session = Some(session);

        self.checkout_branch(&branch)
            .map_err(|e| SyncError::operation("checkout branch", e))?;

        let dashboards = retry(
            "fetch dashboards",
            &self.config.retry,
            &self.cancel,
            || self.source.list_dashboards(&self.cancel),
        )?;
        log::info!("Fetched {} dashboards", dashboards.len());

        let save_dir = self.config.save_dir();
        let options = self.config.reconcile_options();
        let outcome: ApplyOutcome = retry("save dashboards", &self.config.retry, &self.cancel, || {
            reconcile::reconcile(&save_dir, &dashboards, &options, &self.cancel)
        })
        .inspect_err(|e| {
            if let Some((written, deleted)) = e.progress() {
                log::warn!(
                    "Save stage aborted after {written} written and {deleted} deleted; nothing will be committed"
                );
            }
        })?;
        log::debug!(
            "Saved {} dashboards, deleted {} files under {}",
            outcome.written,
            outcome.deleted,
            save_dir.display()
        );

        let mut report = CycleReport {
            branch: branch.clone(),
            rotated,
            fetched: dashboards.len(),
            written: outcome.written,
            deleted: outcome.deleted,
            ..CycleReport::default()
        };

        if report.affected() == 0 {
            log::info!("No changes to commit");
            return Ok(report);
        }

        let (committed, pushed) = self.commit_and_push(&branch)?;
        report.committed = committed;
        report.pushed = pushed;

        if let Some(session) = self.session.as_mut() {
            session.record_changes(outcome.written);
        }
        if committed {
            log::info!(
                "Committed {} dashboard changes on {}{}",
                report.affected(),
                branch,
                if pushed { " and pushed" } else { "" }
            );
        } else {
            log::info!("Dashboards unchanged since last commit on {branch}");
        }
        Ok(report)
    }

    fn checkout_branch(&self, branch: &str) -> Result<()> {
        if self.vcs.branch_exists(branch)? {
            self.vcs.checkout_existing(branch)
        } else {
            self.vcs
                .checkout_new_from(&self.config.base_branch, branch)
                .map(|_| ())
        }
    }

    fn commit_and_push(&self, branch: &str) -> Result<(bool, bool)> {
        let mut committed = false;
        let pushed = retry(
            "commit and push changes",
            &self.config.retry,
            &self.cancel,
            || {
                committed |= self
                    .vcs
                    .commit_all(&self.config.ssh_user, &self.config.ssh_email)?;
                if self.config.dry_run {
                    log::info!("Dry run mode: changes committed but not pushed");
                    return Ok(false);
                }
                self.vcs.push(branch)?;
                Ok(true)
            },
        )?;
        Ok((committed, pushed))
    }
}

/// Run a single cycle
pub fn run_once<S, V>(syncer: &mut Syncer<S, V>) -> Result<CycleReport>
where
    S: DashboardSource,
    V: VersionControl,
{
    syncer.run_cycle()
}

/// Wait left before the next tick once a cycle has taken `elapsed`
fn time_to_next_tick(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Run a cycle now and then on every `interval` tick until cancelled. Ticks are
/// measured from cycle start; a cycle that overruns starts the next one at once.
/// A failed cycle is logged and the loop carries on.
pub fn run_periodic<S, V>(syncer: &mut Syncer<S, V>, interval: Duration) -> Result<()>
where
    S: DashboardSource,
    V: VersionControl,
{
    let cancel = syncer.cancel_token().clone();
    loop {
        let started = Instant::now();
        match syncer.run_cycle() {
            Ok(report) => log::debug!("Cycle finished: {report:?}"),
            Err(e) if e.is_cancelled() => {
                log::info!("Sync cycle cancelled");
                return Ok(());
            }
            Err(e) if e.is_transient() => {
                log::warn!("Periodic sync failed, will try again next cycle: {e}")
            }
            Err(e) => log::error!("Periodic sync failed: {e}"),
        }

        let wait = time_to_next_tick(interval, started.elapsed());
        if wait.is_zero() {
            log::warn!("Sync cycle took longer than {interval:?}, starting the next one now");
        }
        if cancel.wait_timeout(wait) {
            log::info!("Shutdown requested, stopping periodic sync");
            return Ok(());
        }
    }
}
