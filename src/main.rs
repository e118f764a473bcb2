use anyhow::Context;
use clap::Parser;
use grafana_git_sync::commands::{run_once, run_periodic, Syncer};
use grafana_git_sync::core::{
    cancel::CancellationToken,
    config::{Config, RunMode},
    error::{Result, SyncError},
    git::GitRepo,
    grafana::GrafanaClient,
    logging, print_cycle_summary, print_error, print_info,
    retry::retry,
};
use std::process::ExitCode;

const EXIT_FAILURE: u8 = 1;
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "grafana-git-sync")]
#[command(about = "Sync Grafana dashboards into a git repository")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Commit locally but never push
    #[arg(long)]
    dry_run: bool,

    /// Run a single sync cycle regardless of RUN_MODE
    #[arg(long)]
    once: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            logging::init(logging::effective_level(log::LevelFilter::Info, cli.debug));
            log::error!("Invalid configuration: {e}");
            print_error(&e.to_string());
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    logging::init(logging::effective_level(config.log_level, cli.debug));
    log::debug!("Loaded configuration: {config:?}");
    if config.dry_run {
        print_info("Dry run: changes are committed locally but never pushed");
    }

    let cancel = CancellationToken::new();
    let (grafana, repo) = match start(&config, &cancel) {
        Ok(adapters) => adapters,
        Err(e) => {
            print_error(&format!("{e:#}"));
            let cancelled = e
                .downcast_ref::<SyncError>()
                .is_some_and(SyncError::is_cancelled);
            return ExitCode::from(if cancelled { EXIT_CANCELLED } else { EXIT_FAILURE });
        }
    };

    let run_mode = config.run_mode;
    let interval = config.sync_interval;
    let mut syncer = Syncer::new(config, grafana, repo, cancel);

    match run_mode {
        RunMode::OneTime => match run_once(&mut syncer) {
            Ok(report) => {
                print_cycle_summary(&report);
                ExitCode::SUCCESS
            }
            Err(e) if e.is_cancelled() => {
                log::warn!("Sync cancelled: {e}");
                ExitCode::from(EXIT_CANCELLED)
            }
            Err(e) => {
                log::error!("Sync failed: {e}");
                print_error(&e.to_string());
                ExitCode::from(EXIT_FAILURE)
            }
        },
        RunMode::Periodic => {
            log::info!("Starting periodic sync every {interval:?}");
            match run_periodic(&mut syncer, interval) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    print_error(&e.to_string());
                    ExitCode::from(EXIT_FAILURE)
                }
            }
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env()?;
    if cli.dry_run {
        config.dry_run = true;
    }
    if cli.once {
        config.run_mode = RunMode::OneTime;
    }
    config.validate()?;
    Ok(config)
}

fn start(config: &Config, cancel: &CancellationToken) -> anyhow::Result<(GrafanaClient, GitRepo)> {
    spawn_signal_listener(cancel.clone()).context("failed to install signal handlers")?;

    let grafana = GrafanaClient::new(&config.grafana_url, config.grafana_token.clone())?;
    let repo = retry("clone repository", &config.retry, cancel, || {
        GitRepo::open_or_clone(&config.ssh_url, &config.repo_clone_path, config.git_auth())
    })?;
    Ok((grafana, repo))
}

/// Cancel `cancel` on SIGINT or SIGTERM from a dedicated thread
fn spawn_signal_listener(cancel: CancellationToken) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    std::thread::Builder::new()
        .name("signal-listener".to_string())
        .spawn(move || {
            runtime.block_on(wait_for_shutdown());
            log::info!("Shutdown signal received, cancelling");
            cancel.cancel();
        })?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            log::warn!("Cannot listen for SIGTERM: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
