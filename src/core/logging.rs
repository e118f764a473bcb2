//! Logger setup on top of `env_logger`.

use env_logger::{Builder, Env, Target};
use log::LevelFilter;

/// Level to run at: `--debug` wins over the configured `LOG_LEVEL`
pub fn effective_level(configured: LevelFilter, debug: bool) -> LevelFilter {
    if debug {
        LevelFilter::Debug
    } else {
        configured
    }
}

/// Install the global logger. `RUST_LOG`, when set, still overrides `level`.
pub fn init(level: LevelFilter) {
    let default_filter = level.to_string().to_lowercase();
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_filter));
    builder.target(Target::Stderr).format_timestamp_secs();
    // A second init (tests, repeated calls) is harmless.
    let _ = builder.try_init();
}
