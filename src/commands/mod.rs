pub mod sync;

pub use sync::{run_once, run_periodic, CycleReport, Syncer};
