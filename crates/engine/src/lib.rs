pub mod config;
pub mod report;
pub mod tracker;

pub use config::{ConfigError, TrackerConfig};
pub use tracker::{ExitReason, RunSummary, Tracker, TrackerState};
