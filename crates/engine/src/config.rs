use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Errors from validating a [`TrackerConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Settings for the polling loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Number of ranked entries to extract per cycle.
    pub top_n: usize,
    /// CSV log the snapshots are appended to.
    pub output: PathBuf,
    /// Seconds to wait for the table to render.
    pub timeout_secs: u64,
    /// Seconds between cycles.
    pub interval_secs: u64,
    /// Gainers to print per cycle (0 disables the view).
    pub show_gainers: usize,
    /// Losers to print per cycle (0 disables the view).
    pub show_losers: usize,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Screenshot written when the table fails to render in time.
    pub screenshot: PathBuf,
    /// Stop after this many cycles (0 = run until interrupted).
    pub max_cycles: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            output: PathBuf::from("crypto_prices.csv"),
            timeout_secs: 30,
            interval_secs: 10,
            show_gainers: 5,
            show_losers: 5,
            min_price: None,
            max_price: None,
            screenshot: PathBuf::from("debug_timeout.png"),
            max_cycles: 0,
        }
    }
}

impl TrackerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Whether either price bound is set.
    pub fn has_price_filter(&self) -> bool {
        self.min_price.is_some() || self.max_price.is_some()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_n == 0 {
            return Err(invalid("top_n", "must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs", "must be at least 1 second"));
        }
        if self.interval_secs == 0 {
            return Err(invalid("interval_secs", "must be at least 1 second"));
        }
        for (field, bound) in [("min_price", self.min_price), ("max_price", self.max_price)] {
            if let Some(v) = bound {
                if !v.is_finite() {
                    return Err(invalid(field, "must be a finite number"));
                }
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_price, self.max_price) {
            if lo > hi {
                return Err(invalid(
                    "min_price",
                    &format!("{} is greater than max_price {}", lo, hi),
                ));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
