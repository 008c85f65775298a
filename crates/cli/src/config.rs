use anyhow::{Context, Result};
use clap::Args;
use coinwatch_engine::TrackerConfig;
use coinwatch_sources_chromium::ChromiumConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings file layout:
///
/// ```toml
/// [browser]
/// url = "https://coinmarketcap.com/"
/// headless = true
/// viewport = { width = 1920, height = 1080 }
///
/// [tracker]
/// top_n = 20
/// interval_secs = 60
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub browser: ChromiumConfig,
    pub tracker: TrackerConfig,
}

/// Flags that override the settings file. Unset flags keep file values,
/// which in turn fall back to built-in defaults.
#[derive(Debug, Clone, Default, Args)]
pub struct TrackArgs {
    /// Run Chrome in headless mode
    #[arg(long)]
    pub headless: bool,

    /// Page holding the ranking table [default: https://coinmarketcap.com/]
    #[arg(long)]
    pub url: Option<String>,

    /// Number of top coins to scrape [default: 10]
    #[arg(long, alias = "topn")]
    pub top_n: Option<usize>,

    /// CSV output file [default: crypto_prices.csv]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Page load timeout in seconds [default: 30]
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Seconds between scrapes [default: 10]
    #[arg(long)]
    pub interval: Option<u64>,

    /// Show top K gainers each run, 0 disables [default: 5]
    #[arg(long)]
    pub show_gainers: Option<usize>,

    /// Show top K losers each run, 0 disables [default: 5]
    #[arg(long)]
    pub show_losers: Option<usize>,

    /// Minimum price filter
    #[arg(long)]
    pub min_price: Option<f64>,

    /// Maximum price filter
    #[arg(long)]
    pub max_price: Option<f64>,

    /// Screenshot path used when the table fails to load [default: debug_timeout.png]
    #[arg(long)]
    pub screenshot: Option<PathBuf>,

    /// Stop after N cycles, 0 runs until interrupted [default: 0]
    #[arg(long)]
    pub max_cycles: Option<u64>,
}

impl Settings {
    /// Read a TOML settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Layer command-line overrides on top of the loaded values.
    pub fn apply(&mut self, args: &TrackArgs) {
        if args.headless {
            self.browser.headless = true;
        }
        if let Some(url) = &args.url {
            self.browser.url = url.clone();
        }

        let t = &mut self.tracker;
        override_with(&mut t.top_n, args.top_n);
        override_with(&mut t.output, args.output.clone());
        override_with(&mut t.timeout_secs, args.timeout);
        override_with(&mut t.interval_secs, args.interval);
        override_with(&mut t.show_gainers, args.show_gainers);
        override_with(&mut t.show_losers, args.show_losers);
        override_with(&mut t.screenshot, args.screenshot.clone());
        override_with(&mut t.max_cycles, args.max_cycles);
        if args.min_price.is_some() {
            t.min_price = args.min_price;
        }
        if args.max_price.is_some() {
            t.max_price = args.max_price;
        }

        // CDP commands such as a reload must not outlive the page load timeout.
        if self.browser.request_timeout_secs.is_none() {
            self.browser.request_timeout_secs = Some(self.tracker.timeout_secs);
        }
    }
}

fn override_with<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}
