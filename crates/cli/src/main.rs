mod config;

use anyhow::Result;
use clap::Parser;
use coinwatch_data::CsvLog;
use coinwatch_engine::{ExitReason, Tracker};
use coinwatch_sources_chromium::ChromiumSource;
use std::future::Future;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Settings, TrackArgs};

#[derive(Parser)]
#[command(name = "coinwatch")]
#[command(about = "Cryptocurrency price tracker: scrape the top coins on an interval, log them to CSV and print gainers, losers and price filters")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// TOML settings file; flags override its values
    #[arg(short, long, env = "COINWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    track: TrackArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    if cli.log_json {
        fmt().json().with_env_filter(filter).with_target(false).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.apply(&cli.track);
    settings.tracker.validate()?;

    tracing::info!(
        url = %settings.browser.url,
        top_n = settings.tracker.top_n,
        output = %settings.tracker.output.display(),
        interval_secs = settings.tracker.interval_secs,
        "Starting tracker"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match relay_interrupts(tokio::signal::ctrl_c, shutdown_tx).await {
            Ok(()) => std::process::exit(130),
            Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    let sink = CsvLog::new(settings.tracker.output.clone());
    let browser = settings.browser;
    let summary = Tracker::new(settings.tracker, sink, shutdown_rx)
        .run(move || async move { ChromiumSource::launch(&browser).await })
        .await;

    match summary.exit {
        ExitReason::Fatal(reason) => anyhow::bail!("Tracking aborted: {}", reason),
        ExitReason::Cancelled | ExitReason::CycleLimit => Ok(()),
    }
}

/// Request a graceful stop on the first interrupt. Returns on the second,
/// after which the caller exits without waiting for the current cycle.
async fn relay_interrupts<F, Fut>(
    mut next_interrupt: F,
    shutdown: watch::Sender<bool>,
) -> std::io::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    next_interrupt().await?;
    tracing::info!("Interrupt received, stopping after the current step (Ctrl-C again to force quit)");
    let _ = shutdown.send(true);

    next_interrupt().await?;
    tracing::warn!("Second interrupt, exiting immediately");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_tracking_flags() {
        let cli = Cli::try_parse_from([
            "coinwatch",
            "--headless",
            "--top-n",
            "20",
            "--interval",
            "60",
            "--show-gainers",
            "0",
            "--min-price",
            "0.5",
        ])
        .unwrap();

        assert!(cli.track.headless);
        assert_eq!(cli.track.top_n, Some(20));
        assert_eq!(cli.track.interval, Some(60));
        assert_eq!(cli.track.show_gainers, Some(0));
        assert_eq!(cli.track.min_price, Some(0.5));
        assert!(cli.track.max_price.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_topn_alias() {
        let cli = Cli::try_parse_from(["coinwatch", "--topn", "7"]).unwrap();
        assert_eq!(cli.track.top_n, Some(7));
    }

    #[tokio::test]
    async fn test_first_interrupt_requests_shutdown_and_waits() {
        let (tx, rx) = watch::channel(false);
        let mut calls = 0;
        let interrupts = move || {
            calls += 1;
            let first = calls == 1;
            async move {
                if first {
                    Ok(())
                } else {
                    std::future::pending::<std::io::Result<()>>().await
                }
            }
        };

        let relayed = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            relay_interrupts(interrupts, tx),
        )
        .await;
        assert!(relayed.is_err());
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_second_interrupt_returns() {
        let (tx, rx) = watch::channel(false);
        let relayed = relay_interrupts(|| async { Ok(()) }, tx).await;
        assert!(relayed.is_ok());
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_interrupt_listener_failure_propagates() {
        let (tx, rx) = watch::channel(false);
        let relayed = relay_interrupts(
            || async { Err(std::io::Error::new(std::io::ErrorKind::Other, "no signal handler")) },
            tx,
        )
        .await;
        assert!(relayed.is_err());
        assert!(!*rx.borrow());
    }

    #[test]
    fn test_rejects_non_numeric_top_n() {
        assert!(Cli::try_parse_from(["coinwatch", "--top-n", "ten"]).is_err());
    }
}
