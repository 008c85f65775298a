use chrono::Local;
use coinwatch_core::*;
use coinwatch_sources_common::Extractor;
use std::future::Future;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::TrackerConfig;
use crate::report;

/// Lifecycle of a tracking run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Starting,
    Ready,
    Polling,
    Idle,
    Closing,
    Closed,
}

/// Why the run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Shutdown was requested.
    Cancelled,
    /// The configured number of cycles completed.
    CycleLimit,
    /// The session could not be acquired or was lost.
    Fatal(String),
}

/// Counters reported when the run ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    /// Cycles that yielded no records (timeout or empty table).
    pub degraded_cycles: u64,
    /// Cycles aborted by a recoverable error.
    pub failed_cycles: u64,
    pub rows_written: u64,
    pub exit: ExitReason,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            cycles: 0,
            degraded_cycles: 0,
            failed_cycles: 0,
            rows_written: 0,
            exit: ExitReason::Cancelled,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.exit, ExitReason::Fatal(_))
    }
}

/// Errors that end a single cycle early.
#[derive(Debug, thiserror::Error)]
enum CycleError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl CycleError {
    fn is_fatal(&self) -> bool {
        matches!(self, CycleError::Source(e) if e.is_fatal())
    }
}

/// Drives the poll, persist, report, sleep cycle over one page session.
///
/// The session is acquired once at start and released exactly once when the
/// run ends, whatever ended it.
pub struct Tracker<K: RecordSink> {
    config: TrackerConfig,
    extractor: Extractor,
    sink: K,
    shutdown: watch::Receiver<bool>,
    summary: RunSummary,
}

impl<K: RecordSink> Tracker<K> {
    /// `shutdown` flipping to `true` stops the run at the next cycle or sleep
    /// boundary.
    pub fn new(config: TrackerConfig, sink: K, shutdown: watch::Receiver<bool>) -> Self {
        let extractor = Extractor::new(config.screenshot.clone());
        Self {
            config,
            extractor,
            sink,
            shutdown,
            summary: RunSummary::new(),
        }
    }

    /// Run until shutdown, the cycle limit, or a fatal session error.
    pub async fn run<S, L, Fut>(mut self, launch: L) -> RunSummary
    where
        S: PageSource,
        L: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, SourceError>>,
    {
        let mut state = TrackerState::Starting;
        debug!(?state, "Tracker state");

        let mut session = match launch().await {
            Ok(source) => {
                println!(
                    "\n[{}] Browser ready. Starting continuous tracking...",
                    Local::now().format("%Y-%m-%d %H:%M:%S")
                );
                state = TrackerState::Ready;
                Some(source)
            }
            Err(e) => {
                error!(error = %e, "Failed to start page session");
                self.summary.exit = ExitReason::Fatal(e.to_string());
                state = TrackerState::Closing;
                None
            }
        };

        loop {
            debug!(?state, "Tracker state");
            state = match state {
                TrackerState::Starting | TrackerState::Ready => TrackerState::Polling,
                TrackerState::Polling => match session.as_mut() {
                    Some(source) => self.poll(source).await,
                    None => TrackerState::Closing,
                },
                TrackerState::Idle => self.idle().await,
                TrackerState::Closing => {
                    if let Some(mut source) = session.take() {
                        match source.close().await {
                            Ok(()) => println!("Browser closed."),
                            Err(e) => warn!(error = %e, "Failed to close page session"),
                        }
                    }
                    TrackerState::Closed
                }
                TrackerState::Closed => break,
            };
        }

        info!(
            cycles = self.summary.cycles,
            degraded = self.summary.degraded_cycles,
            failed = self.summary.failed_cycles,
            rows = self.summary.rows_written,
            exit = ?self.summary.exit,
            "Tracking finished"
        );
        self.summary
    }

    /// One cycle; returns the next state.
    async fn poll<S: PageSource>(&mut self, source: &mut S) -> TrackerState {
        if self.shutdown_requested() {
            self.summary.exit = ExitReason::Cancelled;
            return TrackerState::Closing;
        }

        self.summary.cycles += 1;
        if let Err(e) = self.cycle(source).await {
            if e.is_fatal() {
                error!(error = %e, "Page session lost");
                self.summary.exit = ExitReason::Fatal(e.to_string());
                return TrackerState::Closing;
            }
            self.summary.failed_cycles += 1;
            error!(cycle = self.summary.cycles, error = %e, "Error during scrape");
        }

        if self.config.max_cycles > 0 && self.summary.cycles >= self.config.max_cycles {
            info!(cycles = self.summary.cycles, "Cycle limit reached");
            self.summary.exit = ExitReason::CycleLimit;
            return TrackerState::Closing;
        }
        TrackerState::Idle
    }

    async fn cycle<S: PageSource>(&mut self, source: &mut S) -> Result<(), CycleError> {
        let records = self
            .extractor
            .extract_top_n(source, self.config.top_n, self.config.timeout())
            .await?;

        if records.is_empty() {
            self.summary.degraded_cycles += 1;
            warn!(cycle = self.summary.cycles, "No data found this cycle");
            return Ok(());
        }

        let written = self.sink.append(&records)?;
        self.summary.rows_written += written as u64;
        info!(
            cycle = self.summary.cycles,
            rows = written,
            output = %self.config.output.display(),
            "Snapshot saved"
        );

        self.print_views(&records);
        Ok(())
    }

    fn print_views(&self, records: &[MarketRecord]) {
        println!("\nLatest Market Snapshot:");
        print!("{}", report::snapshot_view(records));

        if self.config.has_price_filter() {
            let filtered = by_price_range(records, self.config.min_price, self.config.max_price);
            if filtered.is_empty() {
                println!("\nNo coins matched the price filter.");
            } else {
                println!("\nCoins Matching Price Filter:");
                print!("{}", report::price_view(&filtered));
            }
        }

        let k = self.config.show_gainers;
        if k > 0 {
            println!("\nTop {} Gainers:", k);
            print!("{}", report::movers_view(&top_gainers(records, k)));
        }

        let k = self.config.show_losers;
        if k > 0 {
            println!("\nTop {} Losers:", k);
            print!("{}", report::movers_view(&top_losers(records, k)));
        }
    }

    /// Sleep for the interval unless shutdown arrives first.
    async fn idle(&mut self) -> TrackerState {
        println!(
            "\nWaiting {} seconds before next scrape...\n",
            self.config.interval_secs
        );
        tokio::select! {
            _ = tokio::time::sleep(self.config.interval()) => TrackerState::Polling,
            _ = wait_for_shutdown(&mut self.shutdown) => {
                println!("\nAuto-tracking stopped by user.");
                self.summary.exit = ExitReason::Cancelled;
                TrackerState::Closing
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Resolves once the flag is `true`. A dropped sender never resolves.
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
