use crate::models::*;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Page Source Trait
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to a page source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Launch failed: {0}")]
    LaunchFailed(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Query failed: {0}")]
    Query(String),
    /// A command did not settle in time; the session is still usable.
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Row {index} unavailable: {reason}")]
    RowUnavailable { index: usize, reason: String },
    #[error("Session disconnected: {0}")]
    Disconnected(String),
    #[error("Diagnostic capture failed: {0}")]
    Diagnostic(String),
}

impl SourceError {
    /// Whether the session is unusable and polling must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SourceError::LaunchFailed(_) | SourceError::Disconnected(_))
    }
}

/// A rendered page holding the ranking table.
///
/// Rows are addressed by their zero-based display position.
#[async_trait]
pub trait PageSource: Send {
    /// Reload the page so the table shows fresh data.
    ///
    /// [`SourceError::Timeout`] means the reload was issued but the page did
    /// not finish loading; readiness may still be reached.
    async fn refresh(&mut self) -> Result<(), SourceError>;

    /// Wait until at least one data row exists and the first row's price
    /// cell shows a currency symbol. Returns `false` if `timeout` elapsed.
    async fn wait_ready(&mut self, timeout: Duration) -> Result<bool, SourceError>;

    /// Number of data rows currently rendered.
    async fn row_count(&mut self) -> Result<usize, SourceError>;

    /// Text of every cell in the row at `index`.
    async fn row_cells(&mut self, index: usize) -> Result<Vec<String>, SourceError>;

    /// Save a diagnostic artifact (e.g. a screenshot) to `path`.
    async fn capture_diagnostic(&mut self, path: &Path) -> Result<(), SourceError>;

    /// Release the underlying session. Called exactly once.
    async fn close(&mut self) -> Result<(), SourceError>;
}

// ---------------------------------------------------------------------------
// Record Sink Trait
// ---------------------------------------------------------------------------

/// Errors that can occur while persisting records.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Encode error: {0}")]
    Encode(String),
}

/// An append-only tabular store for market records.
pub trait RecordSink: Send {
    /// Append a batch, stamping every row with the same instant.
    /// Returns the number of rows written; an empty batch writes nothing.
    fn append(&mut self, records: &[MarketRecord]) -> Result<usize, SinkError>;
}
