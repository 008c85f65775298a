use async_trait::async_trait;
use coinwatch_core::*;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One row of a scripted table.
#[derive(Debug, Clone)]
pub enum ScriptedRow {
    /// Cell texts returned as-is.
    Cells(Vec<String>),
    /// Reading the row fails with a recoverable error.
    Broken(String),
    /// Reading the row reports a lost session.
    Disconnected,
}

impl ScriptedRow {
    /// A row laid out like the ranking table: star, rank, name, price,
    /// change, two unused columns, market cap.
    pub fn coin(rank: &str, name: &str, symbol: &str, price: &str, change: &str, cap: &str) -> Self {
        let name_cell = format!("{}\n{}", name, symbol);
        ScriptedRow::Cells(
            [
                "",
                rank,
                name_cell.as_str(),
                price,
                change,
                "",
                "",
                cap,
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        )
    }
}

/// What the page looks like after one refresh.
#[derive(Debug, Clone)]
pub enum ScriptedPage {
    /// The table renders with these rows.
    Table(Vec<ScriptedRow>),
    /// The readiness condition never holds.
    NeverReady,
    /// Refreshing fails with a recoverable navigation error.
    RefreshFails(String),
    /// The reload never finishes loading and the table never renders.
    ReloadStalls,
    /// Refreshing reports a lost session.
    Disconnected,
}

#[derive(Debug, Default)]
struct Counters {
    refreshes: AtomicUsize,
    diagnostics: AtomicUsize,
    closes: AtomicUsize,
}

/// Shared view of what a [`ScriptedSource`] has been asked to do.
///
/// Stays readable after the source itself has been moved into a tracker.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStats {
    counters: Arc<Counters>,
}

impl ScriptedStats {
    pub fn refreshes(&self) -> usize {
        self.counters.refreshes.load(Ordering::SeqCst)
    }

    pub fn diagnostics(&self) -> usize {
        self.counters.diagnostics.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }
}

/// An in-memory [`PageSource`] that replays a fixed sequence of pages.
///
/// Each refresh advances to the next page; once the script is exhausted the
/// last page repeats.
pub struct ScriptedSource {
    pages: Vec<ScriptedPage>,
    cursor: Option<usize>,
    stats: ScriptedStats,
}

impl ScriptedSource {
    pub fn new(pages: Vec<ScriptedPage>) -> Self {
        Self {
            pages,
            cursor: None,
            stats: ScriptedStats::default(),
        }
    }

    pub fn stats(&self) -> ScriptedStats {
        self.stats.clone()
    }

    fn current(&self) -> Option<&ScriptedPage> {
        self.cursor.and_then(|i| self.pages.get(i))
    }

    fn current_rows(&self) -> &[ScriptedRow] {
        match self.current() {
            Some(ScriptedPage::Table(rows)) => rows,
            _ => &[],
        }
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn refresh(&mut self) -> Result<(), SourceError> {
        self.stats.counters.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.pages.is_empty() {
            return Err(SourceError::Navigation("empty script".to_string()));
        }
        let next = self.cursor.map_or(0, |i| i + 1).min(self.pages.len() - 1);
        self.cursor = Some(next);

        match &self.pages[next] {
            ScriptedPage::RefreshFails(reason) => Err(SourceError::Navigation(reason.clone())),
            ScriptedPage::ReloadStalls => {
                Err(SourceError::Timeout("scripted reload stall".to_string()))
            }
            ScriptedPage::Disconnected => {
                Err(SourceError::Disconnected("scripted disconnect".to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn wait_ready(&mut self, _timeout: Duration) -> Result<bool, SourceError> {
        Ok(matches!(self.current(), Some(ScriptedPage::Table(rows)) if !rows.is_empty()))
    }

    async fn row_count(&mut self) -> Result<usize, SourceError> {
        Ok(self.current_rows().len())
    }

    async fn row_cells(&mut self, index: usize) -> Result<Vec<String>, SourceError> {
        match self.current_rows().get(index) {
            Some(ScriptedRow::Cells(cells)) => Ok(cells.clone()),
            Some(ScriptedRow::Broken(reason)) => Err(SourceError::RowUnavailable {
                index,
                reason: reason.clone(),
            }),
            Some(ScriptedRow::Disconnected) => {
                Err(SourceError::Disconnected("scripted disconnect".to_string()))
            }
            None => Err(SourceError::RowUnavailable {
                index,
                reason: "no such row".to_string(),
            }),
        }
    }

    async fn capture_diagnostic(&mut self, _path: &Path) -> Result<(), SourceError> {
        self.stats.counters.diagnostics.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        self.stats.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
