use coinwatch_core::*;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Cell positions of each field within a ranking-table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    pub rank: usize,
    /// Cell holding "name\nsymbol".
    pub name: usize,
    pub price: usize,
    pub change_24h: usize,
    pub market_cap: usize,
    /// Rows with fewer cells are not data rows and are skipped.
    pub min_cells: usize,
}

impl Default for RowLayout {
    fn default() -> Self {
        Self {
            rank: 1,
            name: 2,
            price: 3,
            change_24h: 4,
            market_cap: 7,
            min_cells: 8,
        }
    }
}

/// Map one row's cell texts to a record.
///
/// Returns `None` for rows shorter than `layout.min_cells`.
pub fn parse_row(cells: &[String], layout: &RowLayout) -> Option<MarketRecord> {
    if cells.len() < layout.min_cells {
        return None;
    }
    let cell = |i: usize| cells.get(i).map(|s| s.trim()).unwrap_or("");

    let mut name_lines = cell(layout.name).split('\n').map(str::trim);
    let name = name_lines.next().unwrap_or("").to_string();
    let symbol = name_lines.next().unwrap_or("").to_string();

    Some(MarketRecord {
        rank: cell(layout.rank).to_string(),
        name,
        symbol,
        price: parse_money(cell(layout.price)),
        change_24h: parse_percent(cell(layout.change_24h)),
        market_cap: parse_money(cell(layout.market_cap)),
    })
}

/// Pulls the top of the ranking table out of a [`PageSource`].
#[derive(Debug, Clone)]
pub struct Extractor {
    pub layout: RowLayout,
    /// Where the screenshot goes when the table never becomes ready.
    pub diagnostic_path: PathBuf,
}

impl Extractor {
    pub fn new(diagnostic_path: impl Into<PathBuf>) -> Self {
        Self {
            layout: RowLayout::default(),
            diagnostic_path: diagnostic_path.into(),
        }
    }

    /// Refresh the page and extract up to `n` records.
    ///
    /// A readiness timeout is a degraded cycle: a diagnostic is captured and
    /// an empty vector returned. Row failures are logged and skipped. Only
    /// errors outside the per-row loop, or fatal ones inside it, propagate.
    pub async fn extract_top_n<S>(
        &self,
        source: &mut S,
        n: usize,
        timeout: Duration,
    ) -> Result<Snapshot, SourceError>
    where
        S: PageSource + ?Sized,
    {
        match source.refresh().await {
            Ok(()) => {}
            Err(SourceError::Timeout(reason)) => {
                debug!(%reason, "Reload still loading, waiting for table")
            }
            Err(e) => return Err(e),
        }

        if !source.wait_ready(timeout).await? {
            match source.capture_diagnostic(&self.diagnostic_path).await {
                Ok(()) => warn!(
                    timeout_secs = timeout.as_secs(),
                    screenshot = %self.diagnostic_path.display(),
                    "Timeout: table not loaded, screenshot saved"
                ),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(
                    timeout_secs = timeout.as_secs(),
                    error = %e,
                    "Timeout: table not loaded, screenshot failed"
                ),
            }
            return Ok(Vec::new());
        }

        let available = source.row_count().await?;
        let take = available.min(n);
        debug!(available, take, "Table ready");

        let mut records = Vec::with_capacity(take);
        for index in 0..take {
            match source.row_cells(index).await {
                Ok(cells) => match parse_row(&cells, &self.layout) {
                    Some(record) => records.push(record),
                    None => debug!(row = index, cells = cells.len(), "Skipping short row"),
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(row = index, error = %e, "Failed to parse row"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_row_maps_fields() {
        let row = cells(&[
            "", "1", "Bitcoin\nBTC\nBuy", "$64,000.12", "+2.50%", "x", "y", "$1.25T",
        ]);
        let rec = parse_row(&row, &RowLayout::default()).unwrap();
        assert_eq!(rec.rank, "1");
        assert_eq!(rec.name, "Bitcoin");
        assert_eq!(rec.symbol, "BTC");
        assert_eq!(rec.price, Some(64000.12));
        assert_eq!(rec.change_24h, Some(2.5));
        assert_eq!(rec.market_cap, Some(1.25e12));
    }

    #[test]
    fn test_parse_row_missing_symbol_and_bad_numbers() {
        let row = cells(&["", "7", "Mystery", "\u{2014}", "n/a", "", "", "$1.2.3B"]);
        let rec = parse_row(&row, &RowLayout::default()).unwrap();
        assert_eq!(rec.name, "Mystery");
        assert_eq!(rec.symbol, "");
        assert!(rec.price.is_none());
        assert!(rec.change_24h.is_none());
        assert!(rec.market_cap.is_none());
    }

    #[test]
    fn test_parse_row_short_row_skipped() {
        let row = cells(&["", "1", "Bitcoin\nBTC", "$1"]);
        assert!(parse_row(&row, &RowLayout::default()).is_none());
    }

    #[tokio::test]
    async fn test_extract_takes_first_n_rows() {
        let mut source = ScriptedSource::new(vec![ScriptedPage::Table(vec![
            ScriptedRow::coin("1", "Bitcoin", "BTC", "$64,000", "+1.00%", "$1.2T"),
            ScriptedRow::coin("2", "Ethereum", "ETH", "$3,200", "-0.50%", "$380B"),
            ScriptedRow::coin("3", "Tether", "USDT", "$1.00", "0.01%", "$110B"),
        ])]);
        let extractor = Extractor::new("shot.png");

        let records = extractor
            .extract_top_n(&mut source, 2, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].symbol, "ETH");
        assert_eq!(records[1].market_cap, Some(380e9));
    }

    #[tokio::test]
    async fn test_extract_row_failures_are_independent() {
        let mut source = ScriptedSource::new(vec![ScriptedPage::Table(vec![
            ScriptedRow::coin("1", "Bitcoin", "BTC", "$64,000", "+1.00%", "$1.2T"),
            ScriptedRow::Broken("stale element".into()),
            ScriptedRow::Cells(cells(&["ad banner"])),
            ScriptedRow::coin("4", "Solana", "SOL", "$140", "+5.00%", "$65B"),
        ])]);
        let extractor = Extractor::new("shot.png");

        let records = extractor
            .extract_top_n(&mut source, 10, Duration::from_secs(1))
            .await
            .unwrap();
        let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "SOL"]);
    }

    #[tokio::test]
    async fn test_extract_timeout_captures_diagnostic() {
        let mut source = ScriptedSource::new(vec![ScriptedPage::NeverReady]);
        let stats = source.stats();
        let extractor = Extractor::new("debug_timeout.png");

        let records = extractor
            .extract_top_n(&mut source, 10, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(stats.diagnostics(), 1);
    }

    #[tokio::test]
    async fn test_extract_stalled_reload_is_a_timeout() {
        let mut source = ScriptedSource::new(vec![ScriptedPage::ReloadStalls]);
        let stats = source.stats();
        let extractor = Extractor::new("debug_timeout.png");

        let records = extractor
            .extract_top_n(&mut source, 10, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(stats.diagnostics(), 1);
    }

    #[tokio::test]
    async fn test_extract_fatal_row_error_propagates() {
        let mut source = ScriptedSource::new(vec![ScriptedPage::Table(vec![
            ScriptedRow::coin("1", "Bitcoin", "BTC", "$64,000", "+1.00%", "$1.2T"),
            ScriptedRow::Disconnected,
        ])]);
        let extractor = Extractor::new("shot.png");

        let err = extractor
            .extract_top_n(&mut source, 10, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
