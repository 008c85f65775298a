use chrono::{DateTime, Utc};
use coinwatch_core::{MarketRecord, RecordSink, SinkError, StampedRecord};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Append-only CSV log of market records.
///
/// Columns: `rank,name,symbol,price,change_24h,market_cap,timestamp_utc`.
/// Missing numbers are written as empty fields.
#[derive(Debug, Clone)]
pub struct CsvLog {
    path: PathBuf,
}

impl CsvLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `records`, all stamped with `timestamp`.
    ///
    /// The header is written only when the file does not exist yet; this is
    /// checked on every call since the file can appear between cycles.
    pub fn append_at(
        &self,
        records: &[MarketRecord],
        timestamp: DateTime<Utc>,
    ) -> Result<usize, SinkError> {
        if records.is_empty() {
            return Ok(0);
        }

        let write_header = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);

        for record in records {
            writer
                .serialize(StampedRecord::new(record, timestamp))
                .map_err(|e| SinkError::Encode(format!("Failed to write row: {}", e)))?;
        }
        writer.flush()?;

        debug!(
            path = %self.path.display(),
            rows = records.len(),
            header = write_header,
            "Appended rows to CSV log"
        );
        Ok(records.len())
    }
}

impl RecordSink for CsvLog {
    fn append(&mut self, records: &[MarketRecord]) -> Result<usize, SinkError> {
        self.append_at(records, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use coinwatch_core::LOG_COLUMNS;

    fn rec(rank: &str, symbol: &str, price: Option<f64>) -> MarketRecord {
        MarketRecord {
            rank: rank.to_string(),
            name: format!("{} coin", symbol),
            symbol: symbol.to_string(),
            price,
            change_24h: Some(1.5),
            market_cap: Some(1_200_000_000.0),
        }
    }

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_empty_batch_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        let mut log = CsvLog::new(&path);

        assert_eq!(log.append(&[]).unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_batch_leaves_existing_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        let mut log = CsvLog::new(&path);
        log.append(&[rec("1", "BTC", Some(64000.0))]).unwrap();
        let before = std::fs::read(&path).unwrap();

        log.append(&[]).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_first_append_writes_header_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        let log = CsvLog::new(&path);
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        let written = log
            .append_at(&[rec("1", "BTC", Some(64000.0)), rec("2", "ETH", None)], ts)
            .unwrap();
        assert_eq!(written, 2);

        let rows = read_rows(&path);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], LOG_COLUMNS.to_vec());
        assert_eq!(rows[1][0], "1");
        assert_eq!(rows[1][2], "BTC");
        assert_eq!(rows[1][3].parse::<f64>().unwrap(), 64000.0);
        assert_eq!(rows[1][6], "2024-05-01T08:00:00.000000+00:00");
        // Missing price is an empty field.
        assert_eq!(rows[2][3], "");
    }

    #[test]
    fn test_second_append_does_not_repeat_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        let mut log = CsvLog::new(&path);

        log.append(&[rec("1", "BTC", Some(64000.0))]).unwrap();
        log.append(&[rec("1", "BTC", Some(64100.0)), rec("2", "ETH", Some(3100.0))])
            .unwrap();

        let rows = read_rows(&path);
        assert_eq!(rows.len(), 4);
        let headers = rows.iter().filter(|r| r[0] == "rank").count();
        assert_eq!(headers, 1);
    }

    #[test]
    fn test_batch_shares_one_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        let mut log = CsvLog::new(&path);

        log.append(&[
            rec("1", "BTC", Some(1.0)),
            rec("2", "ETH", Some(2.0)),
            rec("3", "SOL", Some(3.0)),
        ])
        .unwrap();

        let rows = read_rows(&path);
        let stamps: Vec<&String> = rows[1..].iter().map(|r| &r[6]).collect();
        assert!(stamps.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_header_check_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        let mut log = CsvLog::new(&path);

        log.append(&[rec("1", "BTC", Some(1.0))]).unwrap();
        std::fs::remove_file(&path).unwrap();
        log.append(&[rec("1", "BTC", Some(2.0))]).unwrap();

        let rows = read_rows(&path);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "rank");
    }
}
