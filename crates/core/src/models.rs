use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Market Data
// ---------------------------------------------------------------------------

/// One coin as shown on the ranking page during a single poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketRecord {
    /// Rank as displayed; the page may decorate it, so it stays text.
    pub rank: String,
    pub name: String,
    pub symbol: String,
    /// Price in USD, `None` when the cell text did not parse.
    pub price: Option<f64>,
    /// Signed 24h change in percent.
    pub change_24h: Option<f64>,
    /// Market capitalization in USD.
    pub market_cap: Option<f64>,
}

/// All records retrieved in one poll cycle, in display order.
pub type Snapshot = Vec<MarketRecord>;

// ---------------------------------------------------------------------------
// Persisted row
// ---------------------------------------------------------------------------

/// A record stamped with the instant its batch was persisted.
///
/// Field order is the column order of the CSV log.
#[derive(Debug, Clone, Serialize)]
pub struct StampedRecord<'a> {
    pub rank: &'a str,
    pub name: &'a str,
    pub symbol: &'a str,
    pub price: Option<f64>,
    pub change_24h: Option<f64>,
    pub market_cap: Option<f64>,
    #[serde(serialize_with = "serialize_utc")]
    pub timestamp_utc: DateTime<Utc>,
}

impl<'a> StampedRecord<'a> {
    pub fn new(record: &'a MarketRecord, timestamp_utc: DateTime<Utc>) -> Self {
        Self {
            rank: &record.rank,
            name: &record.name,
            symbol: &record.symbol,
            price: record.price,
            change_24h: record.change_24h,
            market_cap: record.market_cap,
            timestamp_utc,
        }
    }
}

/// Column names of the CSV log, in write order.
pub const LOG_COLUMNS: [&str; 7] = [
    "rank",
    "name",
    "symbol",
    "price",
    "change_24h",
    "market_cap",
    "timestamp_utc",
];

/// ISO-8601 UTC with microseconds and an explicit `+00:00` offset.
pub fn format_utc(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn serialize_utc<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_utc(ts))
}
