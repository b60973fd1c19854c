use crate::error::EngineError;
use crate::models::{parse_timestamp, Candle};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub const CANDLE_SNAPSHOT_VERSION: u32 = 1;

/// Binary candle archive for one symbol/interval pair. Candles are stored
/// ordered with strictly increasing timestamps; that invariant is checked on
/// every load so a corrupt file fails up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleSnapshot {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub symbol: String,
    pub interval: String,
    pub candles: Vec<Candle>,
}

#[derive(Debug, Clone)]
pub struct CandleStore {
    snapshot: CandleSnapshot,
}

impl CandleStore {
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let file = File::open(path).map_err(|e| {
            EngineError::Snapshot(format!("failed to open {}: {}", path.display(), e))
        })?;
        let reader = BufReader::new(file);
        let snapshot: CandleSnapshot = bincode::deserialize_from(reader)
            .map_err(|e| EngineError::Snapshot(format!("snapshot decode failed: {}", e)))?;

        if snapshot.version != CANDLE_SNAPSHOT_VERSION {
            return Err(EngineError::Snapshot(format!(
                "snapshot version mismatch (found {}, expected {})",
                snapshot.version, CANDLE_SNAPSHOT_VERSION
            )));
        }

        validate_ordering(&snapshot.candles)?;
        info!(
            "Loaded {} candles for {} {} from {}",
            snapshot.candles.len(),
            snapshot.symbol,
            snapshot.interval,
            path.display()
        );
        Ok(Self { snapshot })
    }

    pub fn save(
        path: &Path,
        symbol: &str,
        interval: &str,
        candles: Vec<Candle>,
    ) -> Result<(), EngineError> {
        validate_ordering(&candles)?;
        let snapshot = CandleSnapshot {
            version: CANDLE_SNAPSHOT_VERSION,
            generated_at: Utc::now(),
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            candles,
        };
        let file = File::create(path).map_err(|e| {
            EngineError::Snapshot(format!("failed to create {}: {}", path.display(), e))
        })?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, &snapshot)
            .map_err(|e| EngineError::Snapshot(format!("snapshot encode failed: {}", e)))
    }

    pub fn symbol(&self) -> &str {
        &self.snapshot.symbol
    }

    pub fn interval(&self) -> &str {
        &self.snapshot.interval
    }

    pub fn candles(&self) -> &[Candle] {
        &self.snapshot.candles
    }

    /// Candles with `start <= timestamp <= end`.
    pub fn window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> &[Candle] {
        let candles = &self.snapshot.candles;
        let from = candles.partition_point(|c| c.timestamp < start);
        let to = candles.partition_point(|c| c.timestamp <= end);
        &candles[from..to]
    }
}

fn validate_ordering(candles: &[Candle]) -> Result<(), EngineError> {
    for pair in candles.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(EngineError::Snapshot(format!(
                "candle timestamps must be strictly increasing ({} followed by {})",
                pair[0].timestamp, pair[1].timestamp
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CsvCandleRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Read `timestamp,open,high,low,close,volume` rows into ordered candles.
pub fn read_csv_candles(path: &Path) -> Result<Vec<Candle>, EngineError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        EngineError::Snapshot(format!("failed to open {}: {}", path.display(), e))
    })?;

    let mut candles = Vec::new();
    for row in reader.deserialize::<CsvCandleRow>() {
        let row =
            row.map_err(|e| EngineError::Snapshot(format!("invalid CSV row: {}", e)))?;
        let timestamp = parse_timestamp(&row.timestamp)
            .map_err(|e| EngineError::Snapshot(format!("invalid CSV timestamp: {}", e)))?;
        candles.push(Candle {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }

    validate_ordering(&candles)?;
    Ok(candles)
}
