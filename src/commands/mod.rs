use crate::config::AppConfig;
use crate::data::CandleStore;
use crate::models::{parse_timestamp, DATE_FORMAT};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::path::Path;

pub mod backtest;
pub mod backtest_all;
pub mod import_csv;

pub(crate) fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => Ok(AppConfig::load(path)?),
        None => Ok(AppConfig::default()),
    }
}

/// Accepts `2024-01-01`, `2024-01-01 12:00:00` or RFC 3339.
pub(crate) fn parse_cli_time(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(timestamp) = parse_timestamp(raw) {
        return Ok(timestamp);
    }
    let date = NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .with_context(|| format!("unrecognized timestamp '{}'", raw))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("unrecognized timestamp '{}'", raw))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

/// Window bounds for a run: explicit flags when given, otherwise the full
/// extent of the snapshot.
pub(crate) fn resolve_window(
    store: &CandleStore,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let candles = store.candles();
    let (first, last) = match (candles.first(), candles.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => {
            return Err(anyhow!(
                "snapshot for {} {} contains no candles",
                store.symbol(),
                store.interval()
            ))
        }
    };

    let start = match start {
        Some(raw) => parse_cli_time(raw)?,
        None => first,
    };
    let end = match end {
        Some(raw) => parse_cli_time(raw)?,
        None => last,
    };
    if end < start {
        return Err(anyhow!("window end {} precedes start {}", end, start));
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_time_accepts_dates_and_full_timestamps() {
        assert_eq!(
            parse_cli_time("2024-01-02").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_cli_time("2024-01-02 03:04:05").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
        );
        assert!(parse_cli_time("yesterday").is_err());
    }
}
