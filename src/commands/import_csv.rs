use crate::data::{read_csv_candles, CandleStore};
use anyhow::{anyhow, Result};
use log::info;
use std::path::Path;

pub fn run(input: &Path, output: &Path, symbol: &str, interval: &str) -> Result<()> {
    let candles = read_csv_candles(input)?;
    if candles.is_empty() {
        return Err(anyhow!("{} contains no candle rows", input.display()));
    }

    let count = candles.len();
    let first = candles[0].timestamp;
    let last = candles[count - 1].timestamp;
    CandleStore::save(output, symbol, interval, candles)?;

    info!(
        "Imported {} candles for {} {} ({} to {}) into {}",
        count,
        symbol,
        interval,
        first,
        last,
        output.display()
    );
    Ok(())
}
