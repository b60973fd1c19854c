use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no candle data available for {symbol} {interval} in the requested window")]
    DataUnavailable { symbol: String, interval: String },
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),
    #[error("snapshot error: {0}")]
    Snapshot(String),
}
