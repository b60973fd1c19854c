use clap::{Parser, Subcommand};
use cointrader::commands::{backtest, backtest_all, import_csv};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cointrader")]
#[command(about = "A cryptocurrency strategy backtesting engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest a single strategy over a candle snapshot
    Backtest {
        /// Strategy ID to run (ma_cross, macd_rsi, buy_hold)
        strategy_id: String,
        /// Path to the candle snapshot file
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: PathBuf,
        /// Path to the JSON configuration file
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Window start (YYYY-MM-DD or full timestamp); defaults to the first candle
        #[arg(long)]
        start: Option<String>,
        /// Window end (YYYY-MM-DD or full timestamp); defaults to the last candle
        #[arg(long)]
        end: Option<String>,
        /// Strategy parameter override as key=value (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Destination for the JSON result (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Backtest every registered strategy over the same window
    BacktestAll {
        /// Path to the candle snapshot file
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: PathBuf,
        /// Path to the JSON configuration file
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Window start (YYYY-MM-DD or full timestamp); defaults to the first candle
        #[arg(long)]
        start: Option<String>,
        /// Window end (YYYY-MM-DD or full timestamp); defaults to the last candle
        #[arg(long)]
        end: Option<String>,
        /// Directory for per-strategy JSON result files
        #[arg(long = "output-dir", value_name = "PATH")]
        output_dir: Option<PathBuf>,
    },
    /// Convert a CSV candle export into a binary snapshot
    ImportCsv {
        /// CSV file with timestamp,open,high,low,close,volume rows
        input: PathBuf,
        /// Destination snapshot file
        output: PathBuf,
        /// Trading pair the candles belong to
        #[arg(long)]
        symbol: String,
        /// Candle interval label
        #[arg(long, default_value = "1hour")]
        interval: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting cointrader. Not financial advice. Use at your own risk.");

    match cli.command {
        Commands::Backtest {
            strategy_id,
            data_file,
            config,
            start,
            end,
            params,
            output,
        } => backtest::run(
            config.as_deref(),
            &data_file,
            &strategy_id,
            start.as_deref(),
            end.as_deref(),
            &params,
            output.as_deref(),
        ),
        Commands::BacktestAll {
            data_file,
            config,
            start,
            end,
            output_dir,
        } => backtest_all::run(
            config.as_deref(),
            &data_file,
            start.as_deref(),
            end.as_deref(),
            output_dir.as_deref(),
        ),
        Commands::ImportCsv {
            input,
            output,
            symbol,
            interval,
        } => import_csv::run(&input, &output, &symbol, &interval),
    }
}
