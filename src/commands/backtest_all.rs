use crate::backtester::Backtester;
use crate::benchmark::BenchmarkComparator;
use crate::config::AppConfig;
use crate::data::CandleStore;
use crate::models::{BacktestResult, Candle, RunSpec};
use crate::strategy::{create_strategy, STRATEGY_IDS};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::thread;

struct BacktestTask {
    strategy_id: String,
}

struct BacktestTaskResult {
    strategy_id: String,
    result: Result<BacktestResult>,
}

/// Run every registered strategy over the same candle window, each on its own
/// worker thread, and log a ranked comparison at the end.
pub fn run(
    config_path: Option<&Path>,
    data_file: &Path,
    start: Option<&str>,
    end: Option<&str>,
    output_dir: Option<&Path>,
) -> Result<()> {
    let config = super::load_config(config_path)?;
    let store = CandleStore::load(data_file)?;
    let (start, end) = super::resolve_window(&store, start, end)?;
    let candles: Arc<Vec<Candle>> = Arc::new(store.window(start, end).to_vec());

    let task_count = STRATEGY_IDS.len();
    info!(
        "Running {} backtests on {} {} from {} to {}",
        task_count,
        store.symbol(),
        store.interval(),
        start,
        end
    );

    let num_workers = std::cmp::min(task_count, std::cmp::max(1, num_cpus::get()));
    info!("Using {} worker threads", num_workers);

    let (tx, rx): (Sender<BacktestTask>, Receiver<BacktestTask>) = bounded(task_count);
    let (result_tx, result_rx): (Sender<BacktestTaskResult>, Receiver<BacktestTaskResult>) =
        bounded(task_count);

    let mut handles = Vec::new();
    for _worker_id in 0..num_workers {
        let rx = rx.clone();
        let result_tx = result_tx.clone();
        let config = config.clone();
        let candles = candles.clone();
        let symbol = store.symbol().to_string();
        let interval = store.interval().to_string();

        let handle = thread::spawn(move || {
            while let Ok(task) = rx.recv() {
                let result = run_single_backtest(
                    &config,
                    candles.as_slice(),
                    &symbol,
                    &interval,
                    start,
                    end,
                    &task.strategy_id,
                );
                if result_tx
                    .send(BacktestTaskResult {
                        strategy_id: task.strategy_id,
                        result,
                    })
                    .is_err()
                {
                    break;
                }
            }
        });
        handles.push(handle);
    }
    drop(result_tx);

    for strategy_id in STRATEGY_IDS {
        tx.send(BacktestTask {
            strategy_id: strategy_id.to_string(),
        })?;
    }
    drop(tx);

    let mut results = Vec::new();
    let mut completed = 0;
    let mut failed = 0;
    let pb = ProgressBar::new(task_count as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap()
            .progress_chars("#>-"),
    );

    while completed < task_count {
        match result_rx.recv_timeout(std::time::Duration::from_millis(200)) {
            Ok(task_result) => {
                completed += 1;
                pb.set_position(completed as u64);
                match task_result.result {
                    Ok(result) => results.push(result),
                    Err(error) => {
                        failed += 1;
                        warn!("Backtest for {} failed: {}", task_result.strategy_id, error);
                    }
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                warn!("Result channel closed unexpectedly. Some results may be lost.");
                break;
            }
        }
    }

    if failed > 0 {
        pb.finish_with_message("Backtesting completed with errors");
    } else {
        pb.finish_with_message("Backtesting completed");
    }

    for handle in handles {
        handle.join().unwrap();
    }

    log_ranking(&mut results);

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        for result in &results {
            let path = dir.join(format!("{}.json", result.summary.strategy_id));
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), result)?;
        }
        info!("Wrote {} result files to {}", results.len(), dir.display());
    }

    Ok(())
}

fn run_single_backtest(
    config: &AppConfig,
    candles: &[Candle],
    symbol: &str,
    interval: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    strategy_id: &str,
) -> Result<BacktestResult> {
    let mut strategy = create_strategy(strategy_id, &HashMap::new())?;
    let run_spec = RunSpec {
        strategy_id: strategy_id.to_string(),
        symbol: symbol.to_string(),
        interval: interval.to_string(),
        start,
        end,
    };
    let backtester = Backtester::new(config);
    Ok(backtester.run(strategy.as_mut(), candles, &run_spec)?)
}

fn log_ranking(results: &mut [BacktestResult]) {
    results.sort_by(|a, b| {
        b.summary
            .total_return_pct
            .partial_cmp(&a.summary.total_return_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    info!(
        "{:<12} {:>10} {:>8} {:>9} {:>8} {:>11}",
        "strategy", "return %", "trades", "win %", "sharpe", "vs hodl"
    );
    for result in results.iter() {
        let summary = &result.summary;
        let comparison = BenchmarkComparator::compare(summary, &result.buy_hold_comparison);
        let verdict = if comparison.strategy_beats_buy_hold {
            "beats"
        } else {
            "trails"
        };
        info!(
            "{:<12} {:>10.2} {:>8} {:>9.1} {:>8.2} {:>11}",
            summary.strategy_id,
            summary.total_return_pct,
            summary.total_trades,
            summary.win_rate,
            summary.sharpe_ratio,
            verdict
        );
    }
}
