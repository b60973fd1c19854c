use crate::backtester::Backtester;
use crate::benchmark::BenchmarkComparator;
use crate::data::CandleStore;
use crate::models::{BacktestResult, RunSpec};
use crate::strategy::create_strategy;
use anyhow::{anyhow, Context, Result};
use log::info;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub fn run(
    config_path: Option<&Path>,
    data_file: &Path,
    strategy_id: &str,
    start: Option<&str>,
    end: Option<&str>,
    params: &[String],
    output: Option<&Path>,
) -> Result<()> {
    let config = super::load_config(config_path)?;
    let store = CandleStore::load(data_file)?;
    let (start, end) = super::resolve_window(&store, start, end)?;
    let parameters = parse_parameters(params)?;

    let mut strategy = create_strategy(strategy_id, &parameters)?;
    let run_spec = RunSpec {
        strategy_id: strategy_id.to_string(),
        symbol: store.symbol().to_string(),
        interval: store.interval().to_string(),
        start,
        end,
    };

    info!(
        "Backtesting {} on {} {} from {} to {}",
        strategy_id,
        run_spec.symbol,
        run_spec.interval,
        run_spec.start,
        run_spec.end
    );

    let backtester = Backtester::new(&config);
    let result = backtester.run(strategy.as_mut(), store.window(start, end), &run_spec)?;

    log_result(&result);
    write_result(&result, output)?;
    Ok(())
}

fn parse_parameters(params: &[String]) -> Result<HashMap<String, f64>> {
    let mut parameters = HashMap::new();
    for raw in params {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow!("parameter '{}' is not in key=value form", raw))?;
        let value: f64 = value
            .parse()
            .with_context(|| format!("parameter '{}' has a non-numeric value", raw))?;
        parameters.insert(key.to_string(), value);
    }
    Ok(parameters)
}

fn log_result(result: &BacktestResult) {
    let summary = &result.summary;
    info!(
        "Final balance {:.2} ({:+.2}%), {} trades, win rate {:.1}%, profit factor {:.2}",
        summary.final_balance,
        summary.total_return_pct,
        summary.total_trades,
        summary.win_rate,
        summary.profit_factor
    );
    info!(
        "Max drawdown {:.2}% | Sharpe {:.2} | fees {:.2}",
        summary.max_drawdown_pct, summary.sharpe_ratio, summary.total_fees
    );

    let buy_hold = &result.buy_hold_comparison;
    let comparison = BenchmarkComparator::compare(summary, buy_hold);
    info!(
        "Buy & hold {:+.2}% (Sharpe {:.2}); strategy {} the benchmark ({:+.2}% return delta)",
        buy_hold.total_return_pct,
        buy_hold.sharpe_ratio,
        if comparison.strategy_beats_buy_hold {
            "beats"
        } else {
            "does not beat"
        },
        comparison.return_difference_pct
    );

    if let Some(metrics) = BenchmarkComparator::risk_metrics(&result.equity_curve.equity) {
        info!(
            "Sortino {:.2} | Calmar {:.2} | VaR(95) {:.4} | worst losing streak {} bars",
            metrics.sortino_ratio,
            metrics.calmar_ratio,
            metrics.value_at_risk_95,
            metrics.max_consecutive_losses
        );
    }
}

fn write_result(result: &BacktestResult, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), result)?;
            info!("Result written to {}", path.display());
        }
        None => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
    }
    Ok(())
}
