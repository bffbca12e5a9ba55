//! Parameter sweeps: independent backtests over the same data.

use rayon::prelude::*;

use super::backtest::{BacktestConfig, Simulator};
use super::code_data::CodeData;
use super::error::ConfluenceError;
use super::metrics::Metrics;

#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutcome {
    pub config: BacktestConfig,
    pub metrics: Metrics,
    pub vetoes: usize,
}

/// One config per signal threshold, everything else taken from `base`.
pub fn threshold_grid(base: &BacktestConfig, thresholds: &[f64]) -> Vec<BacktestConfig> {
    thresholds
        .iter()
        .map(|&threshold| {
            let mut config = base.clone();
            config.signal.threshold = threshold;
            config
        })
        .collect()
}

/// Run every config on its own simulator, in parallel when `parallel` is set.
/// Results come back in `configs` order either way.
pub fn run_sweep(
    data: &[CodeData],
    configs: &[BacktestConfig],
    parallel: bool,
) -> Result<Vec<SweepOutcome>, ConfluenceError> {
    let run_one = |config: &BacktestConfig| -> Result<SweepOutcome, ConfluenceError> {
        let mut simulator = Simulator::new(config.clone())?;
        let result = simulator.run(data);
        Ok(SweepOutcome {
            config: config.clone(),
            metrics: Metrics::compute(result.trades(), config.initial_capital),
            vetoes: result.vetoes.len(),
        })
    };

    if parallel {
        configs.par_iter().map(run_one).collect()
    } else {
        configs.iter().map(run_one).collect()
    }
}
