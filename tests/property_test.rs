//! Property tests for streaming indicators, signal scoring and simulation.

mod common;

use common::*;
use confluence::domain::backtest::Simulator;
use confluence::domain::indicator::snapshot::{
    IndicatorEngine, IndicatorParams, snapshots_from_history,
};
use confluence::domain::metrics::Metrics;
use confluence::domain::signal::{Action, SignalGenerator, SignalParams};
use proptest::prelude::*;

fn bars_from(code: &str, steps: &[(f64, f64)]) -> Vec<OhlcvBar> {
    let mut price = 100.0;
    steps
        .iter()
        .enumerate()
        .map(|(i, &(change, volume))| {
            price = (price * (1.0 + change)).max(1.0);
            OhlcvBar {
                code: code.to_string(),
                timestamp: day(i as i64),
                open: price,
                high: price * 1.01,
                low: price * 0.99,
                close: price,
                volume,
            }
        })
        .collect()
}

fn price_steps(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((-0.05f64..0.05, 100.0f64..5000.0), len)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn streaming_matches_full_recomputation(steps in price_steps(40..140)) {
        let bars = bars_from("BHP", &steps);
        let params = IndicatorParams::default();
        let batch = snapshots_from_history(&bars, &params);
        let mut engine = IndicatorEngine::new(&params);

        for (bar, expected) in bars.iter().zip(&batch) {
            let streamed = engine.update(bar);
            prop_assert_eq!(streamed.is_some(), expected.is_some());
            if let (Some(s), Some(e)) = (streamed, expected) {
                prop_assert!((s.rsi - e.rsi).abs() < 1e-9);
                prop_assert!((s.macd_line - e.macd_line).abs() < 1e-9);
                prop_assert!((s.macd_signal - e.macd_signal).abs() < 1e-9);
                prop_assert!((s.macd_hist - e.macd_hist).abs() < 1e-9);
                prop_assert!((s.bb_upper - e.bb_upper).abs() < 1e-9);
                prop_assert!((s.bb_lower - e.bb_lower).abs() < 1e-9);
                prop_assert!((s.ema_fast - e.ema_fast).abs() < 1e-9);
                prop_assert!((s.ema_slow - e.ema_slow).abs() < 1e-9);
                prop_assert!((s.avg_volume - e.avg_volume).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn score_is_sum_of_contributions(steps in price_steps(40..80)) {
        let bars = bars_from("BHP", &steps);
        let params = SignalParams::default();
        let generator = SignalGenerator::new(&params);
        let indicators = IndicatorParams::default();

        let signal = generator
            .signal_for_history("BHP", &bars, &indicators)
            .unwrap();
        let sum: f64 = signal.contributions.values().sum();
        prop_assert!((signal.score - sum).abs() < 1e-12);

        let expected = if signal.score >= params.threshold {
            Action::Buy
        } else if signal.score <= -params.threshold {
            Action::Sell
        } else {
            Action::Hold
        };
        prop_assert_eq!(signal.action, expected);
    }

    #[test]
    fn short_history_always_holds(steps in price_steps(1..35)) {
        let bars = bars_from("BHP", &steps);
        let generator = SignalGenerator::new(&SignalParams::default());
        let action = generator.action_for_history("BHP", &bars, &IndicatorParams::default());
        prop_assert_eq!(action, Action::Hold);
    }

    #[test]
    fn simulation_is_deterministic(a in price_steps(60..120), b in price_steps(60..120)) {
        let data = vec![
            code_data("BHP", bars_from("BHP", &a)),
            code_data("CBA", bars_from("CBA", &b)),
        ];
        let mut config = small_config();
        config.signal.threshold = 2.0;
        config.risk.allow_shorting = true;

        let first = Simulator::new(config.clone()).unwrap().run(&data);
        let second = Simulator::new(config.clone()).unwrap().run(&data);
        prop_assert_eq!(&first.portfolio, &second.portfolio);
        prop_assert_eq!(&first.vetoes, &second.vetoes);

        // every position is closed by the end of the run
        prop_assert!(first.portfolio.positions().is_empty());
        let metrics = Metrics::compute(first.trades(), config.initial_capital);
        prop_assert_eq!(
            metrics.trades_won + metrics.trades_lost + metrics.trades_breakeven,
            metrics.total_trades
        );
        prop_assert!(metrics.max_drawdown >= 0.0 && metrics.max_drawdown <= 1.0);
    }
}
