//! Weighted multi-indicator signal scoring.
//!
//! Every [`Contributor`] looks at the current and previous indicator snapshot
//! and votes BUY, SELL or nothing. A vote is worth the contributor's weight;
//! the signed weights are summed into a score which is compared against the
//! confluence threshold.
//!
//! | Contributor | Weight | Buy                               | Sell                              |
//! |-------------|--------|-----------------------------------|-----------------------------------|
//! | RSI         | 2.0    | rsi < oversold                    | rsi > overbought                  |
//! | MACD        | 2.0    | histogram crosses above zero      | histogram crosses below zero      |
//! | Bollinger   | 1.5    | close < lower band                | close > upper band                |
//! | EMA cross   | 2.0    | fast EMA crosses above slow EMA   | fast EMA crosses below slow EMA   |
//! | Volume      | 1.5    | high volume and close up          | high volume and close down        |
//! | Trend       | 1.0    | close > slow EMA                  | close < slow EMA                  |

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use log::debug;

use super::indicator::snapshot::{IndicatorParams, IndicatorSnapshot, Insufficient, compute};
use super::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// Direction a single contributor votes for on one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Buy,
    Sell,
    Abstain,
}

impl Vote {
    fn signed(self, weight: f64) -> f64 {
        match self {
            Vote::Buy => weight,
            Vote::Sell => -weight,
            Vote::Abstain => 0.0,
        }
    }
}

/// Scored decision for one instrument at one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub code: String,
    pub timestamp: NaiveDateTime,
    pub action: Action,
    pub score: f64,
    /// Contributor name to signed weight, only for contributors that voted.
    pub contributions: BTreeMap<String, f64>,
}

/// The bar pair a contributor votes on.
#[derive(Debug, Clone, Copy)]
pub struct SignalContext<'a> {
    pub current: &'a IndicatorSnapshot,
    pub previous: &'a IndicatorSnapshot,
    pub price: f64,
}

/// A single indicator's vote in the confluence score.
pub trait Contributor: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;
    fn weight(&self) -> f64;
    fn vote(&self, ctx: &SignalContext<'_>) -> Vote;
}

/// `a - b` moved from <= 0 to > 0 between the two snapshots.
pub fn crossed_above(prev_diff: f64, curr_diff: f64) -> bool {
    prev_diff <= 0.0 && curr_diff > 0.0
}

/// `a - b` moved from >= 0 to < 0 between the two snapshots.
pub fn crossed_below(prev_diff: f64, curr_diff: f64) -> bool {
    prev_diff >= 0.0 && curr_diff < 0.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct RsiContributor {
    pub weight: f64,
    pub oversold: f64,
    pub overbought: f64,
}

impl Contributor for RsiContributor {
    fn name(&self) -> &str {
        "rsi"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn vote(&self, ctx: &SignalContext<'_>) -> Vote {
        if ctx.current.rsi < self.oversold {
            Vote::Buy
        } else if ctx.current.rsi > self.overbought {
            Vote::Sell
        } else {
            Vote::Abstain
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacdContributor {
    pub weight: f64,
}

impl Contributor for MacdContributor {
    fn name(&self) -> &str {
        "macd"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn vote(&self, ctx: &SignalContext<'_>) -> Vote {
        let (prev, curr) = (ctx.previous.macd_hist, ctx.current.macd_hist);
        if crossed_above(prev, curr) {
            Vote::Buy
        } else if crossed_below(prev, curr) {
            Vote::Sell
        } else {
            Vote::Abstain
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerContributor {
    pub weight: f64,
}

impl Contributor for BollingerContributor {
    fn name(&self) -> &str {
        "bollinger"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn vote(&self, ctx: &SignalContext<'_>) -> Vote {
        if ctx.price < ctx.current.bb_lower {
            Vote::Buy
        } else if ctx.price > ctx.current.bb_upper {
            Vote::Sell
        } else {
            Vote::Abstain
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmaCrossContributor {
    pub weight: f64,
}

impl Contributor for EmaCrossContributor {
    fn name(&self) -> &str {
        "ema_cross"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn vote(&self, ctx: &SignalContext<'_>) -> Vote {
        let prev = ctx.previous.ema_fast - ctx.previous.ema_slow;
        let curr = ctx.current.ema_fast - ctx.current.ema_slow;
        if crossed_above(prev, curr) {
            Vote::Buy
        } else if crossed_below(prev, curr) {
            Vote::Sell
        } else {
            Vote::Abstain
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeContributor {
    pub weight: f64,
    pub multiplier: f64,
}

impl Contributor for VolumeContributor {
    fn name(&self) -> &str {
        "volume"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn vote(&self, ctx: &SignalContext<'_>) -> Vote {
        let high_volume = ctx.current.volume > self.multiplier * ctx.current.avg_volume;
        if !high_volume {
            return Vote::Abstain;
        }
        if ctx.price > ctx.previous.close {
            Vote::Buy
        } else if ctx.price < ctx.previous.close {
            Vote::Sell
        } else {
            Vote::Abstain
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendContributor {
    pub weight: f64,
}

impl Contributor for TrendContributor {
    fn name(&self) -> &str {
        "trend"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn vote(&self, ctx: &SignalContext<'_>) -> Vote {
        if ctx.price > ctx.current.ema_slow {
            Vote::Buy
        } else if ctx.price < ctx.current.ema_slow {
            Vote::Sell
        } else {
            Vote::Abstain
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    pub rsi: f64,
    pub macd: f64,
    pub bollinger: f64,
    pub ema_cross: f64,
    pub volume: f64,
    pub trend: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Weights {
            rsi: 2.0,
            macd: 2.0,
            bollinger: 1.5,
            ema_cross: 2.0,
            volume: 1.5,
            trend: 1.0,
        }
    }
}

/// Scoring parameters for the built-in contributors.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalParams {
    pub weights: Weights,
    pub threshold: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub volume_multiplier: f64,
}

impl Default for SignalParams {
    fn default() -> Self {
        SignalParams {
            weights: Weights::default(),
            threshold: 5.0,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            volume_multiplier: 1.5,
        }
    }
}

#[derive(Debug)]
pub struct SignalGenerator {
    contributors: Vec<Box<dyn Contributor>>,
    threshold: f64,
}

impl SignalGenerator {
    /// Generator with the six built-in contributors.
    pub fn new(params: &SignalParams) -> Self {
        let w = &params.weights;
        let mut generator = Self::empty(params.threshold);
        generator.register(Box::new(RsiContributor {
            weight: w.rsi,
            oversold: params.rsi_oversold,
            overbought: params.rsi_overbought,
        }));
        generator.register(Box::new(MacdContributor { weight: w.macd }));
        generator.register(Box::new(BollingerContributor {
            weight: w.bollinger,
        }));
        generator.register(Box::new(EmaCrossContributor {
            weight: w.ema_cross,
        }));
        generator.register(Box::new(VolumeContributor {
            weight: w.volume,
            multiplier: params.volume_multiplier,
        }));
        generator.register(Box::new(TrendContributor { weight: w.trend }));
        generator
    }

    /// Generator with no contributors; every signal is HOLD until some are
    /// registered.
    pub fn empty(threshold: f64) -> Self {
        SignalGenerator {
            contributors: Vec::new(),
            threshold,
        }
    }

    pub fn register(&mut self, contributor: Box<dyn Contributor>) {
        self.contributors.push(contributor);
    }

    /// Score the bar at `current` against the one before it.
    pub fn generate(
        &self,
        code: &str,
        current: &IndicatorSnapshot,
        previous: &IndicatorSnapshot,
        price: f64,
    ) -> Signal {
        let ctx = SignalContext {
            current,
            previous,
            price,
        };

        let mut score = 0.0;
        let mut contributions = BTreeMap::new();
        for contributor in &self.contributors {
            let value = contributor.vote(&ctx).signed(contributor.weight());
            if value != 0.0 {
                score += value;
                *contributions
                    .entry(contributor.name().to_string())
                    .or_insert(0.0) += value;
            }
        }

        let action = if score >= self.threshold {
            Action::Buy
        } else if score <= -self.threshold {
            Action::Sell
        } else {
            Action::Hold
        };

        if action != Action::Hold {
            debug!(
                "{} {} at {} (score {:.2}, {:?})",
                code, action, current.timestamp, score, contributions
            );
        }

        Signal {
            code: code.to_string(),
            timestamp: current.timestamp,
            action,
            score,
            contributions,
        }
    }

    /// Signal for the last bar of `history`, recomputing both snapshots from
    /// scratch. Needs one bar beyond the indicator warmup.
    pub fn signal_for_history(
        &self,
        code: &str,
        history: &[OhlcvBar],
        params: &IndicatorParams,
    ) -> Result<Signal, Insufficient> {
        let need = params.min_history() + 1;
        if history.len() < need {
            return Err(Insufficient {
                have: history.len(),
                need,
            });
        }
        let current = compute(history, params)?;
        let previous = compute(&history[..history.len() - 1], params)?;
        Ok(self.generate(code, &current, &previous, current.close))
    }

    /// Action for the last bar of `history`; HOLD while history is too short.
    pub fn action_for_history(
        &self,
        code: &str,
        history: &[OhlcvBar],
        params: &IndicatorParams,
    ) -> Action {
        self.signal_for_history(code, history, params)
            .map(|s| s.action)
            .unwrap_or(Action::Hold)
    }
}
