//! Moving-average trend classification.
//!
//! Price is compared against a short and a long EMA and SMA (50/200 by
//! default). Above all four is bullish, below all four bearish, anything in
//! between is chop.

use serde::{Deserialize, Serialize};

use common::Trend;

use crate::config::TrendRules;
use crate::indicators::{EmaIndicator, SmaIndicator};

/// Latest value of each average. `None` when the window is not yet full.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingAverages {
    pub ema_short: Option<f64>,
    pub sma_short: Option<f64>,
    pub ema_long: Option<f64>,
    pub sma_long: Option<f64>,
}

impl MovingAverages {
    fn all(&self) -> Option<[f64; 4]> {
        Some([self.ema_short?, self.sma_short?, self.ema_long?, self.sma_long?])
    }
}

/// Short EMA crossing the long EMA on the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crossover {
    Golden,
    Death,
    None,
}

/// Average change per bar of both EMAs over the last ten bars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slopes {
    pub ema_short: f64,
    pub ema_long: f64,
}

const SLOPE_BARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub price: f64,
    pub trend: Trend,
    pub description: String,
    pub averages: MovingAverages,
    /// Effective periods after clamping to the available history.
    pub short_period: usize,
    pub long_period: usize,
    pub crossover: Crossover,
    pub slopes: Option<Slopes>,
    pub points: usize,
}

/// Classify `price` against the four averages.
pub fn classify(price: f64, averages: &MovingAverages) -> (Trend, String) {
    let Some(mas) = averages.all() else {
        return (Trend::InsufficientData, "Need more data points".to_string());
    };

    if mas.iter().all(|&ma| price > ma) {
        return (Trend::Bullish, "Price above all 4 MAs - Strong uptrend".to_string());
    }
    if mas.iter().all(|&ma| price < ma) {
        return (Trend::Bearish, "Price below all 4 MAs - Strong downtrend".to_string());
    }

    let mut description = "Price between MAs - Mixed signals, choppy market".to_string();
    let [ema_short, sma_short, ..] = mas;
    if price > ema_short && price > sma_short {
        description.push_str(" (Approaching from above - potential bearish reversal)");
    } else if price < ema_short && price < sma_short {
        description.push_str(" (Approaching from below - potential bullish reversal)");
    }
    (Trend::Chop, description)
}

/// Percentage distance of `price` from a moving average.
pub fn distance_pct(price: f64, ma: f64) -> f64 {
    (price - ma) / ma * 100.0
}

pub struct TrendAnalyzer {
    rules: TrendRules,
}

impl TrendAnalyzer {
    pub fn new(rules: TrendRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &TrendRules {
        &self.rules
    }

    /// Periods actually used for `len` bars: the short period is clamped to
    /// `len - 1`, and the long period falls back to it until enough history
    /// exists.
    pub fn effective_periods(&self, len: usize) -> (usize, usize) {
        let short = self.rules.short_period.min(len.saturating_sub(1)).max(1);
        let long = if len >= self.rules.long_period {
            self.rules.long_period
        } else {
            short
        };
        (short, long)
    }

    /// Analyse closes (oldest first). `None` below the configured minimum.
    pub fn analyze(&self, closes: &[f64]) -> Option<TrendReport> {
        if closes.len() < self.rules.min_points {
            return None;
        }
        let price = *closes.last()?;
        let (short_period, long_period) = self.effective_periods(closes.len());

        let ema_short = EmaIndicator::new(short_period).series(closes);
        let ema_long = EmaIndicator::new(long_period).series(closes);

        let averages = MovingAverages {
            ema_short: ema_short.last().copied(),
            sma_short: SmaIndicator::new(short_period).latest(closes),
            ema_long: ema_long.last().copied(),
            sma_long: SmaIndicator::new(long_period).latest(closes),
        };
        let (trend, description) = classify(price, &averages);

        Some(TrendReport {
            price,
            trend,
            description,
            averages,
            short_period,
            long_period,
            crossover: crossover(&ema_short, &ema_long),
            slopes: slopes(&ema_short, &ema_long),
            points: closes.len(),
        })
    }
}

fn crossover(short: &[f64], long: &[f64]) -> Crossover {
    let n = short.len().min(long.len());
    if n < 2 {
        return Crossover::None;
    }
    let (prev_s, curr_s) = (short[n - 2], short[n - 1]);
    let (prev_l, curr_l) = (long[n - 2], long[n - 1]);

    if curr_s > curr_l && prev_s <= prev_l {
        Crossover::Golden
    } else if curr_s < curr_l && prev_s >= prev_l {
        Crossover::Death
    } else {
        Crossover::None
    }
}

fn slopes(short: &[f64], long: &[f64]) -> Option<Slopes> {
    let n = short.len().min(long.len());
    if n <= SLOPE_BARS {
        return None;
    }
    // Latest value against the one SLOPE_BARS positions back (inclusive),
    // divided by SLOPE_BARS.
    let per_bar = |series: &[f64]| (series[n - 1] - series[n - SLOPE_BARS]) / SLOPE_BARS as f64;
    Some(Slopes {
        ema_short: per_bar(short),
        ema_long: per_bar(long),
    })
}

/// Remembers the last classification so only changes are alerted.
#[derive(Debug, Clone, Default)]
pub struct TrendTracker {
    last: Option<Trend>,
}

impl TrendTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `trend`; returns `true` when it differs from the previous one.
    pub fn observe(&mut self, trend: Trend) -> bool {
        let changed = self.last != Some(trend);
        self.last = Some(trend);
        changed
    }

    pub fn last(&self) -> Option<Trend> {
        self.last
    }
}

fn money(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("${v:.2}"))
}

fn pct(price: f64, value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |ma| format!("{:+.2}%", distance_pct(price, ma)))
}

impl TrendReport {
    /// Alert body posted when the trend changes.
    pub fn alert_message(&self, symbol: &str, rules: &TrendRules) -> String {
        let (s, l) = (rules.short_period, rules.long_period);
        let a = &self.averages;
        format!(
            "{marker} **{symbol} Trend Change: {trend}**\n\
             Price: ${price:.2}\n\
             Signal: {description}\n\n\
             **Moving Averages:**\n\
             {s} EMA: {ema_s}\n\
             {s} SMA: {sma_s}\n\
             {l} EMA: {ema_l}\n\
             {l} SMA: {sma_l}\n\n\
             **Distance from MAs:**\n\
             {s} EMA: {dist_s}\n\
             {l} EMA: {dist_l}",
            marker = self.trend.marker(),
            trend = self.trend,
            price = self.price,
            description = self.description,
            ema_s = money(a.ema_short),
            sma_s = money(a.sma_short),
            ema_l = money(a.ema_long),
            sma_l = money(a.sma_long),
            dist_s = pct(self.price, a.ema_short),
            dist_l = pct(self.price, a.ema_long),
        )
    }

    /// Console report for the one-shot `report` command.
    pub fn render_text(&self, symbol: &str, rules: &TrendRules) -> String {
        let (s, l) = (rules.short_period, rules.long_period);
        let a = &self.averages;
        let mut out = String::new();

        out.push_str(&format!("📊 {symbol} analysis ({} data points)\n", self.points));
        if self.long_period != l {
            out.push_str(&format!(
                "⚠️ Not enough data for {l} MA, using {} period instead\n",
                self.long_period
            ));
        }
        out.push_str(&format!("Current Price: ${:.2}\n", self.price));
        out.push_str(&format!("Trend: {}\n", self.trend));
        out.push_str(&format!("Signal: {}\n\n", self.description));

        out.push_str("📈 Moving Averages:\n");
        for (label, value) in [
            (format!("{s} EMA"), a.ema_short),
            (format!("{s} SMA"), a.sma_short),
            (format!("{l} EMA"), a.ema_long),
            (format!("{l} SMA"), a.sma_long),
        ] {
            out.push_str(&format!("{label}: {} ({})\n", money(value), pct(self.price, value)));
        }

        out.push_str("\n🔄 Crossover Analysis:\n");
        out.push_str(match self.crossover {
            Crossover::Golden => "🟢 Golden Cross: short EMA crossed above long EMA\n",
            Crossover::Death => "🔴 Death Cross: short EMA crossed below long EMA\n",
            Crossover::None => "⚪ No recent crossover\n",
        });

        if let Some(slopes) = &self.slopes {
            let arrow = |v: f64| if v > 0.0 { "📈" } else { "📉" };
            out.push_str("\n📊 MA Slopes (trend direction):\n");
            out.push_str(&format!(
                "{s} EMA slope: {:+.4} ({})\n",
                slopes.ema_short,
                arrow(slopes.ema_short)
            ));
            out.push_str(&format!(
                "{l} EMA slope: {:+.4} ({})\n",
                slopes.ema_long,
                arrow(slopes.ema_long)
            ));
        }
        out
    }
}
