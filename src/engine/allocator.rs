//! Sentiment blending into raw target weights.

use crate::config::NormalizationMode;
use crate::engine::weights::WeightVector;
use crate::judge::SentimentScore;
use crate::utils::decimal::{decimal_from_f64, safe_div};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

/// Blends an account's current allocation with a signal-derived target
/// allocation.
///
/// `raw[s] = (1 - w) * current[s] + w * normalized[s]` where `w` is the
/// request's sentiment weight. A ticker with no signal blends as a
/// neutral zero score. With `w = 0` the current weights come back
/// untouched, bit for bit.
pub struct SignalAllocator {
    normalization: NormalizationMode,
}

impl SignalAllocator {
    pub fn new(normalization: NormalizationMode) -> Self {
        Self { normalization }
    }

    /// Compute the raw (unconstrained) target weight vector over the
    /// security universe.
    pub fn raw_target(
        &self,
        current: &WeightVector,
        signals: &HashMap<String, SentimentScore>,
        universe: &[String],
        sentiment_weight: Decimal,
    ) -> WeightVector {
        // Pass-through still spans the whole universe so downstream
        // constraint checks see every sector, with unheld tickers at zero.
        if sentiment_weight == Decimal::ZERO {
            let weights: BTreeMap<String, Decimal> = universe
                .iter()
                .map(|ticker| (ticker.clone(), current.weight(ticker)))
                .collect();
            return WeightVector::new(weights, current.cash);
        }

        let scores: BTreeMap<String, Decimal> = universe
            .iter()
            .map(|ticker| {
                let score = signals
                    .get(ticker)
                    .map(|s| s.score)
                    .unwrap_or(Decimal::ZERO);
                (ticker.clone(), score)
            })
            .collect();
        let normalized = self.normalize(&scores);

        let passive = Decimal::ONE - sentiment_weight;
        let weights: BTreeMap<String, Decimal> = normalized
            .into_iter()
            .map(|(ticker, signal)| {
                let blended = passive * current.weight(&ticker) + sentiment_weight * signal;
                (ticker, blended)
            })
            .collect();

        // The signal distribution carries no cash component, so cash only
        // keeps its passive share.
        WeightVector::new(weights, passive * current.cash)
    }

    /// Rescale scores into a non-negative distribution summing to 1.
    fn normalize(&self, scores: &BTreeMap<String, Decimal>) -> BTreeMap<String, Decimal> {
        if scores.is_empty() {
            return BTreeMap::new();
        }

        match self.normalization {
            NormalizationMode::Minmax => Self::minmax(scores),
            NormalizationMode::Softmax => Self::softmax(scores),
        }
    }

    fn minmax(scores: &BTreeMap<String, Decimal>) -> BTreeMap<String, Decimal> {
        let min = scores.values().copied().min().unwrap_or(Decimal::ZERO);
        let shifted_total: Decimal = scores.values().map(|s| *s - min).sum();

        // All-equal scores carry no ranking information; degrade to
        // uniform.
        if shifted_total == Decimal::ZERO {
            let uniform = safe_div(Decimal::ONE, Decimal::from(scores.len() as u64));
            return scores.keys().map(|t| (t.clone(), uniform)).collect();
        }

        scores
            .iter()
            .map(|(ticker, score)| (ticker.clone(), (*score - min) / shifted_total))
            .collect()
    }

    fn softmax(scores: &BTreeMap<String, Decimal>) -> BTreeMap<String, Decimal> {
        let exps: BTreeMap<String, f64> = scores
            .iter()
            .map(|(ticker, score)| {
                (ticker.clone(), score.to_f64().unwrap_or(0.0).exp())
            })
            .collect();
        let total: f64 = exps.values().sum();

        exps.into_iter()
            .map(|(ticker, exp)| (ticker, decimal_from_f64(exp / total)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn universe() -> Vec<String> {
        ["AAPL", "MSFT", "V", "JNJ"]
            .iter()
            .map(|t| t.to_string())
            .collect()
    }

    fn signal(ticker: &str, score: Decimal) -> (String, SentimentScore) {
        (
            ticker.to_string(),
            SentimentScore {
                ticker: ticker.to_string(),
                score,
                as_of: NaiveDate::from_ymd_opt(2025, 8, 25).unwrap(),
            },
        )
    }

    fn current() -> WeightVector {
        let weights: BTreeMap<String, Decimal> = [
            ("AAPL".to_string(), dec!(0.08)),
            ("V".to_string(), dec!(0.05)),
        ]
        .into_iter()
        .collect();
        WeightVector::new(weights, dec!(0.87))
    }

    #[test]
    fn test_zero_sentiment_weight_is_exact_pass_through() {
        let allocator = SignalAllocator::new(NormalizationMode::Minmax);
        let signals: HashMap<String, SentimentScore> =
            [signal("AAPL", dec!(0.56)), signal("MSFT", dec!(-0.3))]
                .into_iter()
                .collect();

        let raw = allocator.raw_target(&current(), &signals, &universe(), Decimal::ZERO);

        // Every current weight comes back bit for bit; unheld universe
        // tickers appear at exactly zero.
        for ticker in universe() {
            assert_eq!(raw.weight(&ticker), current().weight(&ticker));
        }
        assert_eq!(raw.cash, current().cash);
        assert_eq!(raw.weights.len(), universe().len());
    }

    #[test]
    fn test_blend_sums_to_one() {
        let allocator = SignalAllocator::new(NormalizationMode::Minmax);
        let signals: HashMap<String, SentimentScore> =
            [signal("AAPL", dec!(0.56)), signal("MSFT", dec!(0.04))]
                .into_iter()
                .collect();

        let raw = allocator.raw_target(&current(), &signals, &universe(), dec!(0.20));
        assert!((raw.total() - Decimal::ONE).abs() < dec!(0.000000001));
        assert!(raw.weights.values().all(|w| *w >= Decimal::ZERO));
    }

    #[test]
    fn test_missing_signal_blends_as_neutral() {
        let allocator = SignalAllocator::new(NormalizationMode::Minmax);
        // Only AAPL has a view; JNJ and the min-score tickers get nothing.
        let signals: HashMap<String, SentimentScore> =
            [signal("AAPL", dec!(1.0))].into_iter().collect();

        let raw = allocator.raw_target(&current(), &signals, &universe(), dec!(0.20));

        // Scores are [1, 0, 0, 0]: the whole signal mass lands on AAPL.
        assert_eq!(raw.weight("AAPL"), dec!(0.8) * dec!(0.08) + dec!(0.2));
        // JNJ is unheld and unsignaled: stays at zero.
        assert_eq!(raw.weight("JNJ"), Decimal::ZERO);
    }

    #[test]
    fn test_all_equal_scores_degrade_to_uniform() {
        let allocator = SignalAllocator::new(NormalizationMode::Minmax);
        let signals: HashMap<String, SentimentScore> = [
            signal("AAPL", dec!(0.3)),
            signal("MSFT", dec!(0.3)),
            signal("V", dec!(0.3)),
            signal("JNJ", dec!(0.3)),
        ]
        .into_iter()
        .collect();

        let raw = allocator.raw_target(&current(), &signals, &universe(), dec!(1.0));
        assert_eq!(raw.weight("AAPL"), dec!(0.25));
        assert_eq!(raw.weight("JNJ"), dec!(0.25));
        assert_eq!(raw.cash, Decimal::ZERO);
    }

    #[test]
    fn test_softmax_orders_by_score() {
        let allocator = SignalAllocator::new(NormalizationMode::Softmax);
        let signals: HashMap<String, SentimentScore> = [
            signal("AAPL", dec!(0.9)),
            signal("MSFT", dec!(0.1)),
            signal("V", dec!(-0.5)),
        ]
        .into_iter()
        .collect();

        let raw = allocator.raw_target(&current(), &signals, &universe(), dec!(1.0));
        assert!(raw.weight("AAPL") > raw.weight("MSFT"));
        assert!(raw.weight("MSFT") > raw.weight("JNJ"));
        assert!(raw.weight("JNJ") > raw.weight("V"));
        assert!((raw.total() - Decimal::ONE).abs() < dec!(0.0001));
    }
}
