//! Impact-aware execution pricing.

use crate::config::ImpactConfig;
use crate::error::EngineError;
use crate::orders::OrderSide;
use crate::utils::decimal::{decimal_from_f64, round_to_tick, safe_div};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Prices orders through a bounded S-curve market-impact model.
///
/// Participation rate `p = quantity / adv` feeds a logistic curve
/// `impact(p) = impact_max * (2 / (1 + e^(-k*p)) - 1)`: zero at zero
/// participation, monotonically increasing, asymptotic to `impact_max`.
/// The price always moves against the trader.
pub struct ImpactPricer {
    impact_max: Decimal,
    steepness: f64,
}

impl ImpactPricer {
    pub fn new(config: &ImpactConfig) -> Self {
        Self {
            impact_max: config.impact_max,
            steepness: config.steepness.to_f64().unwrap_or(0.0),
        }
    }

    /// Slippage fraction for an unsigned participation rate.
    pub fn impact(&self, participation: Decimal) -> Decimal {
        let p = participation.abs().to_f64().unwrap_or(0.0);
        let logistic = 2.0 / (1.0 + (-self.steepness * p).exp()) - 1.0;
        self.impact_max * decimal_from_f64(logistic)
    }

    /// Expected execution price for an order against a security's
    /// reference price and average daily volume, rounded to 4 decimal
    /// places.
    pub fn expected_price(
        &self,
        ticker: &str,
        side: OrderSide,
        quantity: Decimal,
        close: Decimal,
        adv: Decimal,
    ) -> Result<Decimal, EngineError> {
        if adv <= Decimal::ZERO && quantity != Decimal::ZERO {
            return Err(EngineError::InvalidLiquidity {
                ticker: ticker.to_string(),
                reason: format!("adv {adv} cannot absorb a {quantity}-share order"),
            });
        }

        let impact = self.impact(safe_div(quantity, adv));
        let price = match side {
            OrderSide::Buy => close * (Decimal::ONE + impact),
            OrderSide::Sell => close * (Decimal::ONE - impact),
        };

        Ok(round_to_tick(price, dec!(0.0001)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricer() -> ImpactPricer {
        ImpactPricer::new(&ImpactConfig {
            impact_max: dec!(0.002),
            steepness: dec!(4),
        })
    }

    #[test]
    fn test_impact_is_zero_at_zero_participation() {
        assert_eq!(pricer().impact(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_impact_is_strictly_increasing() {
        let pricer = pricer();
        let mut last = Decimal::ZERO;
        for p in [dec!(0.001), dec!(0.01), dec!(0.1), dec!(0.5), dec!(1), dec!(5)] {
            let impact = pricer.impact(p);
            assert!(impact > last, "impact not increasing at p = {p}");
            last = impact;
        }
    }

    #[test]
    fn test_impact_is_bounded_by_impact_max() {
        let pricer = pricer();
        for p in [dec!(1), dec!(100), dec!(1000000)] {
            assert!(pricer.impact(p) <= dec!(0.002));
        }
        // Saturates close to the bound for huge participation.
        assert!(pricer.impact(dec!(1000000)) > dec!(0.0019));
    }

    #[test]
    fn test_price_moves_against_the_trader() {
        let pricer = pricer();
        let close = dec!(227.13);
        let adv = dec!(82000000);

        let buy = pricer
            .expected_price("AAPL", OrderSide::Buy, dec!(500000), close, adv)
            .unwrap();
        let sell = pricer
            .expected_price("AAPL", OrderSide::Sell, dec!(500000), close, adv)
            .unwrap();

        assert!(buy > close);
        assert!(sell < close);
    }

    #[test]
    fn test_price_rounds_to_four_decimals() {
        let price = pricer()
            .expected_price("AAPL", OrderSide::Buy, dec!(500000), dec!(227.13), dec!(82000000))
            .unwrap();
        assert_eq!(price, price.round_dp(4));
    }

    #[test]
    fn test_non_positive_adv_is_invalid_liquidity() {
        let err = pricer()
            .expected_price("V", OrderSide::Buy, dec!(10), dec!(278.90), Decimal::ZERO)
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_LIQUIDITY");
        assert!(!err.is_retryable());
    }
}
