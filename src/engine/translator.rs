//! Translation of weight deltas into discrete order drafts.

use crate::engine::weights::WeightVector;
use crate::judge::Security;
use crate::orders::OrderSide;
use crate::utils::decimal::round_down_to_lot;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A not-yet-priced order produced from one weight delta.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub ticker: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    /// Signed notional change this draft targets, before lot rounding
    pub delta_value: Decimal,
}

/// Converts (current weight, target weight, NAV) into buy/sell drafts.
///
/// Quantities round toward zero to the configured lot size; whole shares
/// by default, fractional lots when the boundary convention allows them.
/// Zero-quantity deltas are dropped rather than emitted as no-op orders.
pub struct DeltaTranslator {
    lot_size: Decimal,
}

impl DeltaTranslator {
    pub fn new(lot_size: Decimal) -> Self {
        Self { lot_size }
    }

    pub fn translate(
        &self,
        current: &WeightVector,
        target: &WeightVector,
        nav: Decimal,
        securities: &HashMap<String, Security>,
    ) -> Vec<OrderDraft> {
        let mut drafts = Vec::new();

        for (ticker, target_weight) in &target.weights {
            let delta_value = (*target_weight - current.weight(ticker)) * nav;
            if delta_value == Decimal::ZERO {
                continue;
            }

            let close = match securities.get(ticker) {
                Some(security) if security.close > Decimal::ZERO => security.close,
                _ => continue,
            };

            let quantity = round_down_to_lot(delta_value.abs() / close, self.lot_size);
            if quantity == Decimal::ZERO {
                continue;
            }

            drafts.push(OrderDraft {
                ticker: ticker.clone(),
                side: if delta_value > Decimal::ZERO {
                    OrderSide::Buy
                } else {
                    OrderSide::Sell
                },
                quantity,
                delta_value,
            });
        }

        drafts
    }
}
