//! Portfolio weight vectors and account valuation.

use crate::error::EngineError;
use crate::judge::{AccountSnapshot, Security};
use crate::utils::decimal::safe_div;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

/// Per-account allocation: security weights plus the cash weight.
///
/// A feasible vector's security weights and cash sum to exactly 1. Raw
/// vectors produced mid-pipeline may not satisfy that yet; the constraint
/// projector restores it.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightVector {
    /// Security weight per ticker; BTreeMap keeps iteration deterministic
    pub weights: BTreeMap<String, Decimal>,
    pub cash: Decimal,
}

impl WeightVector {
    pub fn new(weights: BTreeMap<String, Decimal>, cash: Decimal) -> Self {
        Self { weights, cash }
    }

    /// Weight of one security; absent tickers weigh zero.
    pub fn weight(&self, ticker: &str) -> Decimal {
        self.weights.get(ticker).copied().unwrap_or(Decimal::ZERO)
    }

    /// Sum of all security weights, excluding cash.
    pub fn security_total(&self) -> Decimal {
        self.weights.values().sum()
    }

    /// Sum of all weights including cash.
    pub fn total(&self) -> Decimal {
        self.security_total() + self.cash
    }
}

/// An account's net asset value and current allocation.
#[derive(Debug, Clone)]
pub struct AccountValuation {
    pub nav: Decimal,
    pub current: WeightVector,
}

/// Derive NAV and current weights from an account snapshot at reference
/// prices.
///
/// Fails when a held security has no price in the universe or when the
/// snapshot's NAV is not positive; either way the account is unusable for
/// rebalancing.
pub fn value_account(
    account: &AccountSnapshot,
    securities: &HashMap<String, Security>,
) -> Result<AccountValuation, EngineError> {
    let mut market_values: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut nav = account.cash;

    for position in &account.positions {
        let security = securities.get(&position.ticker).ok_or_else(|| {
            EngineError::DataUnavailable(format!(
                "no price for {} held by {}",
                position.ticker, account.account_id
            ))
        })?;
        let value = position.quantity * security.close;
        *market_values.entry(position.ticker.clone()).or_default() += value;
        nav += value;
    }

    if nav <= Decimal::ZERO {
        return Err(EngineError::DataUnavailable(format!(
            "account {} has non-positive NAV {nav}",
            account.account_id
        )));
    }

    let weights: BTreeMap<String, Decimal> = market_values
        .into_iter()
        .map(|(ticker, value)| (ticker, safe_div(value, nav)))
        .collect();
    let cash = safe_div(account.cash, nav);

    Ok(AccountValuation {
        nav,
        current: WeightVector::new(weights, cash),
    })
}
