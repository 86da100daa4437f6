//! Snapshot and wire types for the Robo Judge collaborator.
//!
//! Snapshot types are what the engine consumes; wire records mirror the
//! Judge's JSON payloads (camelCase field names).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// A tradable security with its reference price and liquidity proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Security {
    pub ticker: String,
    /// Sector the security belongs to (e.g., "Information Technology")
    pub sector: String,
    /// Last reference close price
    pub close: Decimal,
    /// Average daily traded volume in shares
    pub adv: Decimal,
}

/// A single position held in an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSnapshot {
    pub ticker: String,
    pub quantity: Decimal,
}

/// Read-only account snapshot fetched fresh per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub account_id: String,
    pub cash: Decimal,
    pub positions: Vec<PositionSnapshot>,
}

/// Per-security sentiment signal, rescaled into [-1, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentScore {
    pub ticker: String,
    pub score: Decimal,
    pub as_of: NaiveDate,
}

// ==================== Judge wire records ====================

/// One page of clients from GET /judge/clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPage {
    pub items: Vec<ClientRecord>,
    pub next_cursor: Option<String>,
}

/// A brokerage client as served by the Judge.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub client_id: String,
    #[serde(default)]
    pub segment: String,
    #[serde(default)]
    pub risk_profile: String,
    /// Free cash balance; absent means the account holds no cash
    #[serde(default)]
    pub cash: Decimal,
}

/// One holding row from GET /judge/holdings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingRecord {
    pub account_id: String,
    pub ticker: String,
    pub qty: Decimal,
}

/// Index constituent from GET /judge/index, carrying sector membership.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    pub ticker: String,
    #[serde(default)]
    pub weight: Decimal,
    pub sector: String,
}

/// Daily price bar from GET /judge/prices.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub ticker: String,
    pub close: Decimal,
    #[serde(default)]
    pub adv: Option<Decimal>,
}

/// Sentiment row from GET /judge/sentiment.
///
/// The Judge serves label confidence in [0, 1]; [`SentimentRecord::tilt`]
/// rescales it into the engine's [-1, 1] signal range.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentRecord {
    pub date: NaiveDate,
    pub ticker: String,
    #[serde(default)]
    pub label: String,
    pub score: Decimal,
    #[serde(default)]
    pub source: Option<String>,
}

impl SentimentRecord {
    /// Rescale the wire confidence into a [-1, 1] tilt: (score - 0.5) * 2.
    pub fn tilt(&self) -> Decimal {
        (self.score - dec!(0.5)) * dec!(2)
    }
}
