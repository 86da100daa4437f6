//! Capability trait for the signal/data source the engine consumes.
//!
//! The engine depends only on this interface; whether the canned stub or
//! the networked Robo Judge client sits behind it is a construction-time
//! configuration choice.

use crate::error::EngineError;
use crate::judge::types::{AccountSnapshot, Security, SentimentScore};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Source of account snapshots, security reference data, and sentiment
/// signals.
///
/// Every fetch fails with [`EngineError::DataUnavailable`] when the
/// collaborator cannot produce data for the requested date or ids. The
/// engine never substitutes defaults for a failed fetch.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Fetch account snapshots. An empty id slice means all accounts.
    async fn fetch_accounts(
        &self,
        account_ids: &[String],
    ) -> Result<Vec<AccountSnapshot>, EngineError>;

    /// Fetch the security universe (sector membership, reference price,
    /// average daily volume) as of the given date.
    async fn fetch_securities(&self, as_of: NaiveDate) -> Result<Vec<Security>, EngineError>;

    /// Fetch sentiment scores for the given tickers as of the given date.
    ///
    /// A ticker absent from a non-empty result simply has no signal for
    /// that date; an empty result for the requested date is a failure.
    async fn fetch_signals(
        &self,
        as_of: NaiveDate,
        tickers: &[String],
    ) -> Result<HashMap<String, SentimentScore>, EngineError>;

    /// Cheap liveness probe used by health reporting.
    async fn ping(&self) -> Result<(), EngineError>;
}
