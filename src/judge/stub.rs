//! In-process canned signal source for development and tests.

use crate::error::EngineError;
use crate::judge::traits::SignalSource;
use crate::judge::types::{
    AccountSnapshot, PositionSnapshot, Security, SentimentRecord, SentimentScore,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Canned implementation of [`SignalSource`].
///
/// Serves a fixed dataset for a single as-of date; any other date fails
/// with `DataUnavailable`, matching the remote Judge's behavior when it
/// has no bars for the requested day.
pub struct StubJudge {
    as_of: NaiveDate,
    accounts: Vec<AccountSnapshot>,
    securities: Vec<Security>,
    signals: Vec<SentimentScore>,
}

impl StubJudge {
    /// Create an empty stub serving the given as-of date.
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            accounts: Vec::new(),
            securities: Vec::new(),
            signals: Vec::new(),
        }
    }

    /// The default canned dataset: eight large-cap securities across five
    /// sectors, four client accounts, and three sentiment records.
    pub fn canned() -> Self {
        let as_of = NaiveDate::from_ymd_opt(2025, 8, 25).expect("valid date");

        let mut stub = Self::new(as_of)
            .with_security("AAPL", "Information Technology", dec!(227.13), dec!(82000000))
            .with_security("MSFT", "Information Technology", dec!(430.55), dec!(25000000))
            .with_security("NVDA", "Information Technology", dec!(116.22), dec!(60000000))
            .with_security("AMZN", "Consumer Discretionary", dec!(171.40), dec!(50000000))
            .with_security("TSLA", "Consumer Discretionary", dec!(238.65), dec!(150000000))
            .with_security("V", "Financials", dec!(278.90), dec!(7000000))
            .with_security("JNJ", "Health Care", dec!(162.40), dec!(9000000))
            .with_security("XOM", "Energy", dec!(117.85), dec!(16000000))
            .with_account("C001", dec!(25000), &[("AAPL", dec!(120)), ("MSFT", dec!(80))])
            .with_account("C002", dec!(40000), &[("V", dec!(50))])
            .with_account("C003", dec!(150000), &[("NVDA", dec!(30))])
            .with_account("C004", dec!(12000), &[("TSLA", dec!(20)), ("AAPL", dec!(15))]);

        // Sentiment rows carry the Judge's wire confidence and are rescaled
        // the same way the remote client rescales them.
        for (ticker, label, confidence) in [
            ("AAPL", "pos", dec!(0.78)),
            ("TSLA", "neg", dec!(0.66)),
            ("MSFT", "neu", dec!(0.52)),
        ] {
            let record = SentimentRecord {
                date: as_of,
                ticker: ticker.to_string(),
                label: label.to_string(),
                score: confidence,
                source: None,
            };
            stub = stub.with_signal(ticker, record.tilt());
        }

        stub
    }

    /// Add a security to the served universe.
    pub fn with_security(
        mut self,
        ticker: &str,
        sector: &str,
        close: Decimal,
        adv: Decimal,
    ) -> Self {
        self.securities.push(Security {
            ticker: ticker.to_string(),
            sector: sector.to_string(),
            close,
            adv,
        });
        self
    }

    /// Add an account snapshot with the given cash balance and holdings.
    pub fn with_account(
        mut self,
        account_id: &str,
        cash: Decimal,
        holdings: &[(&str, Decimal)],
    ) -> Self {
        self.accounts.push(AccountSnapshot {
            account_id: account_id.to_string(),
            cash,
            positions: holdings
                .iter()
                .map(|(ticker, quantity)| PositionSnapshot {
                    ticker: ticker.to_string(),
                    quantity: *quantity,
                })
                .collect(),
        });
        self
    }

    /// Add a sentiment score already rescaled into [-1, 1].
    pub fn with_signal(mut self, ticker: &str, score: Decimal) -> Self {
        self.signals.push(SentimentScore {
            ticker: ticker.to_string(),
            score,
            as_of: self.as_of,
        });
        self
    }
}

#[async_trait]
impl SignalSource for StubJudge {
    async fn fetch_accounts(
        &self,
        account_ids: &[String],
    ) -> Result<Vec<AccountSnapshot>, EngineError> {
        let matched: Vec<AccountSnapshot> = self
            .accounts
            .iter()
            .filter(|a| account_ids.is_empty() || account_ids.contains(&a.account_id))
            .cloned()
            .collect();

        if matched.is_empty() {
            return Err(EngineError::DataUnavailable(format!(
                "no accounts found for ids {account_ids:?}"
            )));
        }
        Ok(matched)
    }

    async fn fetch_securities(&self, as_of: NaiveDate) -> Result<Vec<Security>, EngineError> {
        if as_of != self.as_of || self.securities.is_empty() {
            return Err(EngineError::DataUnavailable(format!(
                "no security data for {as_of}"
            )));
        }
        Ok(self.securities.clone())
    }

    async fn fetch_signals(
        &self,
        as_of: NaiveDate,
        tickers: &[String],
    ) -> Result<HashMap<String, SentimentScore>, EngineError> {
        if as_of != self.as_of || self.signals.is_empty() {
            return Err(EngineError::DataUnavailable(format!(
                "no sentiment data for {as_of}"
            )));
        }

        Ok(self
            .signals
            .iter()
            .filter(|s| tickers.is_empty() || tickers.contains(&s.ticker))
            .map(|s| (s.ticker.clone(), s.clone()))
            .collect())
    }

    async fn ping(&self) -> Result<(), EngineError> {
        Ok(())
    }
}
