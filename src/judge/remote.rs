//! Networked Robo Judge client.

use crate::config::JudgeConfig;
use crate::error::EngineError;
use crate::judge::traits::SignalSource;
use crate::judge::types::{
    AccountSnapshot, ClientPage, ClientRecord, HoldingRecord, IndexRecord, PositionSnapshot,
    PriceRecord, Security, SentimentRecord, SentimentScore,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Remote implementation of [`SignalSource`] against the Robo Judge API.
///
/// Authenticates with a static `X-API-Key` header; the HTTP client carries
/// a request timeout from configuration.
pub struct RemoteJudge {
    http: Client,
    base_url: String,
    api_key: String,
}

impl RemoteJudge {
    /// Create a new Robo Judge client from configuration.
    pub fn new(config: &JudgeConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .header("X-API-Key", &self.api_key)
    }

    /// Page through GET /judge/clients.
    async fn list_clients(&self) -> Result<Vec<ClientRecord>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self.get("/judge/clients").query(&[("limit", "100")]);
            if let Some(cursor) = &cursor {
                request = request.query(&[("cursor", cursor.as_str())]);
            }

            let page: ClientPage = request
                .send()
                .await
                .context("Failed to fetch clients")?
                .error_for_status()
                .context("Judge rejected clients request")?
                .json()
                .await
                .context("Failed to parse clients response")?;

            items.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(items)
    }

    async fn list_holdings(&self, account_ids: &[String]) -> Result<Vec<HoldingRecord>> {
        let mut request = self.get("/judge/holdings");
        if !account_ids.is_empty() {
            request = request.query(&[("accountIds", account_ids.join(","))]);
        }

        request
            .send()
            .await
            .context("Failed to fetch holdings")?
            .error_for_status()
            .context("Judge rejected holdings request")?
            .json()
            .await
            .context("Failed to parse holdings response")
    }

    async fn get_index(&self) -> Result<Vec<IndexRecord>> {
        self.get("/judge/index")
            .send()
            .await
            .context("Failed to fetch index constituents")?
            .error_for_status()
            .context("Judge rejected index request")?
            .json()
            .await
            .context("Failed to parse index response")
    }

    async fn get_prices(&self, date: NaiveDate) -> Result<Vec<PriceRecord>> {
        self.get("/judge/prices")
            .query(&[("date", date.to_string())])
            .send()
            .await
            .context("Failed to fetch prices")?
            .error_for_status()
            .context("Judge rejected prices request")?
            .json()
            .await
            .context("Failed to parse prices response")
    }

    async fn get_sentiment(
        &self,
        date: NaiveDate,
        tickers: &[String],
    ) -> Result<Vec<SentimentRecord>> {
        let mut request = self
            .get("/judge/sentiment")
            .query(&[("from", date.to_string()), ("to", date.to_string())]);
        if !tickers.is_empty() {
            request = request.query(&[("tickers", tickers.join(","))]);
        }

        request
            .send()
            .await
            .context("Failed to fetch sentiment")?
            .error_for_status()
            .context("Judge rejected sentiment request")?
            .json()
            .await
            .context("Failed to parse sentiment response")
    }
}

fn unavailable(err: anyhow::Error) -> EngineError {
    EngineError::DataUnavailable(format!("{err:#}"))
}

#[async_trait]
impl SignalSource for RemoteJudge {
    #[instrument(skip(self))]
    async fn fetch_accounts(
        &self,
        account_ids: &[String],
    ) -> Result<Vec<AccountSnapshot>, EngineError> {
        let clients = self.list_clients().await.map_err(unavailable)?;
        let holdings = self.list_holdings(account_ids).await.map_err(unavailable)?;

        let mut positions: HashMap<String, Vec<PositionSnapshot>> = HashMap::new();
        for holding in holdings {
            positions
                .entry(holding.account_id)
                .or_default()
                .push(PositionSnapshot {
                    ticker: holding.ticker,
                    quantity: holding.qty,
                });
        }

        let accounts: Vec<AccountSnapshot> = clients
            .into_iter()
            .filter(|c| account_ids.is_empty() || account_ids.contains(&c.client_id))
            .map(|c| AccountSnapshot {
                positions: positions.remove(&c.client_id).unwrap_or_default(),
                account_id: c.client_id,
                cash: c.cash,
            })
            .collect();

        if accounts.is_empty() {
            return Err(EngineError::DataUnavailable(format!(
                "no accounts found for ids {account_ids:?}"
            )));
        }

        debug!(accounts = accounts.len(), "Fetched account snapshots");
        Ok(accounts)
    }

    #[instrument(skip(self))]
    async fn fetch_securities(&self, as_of: NaiveDate) -> Result<Vec<Security>, EngineError> {
        let index = self.get_index().await.map_err(unavailable)?;
        let prices = self.get_prices(as_of).await.map_err(unavailable)?;

        let bars: HashMap<&str, &PriceRecord> = prices
            .iter()
            .filter(|p| p.date == as_of)
            .map(|p| (p.ticker.as_str(), p))
            .collect();

        // Constituents without a bar for the day drop out of the universe.
        let securities: Vec<Security> = index
            .into_iter()
            .filter_map(|constituent| {
                bars.get(constituent.ticker.as_str()).map(|bar| Security {
                    ticker: constituent.ticker,
                    sector: constituent.sector,
                    close: bar.close,
                    adv: bar.adv.unwrap_or(Decimal::ZERO),
                })
            })
            .collect();

        if securities.is_empty() {
            return Err(EngineError::DataUnavailable(format!(
                "no security data for {as_of}"
            )));
        }

        debug!(securities = securities.len(), "Fetched security universe");
        Ok(securities)
    }

    #[instrument(skip(self))]
    async fn fetch_signals(
        &self,
        as_of: NaiveDate,
        tickers: &[String],
    ) -> Result<HashMap<String, SentimentScore>, EngineError> {
        let records = self.get_sentiment(as_of, tickers).await.map_err(unavailable)?;

        let signals: HashMap<String, SentimentScore> = records
            .into_iter()
            .filter(|r| r.date == as_of)
            .map(|r| {
                let score = SentimentScore {
                    ticker: r.ticker.clone(),
                    score: r.tilt(),
                    as_of: r.date,
                };
                (r.ticker, score)
            })
            .collect();

        if signals.is_empty() {
            return Err(EngineError::DataUnavailable(format!(
                "no sentiment data for {as_of}"
            )));
        }

        Ok(signals)
    }

    #[instrument(skip(self))]
    async fn ping(&self) -> Result<(), EngineError> {
        self.get("/health")
            .send()
            .await
            .context("Failed to reach judge")
            .and_then(|r| r.error_for_status().context("Judge health check failed"))
            .map(|_| ())
            .map_err(unavailable)
    }
}
