//! Rebalance orchestration: request validation, Judge fetches, per-account
//! planning, and order registration.

use crate::config::Config;
use crate::engine::allocator::SignalAllocator;
use crate::engine::projector::{ConstraintProjector, Filters};
use crate::engine::pricer::ImpactPricer;
use crate::engine::translator::DeltaTranslator;
use crate::engine::weights::value_account;
use crate::error::EngineError;
use crate::judge::{AccountSnapshot, Security, SentimentScore, SignalSource};
use crate::orders::{AckAction, AckReport, Order, OrderProposal, OrderStore};
use chrono::NaiveDate;
use futures_util::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

/// One rebalance call's parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceRequest {
    pub as_of: NaiveDate,
    #[serde(default)]
    pub filters: Filters,
    /// Blend coefficient between current weights and the signal-derived
    /// target, in [0, 1]
    #[serde(default = "default_sentiment_weight")]
    pub sentiment_weight: Decimal,
}

fn default_sentiment_weight() -> Decimal {
    Decimal::new(20, 2) // 0.20
}

/// Machine-readable failure carried in response payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&EngineError> for ErrorReport {
    fn from(err: &EngineError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// A security dropped from an account's batch, with the reason.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedOrder {
    pub ticker: String,
    pub kind: String,
    pub message: String,
}

/// Feasibility outcome for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Ok,
    Failed,
}

/// Per-account slice of a rebalance response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResult {
    pub account_id: String,
    pub status: AccountStatus,
    pub orders: Vec<Order>,
    pub skipped: Vec<SkippedOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

/// The set of orders produced by one rebalance call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBatch {
    pub batch_id: String,
    pub as_of: NaiveDate,
    pub accounts: Vec<AccountResult>,
}

/// An acknowledgement call targeting one order or a whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckRequest {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
    pub action: AckAction,
}

/// Engine liveness, degraded when the Judge is unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

struct AccountPlan {
    proposals: Vec<OrderProposal>,
    skipped: Vec<SkippedOrder>,
}

/// The rebalancing and pricing engine.
///
/// Holds its signal source by reference for its whole lifetime; which
/// implementation sits behind the trait is decided at construction.
pub struct RebalanceEngine {
    judge: Arc<dyn SignalSource>,
    allocator: SignalAllocator,
    projector: ConstraintProjector,
    translator: DeltaTranslator,
    pricer: ImpactPricer,
    store: OrderStore,
    judge_timeout: Duration,
}

impl RebalanceEngine {
    pub fn new(config: &Config, judge: Arc<dyn SignalSource>) -> Self {
        Self {
            judge,
            allocator: SignalAllocator::new(config.engine.normalization),
            projector: ConstraintProjector::new(config.engine.max_projection_iterations),
            translator: DeltaTranslator::new(config.orders.lot_size),
            pricer: ImpactPricer::new(&config.impact),
            store: OrderStore::new(config.orders.ttl_secs),
            judge_timeout: Duration::from_secs(config.judge.timeout_secs),
        }
    }

    /// Wrap a Judge call in the configured timeout; expiry surfaces as a
    /// retryable fetch failure instead of blocking the request.
    async fn fetch<T>(
        &self,
        what: &str,
        call: impl Future<Output = Result<T, EngineError>>,
    ) -> Result<T, EngineError> {
        match timeout(self.judge_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::DataUnavailable(format!(
                "{what} fetch timed out after {}s",
                self.judge_timeout.as_secs()
            ))),
        }
    }

    /// Run one rebalance call: fetch snapshots and signals, plan every
    /// account independently, and register the surviving orders as
    /// `Proposed` under a fresh batch id.
    ///
    /// A failing account never aborts its siblings, and an account's
    /// orders register only after the whole account succeeded.
    #[instrument(skip(self, request), fields(as_of = %request.as_of))]
    pub async fn rebalance(&self, request: &RebalanceRequest) -> Result<OrderBatch, EngineError> {
        request.filters.validate()?;
        if request.sentiment_weight < Decimal::ZERO || request.sentiment_weight > Decimal::ONE {
            return Err(EngineError::InfeasibleConstraints(format!(
                "sentimentWeight {} outside [0, 1]",
                request.sentiment_weight
            )));
        }

        let accounts = self
            .fetch("account", self.judge.fetch_accounts(&request.filters.account_ids))
            .await?;
        let universe_list = self
            .fetch("security", self.judge.fetch_securities(request.as_of))
            .await?;

        let universe: Vec<String> = universe_list.iter().map(|s| s.ticker.clone()).collect();
        let sectors: HashMap<String, String> = universe_list
            .iter()
            .map(|s| (s.ticker.clone(), s.sector.clone()))
            .collect();
        let securities: HashMap<String, Security> = universe_list
            .into_iter()
            .map(|s| (s.ticker.clone(), s))
            .collect();

        let signals = self
            .fetch("signal", self.judge.fetch_signals(request.as_of, &universe))
            .await?;

        let planned = join_all(accounts.iter().map(|account| {
            let securities = &securities;
            let sectors = &sectors;
            let signals = &signals;
            let universe = &universe;
            async move {
                let plan =
                    self.plan_account(account, securities, sectors, signals, universe, request);
                (account.account_id.clone(), plan)
            }
        }))
        .await;

        let batch_id = self.store.next_batch_id();
        let mut results = Vec::new();
        let mut order_count = 0;
        for (account_id, plan) in planned {
            match plan {
                Ok(plan) => {
                    let orders = self.store.register(&batch_id, plan.proposals).await;
                    order_count += orders.len();
                    results.push(AccountResult {
                        account_id,
                        status: AccountStatus::Ok,
                        orders,
                        skipped: plan.skipped,
                        error: None,
                    });
                }
                Err(err) => {
                    warn!(%account_id, kind = err.kind(), %err, "Account rebalance failed");
                    results.push(AccountResult {
                        account_id,
                        status: AccountStatus::Failed,
                        orders: Vec::new(),
                        skipped: Vec::new(),
                        error: Some(ErrorReport::from(&err)),
                    });
                }
            }
        }

        info!(
            %batch_id,
            accounts = results.len(),
            orders = order_count,
            "Rebalance complete"
        );

        Ok(OrderBatch {
            batch_id,
            as_of: request.as_of,
            accounts: results,
        })
    }

    /// Pure per-account pipeline: value, blend, project, translate, price.
    fn plan_account(
        &self,
        account: &AccountSnapshot,
        securities: &HashMap<String, Security>,
        sectors: &HashMap<String, String>,
        signals: &HashMap<String, SentimentScore>,
        universe: &[String],
        request: &RebalanceRequest,
    ) -> Result<AccountPlan, EngineError> {
        let valuation = value_account(account, securities)?;
        let raw = self.allocator.raw_target(
            &valuation.current,
            signals,
            universe,
            request.sentiment_weight,
        );
        let feasible = self.projector.project(&raw, sectors, &request.filters)?;
        let drafts = self
            .translator
            .translate(&valuation.current, &feasible, valuation.nav, securities);

        let mut proposals = Vec::new();
        let mut skipped = Vec::new();
        for draft in drafts {
            let security = match securities.get(&draft.ticker) {
                Some(security) => security,
                None => continue,
            };
            match self.pricer.expected_price(
                &draft.ticker,
                draft.side,
                draft.quantity,
                security.close,
                security.adv,
            ) {
                Ok(expected_price) => proposals.push(OrderProposal {
                    account_id: account.account_id.clone(),
                    ticker: draft.ticker,
                    side: draft.side,
                    quantity: draft.quantity,
                    expected_price,
                    as_of: request.as_of,
                }),
                Err(err @ EngineError::InvalidLiquidity { .. }) => skipped.push(SkippedOrder {
                    ticker: draft.ticker,
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                }),
                Err(err) => return Err(err),
            }
        }

        Ok(AccountPlan { proposals, skipped })
    }

    /// Apply an acknowledgement to one order or a whole batch.
    #[instrument(skip(self, request))]
    pub async fn acknowledge(&self, request: &AckRequest) -> Result<AckReport, EngineError> {
        match (&request.order_id, &request.batch_id) {
            (Some(order_id), _) => {
                let outcome = self.store.apply(order_id, request.action).await?;
                Ok(AckReport {
                    outcomes: vec![outcome],
                    failures: Vec::new(),
                })
            }
            (None, Some(batch_id)) => self.store.apply_batch(batch_id, request.action).await,
            (None, None) => Err(EngineError::InvalidTransition(
                "acknowledgement carries neither an order id nor a batch id".to_string(),
            )),
        }
    }

    /// Liveness of the engine and its signal source; a dead Judge
    /// degrades the report instead of failing the process.
    pub async fn health(&self) -> HealthReport {
        match timeout(self.judge_timeout, self.judge.ping()).await {
            Ok(Ok(())) => HealthReport {
                status: HealthStatus::Ok,
                detail: None,
            },
            Ok(Err(err)) => HealthReport {
                status: HealthStatus::Degraded,
                detail: Some(err.to_string()),
            },
            Err(_) => HealthReport {
                status: HealthStatus::Degraded,
                detail: Some(format!(
                    "signal source ping timed out after {}s",
                    self.judge_timeout.as_secs()
                )),
            },
        }
    }
}
