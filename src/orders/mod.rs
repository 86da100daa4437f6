//! Proposed-order lifecycle tracking.
//!
//! Orders are created once per rebalance call and owned by the
//! [`OrderStore`] from then on; the only mutation they ever see is a state
//! transition. Transitions are compare-and-set under the store's write
//! lock, so concurrent acknowledgements racing on the same order resolve
//! to one winner and idempotent observers.

use crate::error::EngineError;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Lifecycle state of a proposed order.
///
/// `Proposed` is the only non-terminal state; everything else is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderState {
    Proposed,
    Acknowledged,
    Rejected,
    Expired,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderState::Proposed)
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderState::Proposed => write!(f, "PROPOSED"),
            OrderState::Acknowledged => write!(f, "ACKNOWLEDGED"),
            OrderState::Rejected => write!(f, "REJECTED"),
            OrderState::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Action carried by an acknowledgement call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckAction {
    Acknowledge,
    Reject,
}

impl AckAction {
    fn target_state(&self) -> OrderState {
        match self {
            AckAction::Acknowledge => OrderState::Acknowledged,
            AckAction::Reject => OrderState::Rejected,
        }
    }
}

impl fmt::Display for AckAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckAction::Acknowledge => write!(f, "acknowledge"),
            AckAction::Reject => write!(f, "reject"),
        }
    }
}

/// A trade order proposed by a rebalance call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub account_id: String,
    pub ticker: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub expected_price: Decimal,
    pub state: OrderState,
    pub created_at: DateTime<Utc>,
    pub as_of: NaiveDate,
}

/// Order fields supplied by the engine; the store assigns id, timestamp,
/// and initial state.
#[derive(Debug, Clone)]
pub struct OrderProposal {
    pub account_id: String,
    pub ticker: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub expected_price: Decimal,
    pub as_of: NaiveDate,
}

/// Outcome of one order's acknowledgement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AckOutcome {
    pub order_id: String,
    pub state: OrderState,
    /// True when the order was already in the requested terminal state
    pub duplicate: bool,
}

/// A per-order acknowledgement failure, reported machine-readably.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AckFailure {
    pub order_id: String,
    pub kind: String,
    pub message: String,
}

/// Per-order results of an acknowledgement call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AckReport {
    pub outcomes: Vec<AckOutcome>,
    pub failures: Vec<AckFailure>,
}

/// Shared store tracking every proposed order and its batch membership.
pub struct OrderStore {
    orders: RwLock<HashMap<String, Order>>,
    batches: RwLock<HashMap<String, Vec<String>>>,
    order_seq: AtomicU64,
    batch_seq: AtomicU64,
    ttl: Duration,
}

impl OrderStore {
    /// Create a store whose proposed orders expire after `ttl_secs`.
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            batches: RwLock::new(HashMap::new()),
            order_seq: AtomicU64::new(1),
            batch_seq: AtomicU64::new(1),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Reserve a batch identifier for a rebalance call.
    pub fn next_batch_id(&self) -> String {
        format!("rb-{}", self.batch_seq.fetch_add(1, Ordering::SeqCst))
    }

    /// Register an account's orders under a batch, all at once.
    ///
    /// Callers register only after the whole account succeeded, so a
    /// failed account never leaves partial orders behind.
    pub async fn register(&self, batch_id: &str, proposals: Vec<OrderProposal>) -> Vec<Order> {
        let now = Utc::now();
        let orders: Vec<Order> = proposals
            .into_iter()
            .map(|p| Order {
                id: format!("ord-{}", self.order_seq.fetch_add(1, Ordering::SeqCst)),
                account_id: p.account_id,
                ticker: p.ticker,
                side: p.side,
                quantity: p.quantity,
                expected_price: p.expected_price,
                state: OrderState::Proposed,
                created_at: now,
                as_of: p.as_of,
            })
            .collect();

        let mut store = self.orders.write().await;
        let mut batches = self.batches.write().await;
        let members = batches.entry(batch_id.to_string()).or_default();
        for order in &orders {
            members.push(order.id.clone());
            store.insert(order.id.clone(), order.clone());
        }

        debug!(%batch_id, orders = orders.len(), "Registered proposed orders");
        orders
    }

    /// Fetch an order by id, applying lazy expiry first.
    pub async fn get(&self, order_id: &str) -> Option<Order> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(order_id)?;
        Self::expire_in_place(order, Utc::now(), self.ttl);
        Some(order.clone())
    }

    /// Apply an acknowledgement action to one order.
    ///
    /// Repeating the action that produced the current terminal state
    /// succeeds with `duplicate = true`; any other transition out of a
    /// terminal state fails with `InvalidTransition`.
    pub async fn apply(&self, order_id: &str, action: AckAction) -> Result<AckOutcome, EngineError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(order_id).ok_or_else(|| {
            EngineError::InvalidTransition(format!("unknown order {order_id}"))
        })?;

        Self::expire_in_place(order, Utc::now(), self.ttl);

        let target = action.target_state();
        match order.state {
            OrderState::Proposed => {
                order.state = target;
                Ok(AckOutcome {
                    order_id: order.id.clone(),
                    state: order.state,
                    duplicate: false,
                })
            }
            state if state == target => Ok(AckOutcome {
                order_id: order.id.clone(),
                state,
                duplicate: true,
            }),
            state => Err(EngineError::InvalidTransition(format!(
                "order {order_id} is {state}, cannot {action}"
            ))),
        }
    }

    /// Apply an acknowledgement action to every order in a batch.
    ///
    /// Per-order failures do not abort their siblings; each is reported
    /// with its machine-readable kind.
    pub async fn apply_batch(
        &self,
        batch_id: &str,
        action: AckAction,
    ) -> Result<AckReport, EngineError> {
        let member_ids: Vec<String> = {
            let batches = self.batches.read().await;
            batches
                .get(batch_id)
                .cloned()
                .ok_or_else(|| {
                    EngineError::InvalidTransition(format!("unknown batch {batch_id}"))
                })?
        };

        let mut report = AckReport {
            outcomes: Vec::new(),
            failures: Vec::new(),
        };
        for order_id in member_ids {
            match self.apply(&order_id, action).await {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(err) => report.failures.push(AckFailure {
                    order_id,
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                }),
            }
        }

        Ok(report)
    }

    fn expire_in_place(order: &mut Order, now: DateTime<Utc>, ttl: Duration) {
        if order.state == OrderState::Proposed && order.created_at + ttl <= now {
            order.state = OrderState::Expired;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn proposal(account_id: &str, ticker: &str) -> OrderProposal {
        OrderProposal {
            account_id: account_id.to_string(),
            ticker: ticker.to_string(),
            side: OrderSide::Buy,
            quantity: dec!(10),
            expected_price: dec!(227.17),
            as_of: NaiveDate::from_ymd_opt(2025, 8, 25).unwrap(),
        }
    }

    async fn store_with_order(ttl_secs: u64) -> (OrderStore, String) {
        let store = OrderStore::new(ttl_secs);
        let batch_id = store.next_batch_id();
        let orders = store
            .register(&batch_id, vec![proposal("C001", "AAPL")])
            .await;
        let order_id = orders[0].id.clone();
        (store, order_id)
    }

    #[tokio::test]
    async fn test_acknowledge_is_idempotent() {
        let (store, order_id) = store_with_order(900).await;

        let first = store.apply(&order_id, AckAction::Acknowledge).await.unwrap();
        assert_eq!(first.state, OrderState::Acknowledged);
        assert!(!first.duplicate);

        let second = store.apply(&order_id, AckAction::Acknowledge).await.unwrap();
        assert_eq!(second.state, OrderState::Acknowledged);
        assert!(second.duplicate);
    }

    #[tokio::test]
    async fn test_reject_after_acknowledge_is_invalid() {
        let (store, order_id) = store_with_order(900).await;

        store.apply(&order_id, AckAction::Acknowledge).await.unwrap();
        let err = store.apply(&order_id, AckAction::Reject).await.unwrap_err();
        assert_eq!(err.kind(), "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_unknown_order_is_invalid_transition() {
        let store = OrderStore::new(900);
        let err = store.apply("ord-404", AckAction::Acknowledge).await.unwrap_err();
        assert_eq!(err.kind(), "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_proposed_order_expires_lazily() {
        let (store, order_id) = store_with_order(0).await;

        // No sweeper runs; the state flips on first access past the TTL.
        let order = store.get(&order_id).await.unwrap();
        assert_eq!(order.state, OrderState::Expired);

        let err = store
            .apply(&order_id, AckAction::Acknowledge)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_batch_reports_per_order_outcomes() {
        let store = OrderStore::new(900);
        let batch_id = store.next_batch_id();
        let orders = store
            .register(
                &batch_id,
                vec![proposal("C001", "AAPL"), proposal("C001", "MSFT")],
            )
            .await;

        // Reject one order first, then acknowledge the batch.
        store.apply(&orders[1].id, AckAction::Reject).await.unwrap();

        let report = store
            .apply_batch(&batch_id, AckAction::Acknowledge)
            .await
            .unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].state, OrderState::Acknowledged);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_unknown_batch_is_invalid_transition() {
        let store = OrderStore::new(900);
        let err = store
            .apply_batch("rb-404", AckAction::Acknowledge)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_concurrent_acknowledgements_have_one_winner() {
        let (store, order_id) = store_with_order(900).await;
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            let order_id = order_id.clone();
            handles.push(tokio::spawn(async move {
                store.apply(&order_id, AckAction::Acknowledge).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert_eq!(outcome.state, OrderState::Acknowledged);
            if !outcome.duplicate {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
