//! The rebalancing and pricing engine.
//!
//! Per-account pipeline, each stage pure given its inputs:
//! - Current weights and NAV from the account snapshot
//! - Sentiment blending into a raw target vector
//! - Constraint projection onto the feasible set
//! - Delta translation into lot-rounded order drafts
//! - Impact-aware execution pricing

mod allocator;
mod pricer;
mod projector;
mod rebalance;
mod translator;
mod weights;

pub use allocator::SignalAllocator;
pub use pricer::ImpactPricer;
pub use projector::{ConstraintProjector, Filters};
pub use rebalance::{
    AccountResult, AccountStatus, AckRequest, ErrorReport, HealthReport, HealthStatus, OrderBatch,
    RebalanceEngine, RebalanceRequest, SkippedOrder,
};
pub use translator::{DeltaTranslator, OrderDraft};
pub use weights::{value_account, AccountValuation, WeightVector};
