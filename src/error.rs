//! Engine error taxonomy.
//!
//! Every non-success outcome the engine can report carries one of these
//! kinds so callers can branch without parsing messages.

use thiserror::Error;

/// Failures surfaced by the rebalancing engine and its collaborator boundary.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The signal source could not produce data for the requested date/ids,
    /// or the call timed out. Retryable.
    #[error("signal source unavailable: {0}")]
    DataUnavailable(String),

    /// The requested filters admit no feasible weight vector. Not retryable
    /// without changing the filters.
    #[error("infeasible constraints: {0}")]
    InfeasibleConstraints(String),

    /// A security's liquidity data cannot support pricing a non-zero order.
    #[error("invalid liquidity for {ticker}: {reason}")]
    InvalidLiquidity { ticker: String, reason: String },

    /// An acknowledgement call attempted an illegal order state transition.
    #[error("invalid order transition: {0}")]
    InvalidTransition(String),
}

impl EngineError {
    /// Machine-readable kind carried in response payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::DataUnavailable(_) => "DATA_UNAVAILABLE",
            EngineError::InfeasibleConstraints(_) => "INFEASIBLE_CONSTRAINTS",
            EngineError::InvalidLiquidity { .. } => "INVALID_LIQUIDITY",
            EngineError::InvalidTransition(_) => "INVALID_TRANSITION",
        }
    }

    /// Whether retrying the same request can succeed without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::DataUnavailable(_))
    }
}
