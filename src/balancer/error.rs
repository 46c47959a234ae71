//! Error types for the balancer module

use thiserror::Error;

use crate::models::Label;

/// Result type for balancer operations
pub type BalanceResult<T> = Result<T, BalanceError>;

/// Balancer-specific errors
///
/// Every variant aborts the run. Soft conditions (a center stuck over
/// capacity, a rolled-back elimination, an exhausted iteration budget) are
/// reported through [`super::BalanceReport`] instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BalanceError {
    /// No points or no centers were supplied
    #[error("Empty input: no {what} supplied")]
    EmptyInput { what: &'static str },

    /// Balancing parameters are inconsistent
    #[error("Invalid parameter '{field}': {reason}")]
    InvalidParameters { field: &'static str, reason: String },

    /// An orphaned point could not be placed on any active center
    #[error(
        "No viable center for point {point_id}: every active center is full or beyond the time limit"
    )]
    NoViableCandidate { point_id: i64 },

    /// Elimination would leave no active center
    #[error("Cannot eliminate center {label}: it is the last active center")]
    LastCenter { label: Label },

    /// A point references a label outside the surviving set
    #[error("Point {point_id} references unknown label {label:?}")]
    UnknownLabel { point_id: i64, label: Option<Label> },
}

impl BalanceError {
    /// Create an empty input error
    pub fn empty_input(what: &'static str) -> Self {
        Self::EmptyInput { what }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            field,
            reason: reason.into(),
        }
    }

    /// Check if retrying with relaxed parameters may succeed
    ///
    /// Capacity and topology failures depend on `max_pdv`, the time ceiling
    /// and the center set; the rest are caller or internal bugs.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoViableCandidate { .. } | Self::LastCenter { .. }
        )
    }

    /// Whether the error points at a bug in the balancer itself
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::UnknownLabel { .. })
    }
}
