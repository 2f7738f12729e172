//! Error types raised while configuring the scorer.
#![forbid(unsafe_code)]

use thiserror::Error;

/// Errors raised when validating [`ScoreWeights`](crate::ScoreWeights).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScorerError {
    /// A weight was NaN or infinite.
    #[error("weight {factor} is not finite")]
    NonFiniteWeight {
        /// Name of the offending factor.
        factor: &'static str,
    },
    /// A weight was below zero.
    #[error("weight {factor} is negative ({value})")]
    NegativeWeight {
        /// Name of the offending factor.
        factor: &'static str,
        /// Rejected value.
        value: f64,
    },
    /// The weights did not add up to one.
    #[error("weights sum to {basis_points} basis points, expected 10000")]
    WeightsDoNotSumToOne {
        /// Sum of the weights in basis points.
        basis_points: u32,
    },
}
