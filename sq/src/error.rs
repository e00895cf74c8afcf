//! Configuration error types

use thiserror::Error;

use crate::config::Strategy;

/// Errors raised while validating a queue configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Schedule table has no tokens")]
    EmptySchedule,

    #[error("Boundary priority {boundary} does not appear in the schedule tokens")]
    BoundaryNotScheduled { boundary: i64 },

    #[error("Schedule total tensor count must be greater than zero")]
    ZeroTensorCount,

    #[error("Schedule total tensor count {total} is smaller than the {tokens} scheduled tokens")]
    TensorCountTooSmall { total: usize, tokens: usize },

    #[error("Strategy {strategy} requires a schedule table")]
    MissingSchedule { strategy: Strategy },

    #[error("Strategy {strategy} requires a window schedule")]
    MissingWindow { strategy: Strategy },

    #[error("Window schedule has no backward timings")]
    EmptyWindow,

    #[error("Batch size must be greater than zero")]
    InvalidBatchSize,

    #[error("Credit budget of {multiplier} partitions of {partition_bound} bytes overflows")]
    CreditBudgetOverflow { partition_bound: u64, multiplier: usize },
}
