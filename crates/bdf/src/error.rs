use std::error::Error as StdError;

use cadence_core::SubproblemKind;

use crate::config::ConfigError;

/// Errors raised by the BDF engine.
///
/// Every variant is fatal for the run; none are retried internally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid order {order}: must be between 1 and 4")]
    InvalidOrder { order: usize },

    #[error("history underflow: index {index} requested with {len} active entries")]
    HistoryUnderflow { index: usize, len: usize },

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("restart format error: {0}")]
    RestartFormat(String),

    #[error("steady state not reached after {steps} steps (last measure {last:e})")]
    SteadyStateNotReached { steps: usize, last: f64 },

    #[error("{kind:?} solve did not converge after {iterations} iterations at step {step}")]
    NotConverged {
        kind: SubproblemKind,
        iterations: u32,
        step: usize,
    },

    #[error("operator error: {0}")]
    Operator(#[source] Box<dyn StdError + Send + Sync>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    pub(crate) fn operator<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Operator(Box::new(err))
    }

    pub(crate) fn unsupported(detail: impl Into<String>) -> Self {
        Self::UnsupportedScheme(detail.into())
    }

    pub(crate) fn restart(detail: impl Into<String>) -> Self {
        Self::RestartFormat(detail.into())
    }
}
