use thiserror::Error;

use crate::types::SolveAttempt;

/// Failure of a single strategy. Never crosses the resolver boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("rejected by provider: {0}")]
    Rejected(String),

    #[error("no acceptable candidate")]
    NoAcceptableCandidate,

    #[error("invalid image: {0}")]
    InvalidImage(String),
}

impl SolveError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SolveError::Timeout(_))
    }
}

impl From<std::io::Error> for SolveError {
    fn from(e: std::io::Error) -> Self {
        SolveError::Transport(e.to_string())
    }
}

/// The only failure a caller of the resolver ever sees.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("all {} strategies exhausted", attempts.len())]
    AllStrategiesExhausted { attempts: Vec<SolveAttempt> },
}

impl ResolveError {
    pub fn attempts(&self) -> &[SolveAttempt] {
        match self {
            ResolveError::AllStrategiesExhausted { attempts } => attempts,
        }
    }
}
