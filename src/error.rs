//! Error taxonomy for the VPIR core.
//!
//! Every failure surfaces to the API caller; nothing is retried inside the
//! core. A [`Error::Reject`] is terminal for the affected query: it signals a
//! misbehaving server, not a transient fault, so clients must not re-query
//! the same servers transparently.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Which authentication check failed during reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCause {
    /// An information-theoretic MAC tag did not match.
    Mac,
    /// The count tags of an AVG query did not match.
    MacCount,
    /// The sum tags of an AVG query did not match.
    MacSum,
    /// A Merkle authentication path did not hash to the published root.
    Merkle,
}

impl std::fmt::Display for RejectCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectCause::Mac => write!(f, "mac"),
            RejectCause::MacCount => write!(f, "count"),
            RejectCause::MacSum => write!(f, "sum"),
            RejectCause::Merkle => write!(f, "merkle"),
        }
    }
}

/// Errors produced by the VPIR core.
#[derive(Debug, Error)]
pub enum Error {
    /// Index out of range, wrong number of servers, malformed query bytes.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// MAC or Merkle verification failed on reconstruction.
    #[error("reject: {0}")]
    Reject(RejectCause),

    /// The predicate matched zero rows and the aggregate is undefined.
    #[error("no rows matched the predicate")]
    NoMatch,

    /// I/O or timeout at the dispatcher boundary.
    #[error("transport: {0}")]
    Transport(String),

    /// Invariant violation; unreachable in correct deployments.
    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// Process exit code for command-line front ends: 0 is success, rejects
    /// and invalid configurations map to 1, transport failures to 2.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidInput(_) | Error::Reject(_) | Error::NoMatch | Error::Internal(_) => 1,
            Error::Transport(_) => 2,
        }
    }
}
