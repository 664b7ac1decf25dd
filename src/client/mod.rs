//! Client side of the query families.
//!
//! Every client follows the same life cycle: `query` draws fresh randomness,
//! stores the per-query state and emits one opaque query per server;
//! `reconstruct` consumes that state, combines the answers and runs the
//! family's authentication check. Issuing a second `query` before
//! `reconstruct` discards the first query's state. The `*_bytes` variants
//! wrap the same operations in the deterministic wire encodings.

mod dpf;
mod it;
mod it_gf;
mod pir;
mod predicate;

pub use dpf::DpfClient;
pub use it::ItClient;
pub use it_gf::ItGfClient;
pub use pir::PirClient;
pub use predicate::{PredicateClient, PredicateOutput};

use crate::error::{Error, Result};

/// Shared argument check: at least `min` servers and one query per server.
pub(crate) fn check_num_servers(num_servers: usize, min: usize) -> Result<()> {
    if num_servers < min {
        return Err(Error::InvalidInput(format!(
            "need at least {min} servers, got {num_servers}"
        )));
    }
    Ok(())
}

/// Shared state error for `reconstruct` without a pending query.
pub(crate) fn no_pending_query<T>() -> Result<T> {
    Err(Error::Internal("reconstruct without a pending query".into()))
}
