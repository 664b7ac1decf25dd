//! Server side of the query families.
//!
//! Every server holds a shared read-only database and exposes `answer`, a
//! pure function of query and database, plus `answer_bytes` for the wire
//! encodings and `info` for the DB info message published on connection.
//! Row contributions combine by associative addition in F_p (or XOR for
//! bytes), so the rayon folds below are deterministic under any reordering.

mod dpf;
mod it;
mod it_gf;
mod pir;
mod predicate;

pub use dpf::DpfServer;
pub use it::ItServer;
pub use it_gf::ItGfServer;
pub use pir::PirServer;
pub use predicate::PredicateServer;

use crate::field::Element;

/// Slot-wise vector addition used when reducing per-row contributions.
pub(crate) fn add_vectors(mut acc: Vec<Element>, other: Vec<Element>) -> Vec<Element> {
    for (a, b) in acc.iter_mut().zip(other) {
        *a += b;
    }
    acc
}
