//! Field arithmetic for the VPIR schemes.
//!
//! Two element types back the query families:
//!
//! - [`Element`] — the prime field F_p with p = 2^32 − 5, used by the
//!   multi-bit, DPF and predicate schemes and their information-theoretic
//!   MACs.
//! - [`Gf128`] — the binary field GF(2^128), used by the single-bit
//!   information-theoretic scheme.
//!
//! Both types sample uniformly from an [`Xof`](crate::prg::Xof) so that
//! query randomness is reproducible from a seed.

mod fp;
mod gf128;

pub use fp::{Element, BYTES, MODULUS};
pub use gf128::Gf128;

/// Number of parallel MAC executions carried next to the data slot.
///
/// Each execution contributes one uniform α, so a cheating server passes
/// verification with probability about `CONCURRENT_EXECUTIONS / MODULUS`.
pub const CONCURRENT_EXECUTIONS: usize = 3;
