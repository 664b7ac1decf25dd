//! Verifiable private information retrieval core.
//!
//! A client retrieves an entry (or an aggregate over a hidden predicate)
//! from a database replicated across two or more non-colluding servers:
//! no single server learns what is being queried, and the client either
//! recovers the correct result or detects that a server cheated.
//!
//! Layers, bottom up:
//!
//! - [`field`] — arithmetic in F_p (32-bit prime) and GF(2^128)
//! - [`prg`] — seeded deterministic randomness (keyed BLAKE2b XOF, fixed-key
//!   AES expansion)
//! - [`dpf`] / [`fss`] — distributed point functions and predicate secret
//!   sharing
//! - [`database`] — field, bit and byte databases, including the
//!   Merkle-authenticated variant
//! - [`query`] — predicate descriptors and wire encodings
//! - [`client`] / [`server`] — the IT, PIR, DPF and predicate query families
//! - [`dispatcher`] — concurrent scatter/gather over server connections
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vpir::client::PirClient;
//! use vpir::database::BytesDb;
//! use vpir::prg::{random_xof, Xof};
//! use vpir::server::PirServer;
//!
//! // Two servers share an identical 8×8 database of 8-byte blocks.
//! let mut db_xof = Xof::new(b"example db seed");
//! let db = Arc::new(BytesDb::create_random_bytes(&mut db_xof, 8 * 8 * 8 * 8, 8, 8)?);
//! let servers = [PirServer::new(db.clone()), PirServer::new(db.clone())];
//!
//! // Retrieve block 23 without either server learning the index.
//! let mut client = PirClient::new(random_xof(), &db.info);
//! let queries = client.query(23, 2)?;
//! let answers: Vec<Vec<u8>> = servers
//!     .iter()
//!     .zip(&queries)
//!     .map(|(s, q)| s.answer(q))
//!     .collect::<vpir::Result<_>>()?;
//! assert_eq!(client.reconstruct(&answers)?, db.block(23 / 8, 23 % 8));
//! # Ok::<(), vpir::Error>(())
//! ```

pub mod client;
pub mod database;
pub mod dispatcher;
pub mod dpf;
pub mod error;
pub mod field;
pub mod fss;
pub mod params;
pub mod prg;
pub mod query;
pub mod server;

pub use error::{Error, RejectCause, Result};
pub use params::{GeneralConfig, IndividualConfig, Primitive};
