//! Server for the DPF-based verifiable point queries.
//!
//! The hot path is `eval_full_flatten`: one level-order pass expands the
//! whole key into a flat row-major buffer, which is then folded against the
//! element-indexed database in parallel chunks.

use std::sync::Arc;

use rayon::prelude::*;

use crate::database::{FieldDb, Info};
use crate::dpf::{self, Key};
use crate::error::{Error, Result};
use crate::field::Element;
use crate::query::encode_element_vector;
use crate::server::add_vectors;

pub struct DpfServer {
    db: Arc<FieldDb>,
    party: u8,
}

impl DpfServer {
    pub fn new(db: Arc<FieldDb>, party: u8) -> DpfServer {
        DpfServer { db, party }
    }

    pub fn info(&self) -> Info {
        self.db.info.clone()
    }

    /// Computes `Σ_x eval(key, x) · db[x]`, one slot vector in total.
    pub fn answer(&self, key: &Key) -> Result<Vec<Element>> {
        let slots = key.final_cw.len();
        let total = self.db.len();
        let log_n = key.cw.len() as u32;
        if log_n == 0 || (1usize << log_n.min(63)) < total {
            return Err(Error::InvalidInput(format!(
                "key domain of {log_n} bits cannot cover {total} entries"
            )));
        }
        // Full-domain evaluation materializes 2^log_n leaves; an oversized
        // key must not be able to exhaust server memory.
        if log_n > 30 {
            return Err(Error::InvalidInput(format!(
                "key domain of {log_n} bits exceeds the supported evaluation width"
            )));
        }

        let mut flat = vec![Element::ZERO; total * slots];
        dpf::eval_full_flatten(self.party, key, log_n, &mut flat);

        flat.par_chunks(slots)
            .zip(self.db.entries.par_iter())
            .map(|(shares, &value)| -> Result<Vec<Element>> {
                Ok(shares.iter().map(|&s| s * value).collect())
            })
            .try_reduce(|| vec![Element::ZERO; slots], |a, b| Ok(add_vectors(a, b)))
    }

    pub fn answer_bytes(&self, query: &[u8]) -> Result<Vec<u8>> {
        let key = Key::decode(query)?;
        Ok(encode_element_vector(&self.answer(&key)?))
    }
}
