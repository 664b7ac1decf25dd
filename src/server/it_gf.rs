//! Server for the single-bit information-theoretic scheme in GF(2^128).

use std::sync::Arc;

use rayon::prelude::*;

use crate::database::{BitDb, Info};
use crate::error::{Error, Result};
use crate::field::Gf128;
use crate::query::{decode_gf_vector, encode_gf_vector};

pub struct ItGfServer {
    db: Arc<BitDb>,
}

impl ItGfServer {
    pub fn new(db: Arc<BitDb>) -> ItGfServer {
        ItGfServer { db }
    }

    pub fn info(&self) -> Info {
        self.db.info.clone()
    }

    /// One inner product per row: the XOR of the query entries whose
    /// database bit is set.
    pub fn answer(&self, query: &[Gf128]) -> Result<Vec<Gf128>> {
        let info = &self.db.info;
        if query.len() != info.num_columns {
            return Err(Error::InvalidInput(format!(
                "query of {} elements against {} columns",
                query.len(),
                info.num_columns
            )));
        }

        Ok((0..info.num_rows)
            .into_par_iter()
            .map(|row| {
                let mut acc = Gf128::ZERO;
                for (col, &q) in query.iter().enumerate() {
                    if self.db.get(row * info.num_columns + col) {
                        acc += q;
                    }
                }
                acc
            })
            .collect())
    }

    pub fn answer_bytes(&self, query: &[u8]) -> Result<Vec<u8>> {
        let decoded = decode_gf_vector(query)?;
        Ok(encode_gf_vector(&self.answer(&decoded)?))
    }
}
