//! Server for the verifiable multi-bit scheme in F_p.
//!
//! The query matrix assigns every column a selector slot and L tag slots.
//! Per row, the data slots are the selector-weighted column sums and the
//! tag slot folds the tag weights over the whole row, which reconstructs to
//! the target block's polynomial MAC on the client.

use std::sync::Arc;

use rayon::prelude::*;

use crate::database::{FieldDb, Info};
use crate::error::{Error, Result};
use crate::field::Element;
use crate::query::{decode_element_vector, encode_element_vector};

pub struct ItServer {
    db: Arc<FieldDb>,
}

impl ItServer {
    pub fn new(db: Arc<FieldDb>) -> ItServer {
        ItServer { db }
    }

    pub fn info(&self) -> Info {
        self.db.info.clone()
    }

    /// Computes `block_size + 1` slots per row.
    pub fn answer(&self, query: &[Element]) -> Result<Vec<Element>> {
        let info = &self.db.info;
        let slots = info.block_size + 1;
        if query.len() != info.num_columns * slots {
            return Err(Error::InvalidInput(format!(
                "query of {} elements against {} columns of {} slots",
                query.len(),
                info.num_columns,
                slots
            )));
        }

        Ok((0..info.num_rows)
            .into_par_iter()
            .flat_map_iter(|row| {
                let mut out = vec![Element::ZERO; slots];
                for col in 0..info.num_columns {
                    let block = self.db.block(row, col);
                    let selector = query[col * slots];
                    let mut tag = Element::ZERO;
                    for (j, &value) in block.iter().enumerate() {
                        out[j] += selector * value;
                        tag += query[col * slots + j + 1] * value;
                    }
                    out[slots - 1] += tag;
                }
                out
            })
            .collect())
    }

    pub fn answer_bytes(&self, query: &[u8]) -> Result<Vec<u8>> {
        let decoded = decode_element_vector(query)?;
        Ok(encode_element_vector(&self.answer(&decoded)?))
    }
}
