//! Server for the byte-oriented XOR PIR family.

use std::sync::Arc;

use rayon::prelude::*;

use crate::database::{BytesDb, Info};
use crate::error::{Error, Result};
use crate::query::unpack_bits;

pub struct PirServer {
    db: Arc<BytesDb>,
}

impl PirServer {
    pub fn new(db: Arc<BytesDb>) -> PirServer {
        PirServer { db }
    }

    pub fn info(&self) -> Info {
        self.db.info.clone()
    }

    /// XORs the blocks selected by the mask, independently per row.
    pub fn answer(&self, mask: &[bool]) -> Result<Vec<u8>> {
        let info = &self.db.info;
        if mask.len() != info.num_columns {
            return Err(Error::InvalidInput(format!(
                "mask of {} bits against {} columns",
                mask.len(),
                info.num_columns
            )));
        }

        Ok((0..info.num_rows)
            .into_par_iter()
            .flat_map_iter(|row| {
                let mut acc = vec![0u8; info.block_size];
                for (col, &selected) in mask.iter().enumerate() {
                    if selected {
                        for (a, &b) in acc.iter_mut().zip(self.db.block(row, col)) {
                            *a ^= b;
                        }
                    }
                }
                acc
            })
            .collect())
    }

    /// Wire wrapper over a packed bitmask; the answer is raw block bytes.
    pub fn answer_bytes(&self, query: &[u8]) -> Result<Vec<u8>> {
        let mask = unpack_bits(query, self.db.info.num_columns)?;
        self.answer(&mask)
    }
}
