//! Two-server XOR client for the byte-oriented PIR family.
//!
//! The query is a uniform bitmask over the columns plus a copy with the
//! target column's bit toggled; XORing the two answers leaves exactly the
//! target column's block in every row. The Merkle variant additionally
//! verifies the authentication path prefixed to the block against the
//! published root.

use byteorder::{BigEndian, ByteOrder};

use crate::client::{check_num_servers, no_pending_query};
use crate::database::{merkle, Info};
use crate::error::{Error, RejectCause, Result};
use crate::prg::Xof;
use crate::query::pack_bits;

pub struct PirClient {
    xof: Xof,
    info: Info,
    state: Option<State>,
}

struct State {
    row: usize,
}

impl PirClient {
    pub fn new(xof: Xof, info: &Info) -> PirClient {
        PirClient {
            xof,
            info: info.clone(),
            state: None,
        }
    }

    /// Emits the two column masks for the block at `index`.
    pub fn query(&mut self, index: usize, num_servers: usize) -> Result<Vec<Vec<bool>>> {
        check_num_servers(num_servers, 2)?;
        if num_servers != 2 {
            return Err(Error::InvalidInput(
                "the XOR-based family is a two-server scheme".into(),
            ));
        }
        let num_blocks = self.info.num_rows * self.info.num_columns;
        if index >= num_blocks {
            return Err(Error::InvalidInput(format!(
                "block index {index} out of range for {num_blocks} blocks"
            )));
        }

        let col = index % self.info.num_columns;
        self.state = Some(State {
            row: index / self.info.num_columns,
        });

        let mut mask_bytes = vec![0u8; self.info.num_columns.div_ceil(8)];
        self.xof.fill(&mut mask_bytes);
        let mask: Vec<bool> = (0..self.info.num_columns)
            .map(|i| (mask_bytes[i / 8] >> (i % 8)) & 1 == 1)
            .collect();

        let mut flipped = mask.clone();
        flipped[col] = !flipped[col];

        Ok(vec![mask, flipped])
    }

    /// XOR-combines the two answers and returns the target block's payload.
    /// With Merkle authentication the path is verified first and stripped.
    pub fn reconstruct(&mut self, answers: &[Vec<u8>]) -> Result<Vec<u8>> {
        let Some(state) = self.state.take() else {
            return no_pending_query();
        };
        let expected = self.info.num_rows * self.info.block_size;
        if answers.len() != 2 || answers.iter().any(|a| a.len() != expected) {
            return Err(Error::InvalidInput(format!(
                "expected two answers of {expected} bytes"
            )));
        }

        let start = state.row * self.info.block_size;
        let block: Vec<u8> = answers[0][start..start + self.info.block_size]
            .iter()
            .zip(&answers[1][start..start + self.info.block_size])
            .map(|(&a, &b)| a ^ b)
            .collect();

        match &self.info.merkle {
            None => Ok(block),
            Some(info) => {
                let (proof, payload) = block.split_at(info.proof_len);
                if !merkle::verify(&info.root, payload, proof) {
                    return Err(Error::Reject(RejectCause::Merkle));
                }
                Ok(payload.to_vec())
            }
        }
    }

    /// Wire wrapper: big-endian index in, packed bitmasks out.
    pub fn query_bytes(&mut self, input: &[u8], num_servers: usize) -> Result<Vec<Vec<u8>>> {
        if input.len() != 4 {
            return Err(Error::InvalidInput("expected a 4-byte index".into()));
        }
        let index = BigEndian::read_u32(input) as usize;
        let queries = self.query(index, num_servers)?;
        Ok(queries.iter().map(|q| pack_bits(q)).collect())
    }

    /// Answers are raw blocks, so the byte variant is reconstruction itself.
    pub fn reconstruct_bytes(&mut self, answers: &[Vec<u8>]) -> Result<Vec<u8>> {
        self.reconstruct(answers)
    }
}
