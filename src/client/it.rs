//! Information-theoretic client for the verifiable multi-bit scheme in F_p.
//!
//! A query secret-shares `e_col ⊗ (1, α, α², …, α^L)` among the servers,
//! where L is the block length. Each per-row answer then carries the L data
//! slots of the target column's block and one tag slot equal to
//! `Σ_j data_j · α^(j+1)`; a tag mismatch on any row rejects the answer.

use byteorder::{BigEndian, ByteOrder};

use crate::client::{check_num_servers, no_pending_query};
use crate::database::Info;
use crate::error::{Error, RejectCause, Result};
use crate::field::Element;
use crate::prg::Xof;
use crate::query::{decode_element_vector, encode_element_vector};

pub struct ItClient {
    xof: Xof,
    info: Info,
    state: Option<State>,
}

struct State {
    row: usize,
    /// α^1 … α^L, the tag weights of the pending query.
    powers: Vec<Element>,
}

impl ItClient {
    pub fn new(xof: Xof, info: &Info) -> ItClient {
        ItClient {
            xof,
            info: info.clone(),
            state: None,
        }
    }

    fn slots(&self) -> usize {
        self.info.block_size + 1
    }

    /// Emits `num_servers` share vectors of length
    /// `num_columns · (block_size + 1)` for the block at `index`.
    pub fn query(&mut self, index: usize, num_servers: usize) -> Result<Vec<Vec<Element>>> {
        check_num_servers(num_servers, 2)?;
        let num_blocks = self.info.num_rows * self.info.num_columns;
        if index >= num_blocks {
            return Err(Error::InvalidInput(format!(
                "block index {index} out of range for {num_blocks} blocks"
            )));
        }

        let col = index % self.info.num_columns;
        let row = index / self.info.num_columns;
        let slots = self.slots();

        let alpha = Element::set_random(&mut self.xof);
        // beta = (1, α, α², …, α^L): selector slot plus the tag weights.
        let mut beta = Vec::with_capacity(slots);
        beta.push(Element::ONE);
        for j in 1..slots {
            beta.push(beta[j - 1] * alpha);
        }
        self.state = Some(State {
            row,
            powers: beta[1..].to_vec(),
        });

        let width = self.info.num_columns * slots;
        let mut vectors = vec![vec![Element::ZERO; width]; num_servers];
        let random = Element::random_vector(width * (num_servers - 1), &mut self.xof);

        for i in 0..width {
            let mut sum = Element::ZERO;
            for k in 0..num_servers - 1 {
                let r = random[width * k + i];
                vectors[k][i] = r;
                sum += r;
            }
            let mut last = -sum;
            if i / slots == col {
                last += beta[i % slots];
            }
            vectors[num_servers - 1][i] = last;
        }

        Ok(vectors)
    }

    /// Combines per-row answers, verifies every row's tag and returns the
    /// target block.
    pub fn reconstruct(&mut self, answers: &[Vec<Element>]) -> Result<Vec<Element>> {
        let Some(state) = self.state.take() else {
            return no_pending_query();
        };
        let slots = self.slots();
        let expected = self.info.num_rows * slots;
        if answers.iter().any(|a| a.len() != expected) {
            return Err(Error::InvalidInput(format!(
                "expected answers of {expected} elements"
            )));
        }

        let mut block = Vec::with_capacity(self.info.block_size);
        for r in 0..self.info.num_rows {
            let mut combined = vec![Element::ZERO; slots];
            for answer in answers {
                for (slot, v) in combined.iter_mut().zip(&answer[r * slots..(r + 1) * slots]) {
                    *slot += *v;
                }
            }

            let mut tag = Element::ZERO;
            for (j, &power) in state.powers.iter().enumerate() {
                tag += combined[j] * power;
            }
            if tag != combined[slots - 1] {
                return Err(Error::Reject(RejectCause::Mac));
            }

            if r == state.row {
                block.extend_from_slice(&combined[..slots - 1]);
            }
        }
        Ok(block)
    }

    pub fn query_bytes(&mut self, input: &[u8], num_servers: usize) -> Result<Vec<Vec<u8>>> {
        if input.len() != 4 {
            return Err(Error::InvalidInput("expected a 4-byte index".into()));
        }
        let index = BigEndian::read_u32(input) as usize;
        let queries = self.query(index, num_servers)?;
        Ok(queries.iter().map(|q| encode_element_vector(q)).collect())
    }

    pub fn reconstruct_bytes(&mut self, answers: &[Vec<u8>]) -> Result<Vec<Element>> {
        let decoded = answers
            .iter()
            .map(|a| decode_element_vector(a))
            .collect::<Result<Vec<_>>>()?;
        self.reconstruct(&decoded)
    }
}
