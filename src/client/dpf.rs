//! Client for the DPF-based verifiable point queries.
//!
//! Mechanically the predicate client with the point function `index = α`:
//! the MAC vector `[1, α_1, …, α_k]` rides in the DPF value slots, the
//! servers fold their full-domain evaluation against the element-indexed
//! database, and reconstruction enforces `slot_i = data · α_i` for every
//! MAC slot.

use byteorder::{BigEndian, ByteOrder};

use crate::client::{check_num_servers, no_pending_query};
use crate::database::Info;
use crate::dpf;
use crate::error::{Error, RejectCause, Result};
use crate::field::{Element, CONCURRENT_EXECUTIONS};
use crate::prg::Xof;
use crate::query::decode_element_vector;

pub struct DpfClient {
    xof: Xof,
    info: Info,
    state: Option<State>,
}

struct State {
    alphas: Vec<Element>,
}

/// Domain bit length covering `n` database entries.
fn domain_bits(n: usize) -> u32 {
    (usize::BITS - (n - 1).leading_zeros()).max(1)
}

impl DpfClient {
    pub fn new(xof: Xof, info: &Info) -> DpfClient {
        DpfClient {
            xof,
            info: info.clone(),
            state: None,
        }
    }

    fn num_entries(&self) -> usize {
        self.info.num_rows * self.info.num_columns * self.info.block_size
    }

    /// Emits the two DPF keys for the entry at `index`.
    pub fn query(&mut self, index: usize, num_servers: usize) -> Result<Vec<dpf::Key>> {
        check_num_servers(num_servers, 2)?;
        if num_servers != 2 {
            return Err(Error::InvalidInput(
                "the DPF family is a two-server scheme".into(),
            ));
        }
        let total = self.num_entries();
        if index >= total {
            return Err(Error::InvalidInput(format!(
                "index {index} out of range for {total} entries"
            )));
        }

        let mut alphas = Vec::with_capacity(CONCURRENT_EXECUTIONS);
        let mut beta = Vec::with_capacity(1 + CONCURRENT_EXECUTIONS);
        beta.push(Element::ONE);
        for _ in 0..CONCURRENT_EXECUTIONS {
            let alpha = Element::set_random(&mut self.xof);
            alphas.push(alpha);
            beta.push(alpha);
        }

        let log_n = domain_bits(total);
        let (key_a, key_b) = dpf::gen(index as u64, &beta, log_n, &mut self.xof)?;
        self.state = Some(State { alphas });

        Ok(vec![key_a, key_b])
    }

    /// Combines the two answers, checks the MAC slots and returns the
    /// retrieved entry.
    pub fn reconstruct(&mut self, answers: &[Vec<Element>]) -> Result<Element> {
        let Some(state) = self.state.take() else {
            return no_pending_query();
        };
        let m = 1 + CONCURRENT_EXECUTIONS;
        if answers.len() != 2 || answers.iter().any(|a| a.len() != m) {
            return Err(Error::InvalidInput(format!("expected two answers of {m} slots")));
        }

        let data = answers[0][0] + answers[1][0];
        for (i, &alpha) in state.alphas.iter().enumerate() {
            let tag = answers[0][i + 1] + answers[1][i + 1];
            if data * alpha != tag {
                return Err(Error::Reject(RejectCause::Mac));
            }
        }
        Ok(data)
    }

    /// Wire wrapper: big-endian index in, encoded DPF keys out.
    pub fn query_bytes(&mut self, input: &[u8], num_servers: usize) -> Result<Vec<Vec<u8>>> {
        if input.len() != 4 {
            return Err(Error::InvalidInput("expected a 4-byte index".into()));
        }
        let index = BigEndian::read_u32(input) as usize;
        let queries = self.query(index, num_servers)?;
        Ok(queries.iter().map(dpf::Key::encode).collect())
    }

    pub fn reconstruct_bytes(&mut self, answers: &[Vec<u8>]) -> Result<Element> {
        let decoded = answers
            .iter()
            .map(|a| decode_element_vector(a))
            .collect::<Result<Vec<_>>>()?;
        self.reconstruct(&decoded)
    }
}
