//! Information-theoretic client for the single-bit scheme in GF(2^128).
//!
//! Handles both the vector and the rebalanced (√N × √N) database layouts.
//! A query secret-shares `α · e_index` among the servers; reconstruction
//! accepts only answers whose per-position sums are 0 or α, so any
//! deviation by a single server is caught.

use byteorder::{BigEndian, ByteOrder};

use crate::client::{check_num_servers, no_pending_query};
use crate::database::Info;
use crate::error::{Error, Result};
use crate::field::Gf128;
use crate::prg::Xof;
use crate::query::{decode_gf_vector, encode_gf_vector};

pub struct ItGfClient {
    xof: Xof,
    info: Info,
    rebalanced: bool,
    state: Option<State>,
}

struct State {
    ix: usize,
    /// Row of the queried bit; unused in the vector layout.
    iy: usize,
    alpha: Gf128,
    db_length: usize,
}

impl ItGfClient {
    pub fn new(xof: Xof, info: &Info) -> ItGfClient {
        ItGfClient {
            xof,
            info: info.clone(),
            rebalanced: info.num_rows > 1,
            state: None,
        }
    }

    /// Emits `num_servers` share vectors for the bit at `index`.
    pub fn query(&mut self, index: usize, num_servers: usize) -> Result<Vec<Vec<Gf128>>> {
        check_num_servers(num_servers, 2)?;
        let total = self.info.num_rows * self.info.num_columns;
        if index >= total {
            return Err(Error::InvalidInput(format!(
                "index {index} out of range for {total} entries"
            )));
        }

        let alpha = Gf128::set_random(&mut self.xof);
        let db_length = self.info.num_columns;
        let (ix, iy) = if self.rebalanced {
            (index % db_length, index / db_length)
        } else {
            (index, 0)
        };
        self.state = Some(State {
            ix,
            iy,
            alpha,
            db_length,
        });

        Ok(self.secret_share(num_servers))
    }

    /// The first `num_servers - 1` vectors are uniform; the last completes
    /// every position's sum to zero, except `ix` where it completes to α.
    fn secret_share(&mut self, num_servers: usize) -> Vec<Vec<Gf128>> {
        let state = self.state.as_ref().expect("state set by query");
        let db_length = state.db_length;

        let mut vectors = vec![vec![Gf128::ZERO; db_length]; num_servers];
        let random = Gf128::random_vector(db_length * (num_servers - 1), &mut self.xof);

        for i in 0..db_length {
            let mut sum = Gf128::ZERO;
            for k in 0..num_servers - 1 {
                let r = random[db_length * k + i];
                vectors[k][i] = r;
                sum += r;
            }
            // Over GF(2) addition is its own inverse, so the completing
            // share is the sum itself.
            vectors[num_servers - 1][i] = sum;
            if i == state.ix {
                vectors[num_servers - 1][i] += state.alpha;
            }
        }
        vectors
    }

    /// Combines per-row answers and returns the retrieved bit.
    pub fn reconstruct(&mut self, answers: &[Vec<Gf128>]) -> Result<bool> {
        let Some(state) = self.state.take() else {
            return no_pending_query();
        };
        if answers.is_empty() || answers.iter().any(|a| a.len() != answers[0].len()) {
            return Err(Error::InvalidInput("ragged answer vectors".into()));
        }

        let answers_len = answers[0].len();
        let mut sum = vec![Gf128::ZERO; answers_len];
        for (i, slot) in sum.iter_mut().enumerate() {
            for answer in answers {
                *slot += answer[i];
            }
            if *slot != state.alpha && !slot.is_zero() {
                return Err(Error::Reject(crate::error::RejectCause::Mac));
            }
        }

        let i = if self.rebalanced { state.iy } else { 0 };
        match sum.get(i) {
            Some(&v) if v == state.alpha => Ok(true),
            Some(v) if v.is_zero() => Ok(false),
            _ => Err(Error::Reject(crate::error::RejectCause::Mac)),
        }
    }

    /// Wire wrapper: `input` is the big-endian index, the queries are
    /// length-prefixed GF vectors.
    pub fn query_bytes(&mut self, input: &[u8], num_servers: usize) -> Result<Vec<Vec<u8>>> {
        if input.len() != 4 {
            return Err(Error::InvalidInput("expected a 4-byte index".into()));
        }
        let index = BigEndian::read_u32(input) as usize;
        let queries = self.query(index, num_servers)?;
        Ok(queries.iter().map(|q| encode_gf_vector(q)).collect())
    }

    pub fn reconstruct_bytes(&mut self, answers: &[Vec<u8>]) -> Result<bool> {
        let decoded = answers
            .iter()
            .map(|a| decode_gf_vector(a))
            .collect::<Result<Vec<_>>>()?;
        self.reconstruct(&decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::BitDb;
    use crate::prg::Xof;
    use crate::server::ItGfServer;
    use std::sync::Arc;

    fn run_retrieval(rebalanced: bool, num_servers: usize) {
        let mut db_xof = Xof::new(b"itgf db");
        let (rows, cols) = if rebalanced { (8, 8) } else { (1, 64) };
        let db = Arc::new(BitDb::create_random_bits(&mut db_xof, rows, cols).unwrap());

        let mut client = ItGfClient::new(Xof::new(b"itgf client"), &db.info);
        let servers: Vec<ItGfServer> =
            (0..num_servers).map(|_| ItGfServer::new(db.clone())).collect();

        for index in [0usize, 17, rows * cols - 1] {
            let queries = client.query(index, num_servers).unwrap();
            let answers: Vec<Vec<crate::field::Gf128>> = servers
                .iter()
                .zip(&queries)
                .map(|(s, q)| s.answer(q).unwrap())
                .collect();
            let bit = client.reconstruct(&answers).unwrap();
            assert_eq!(bit, db.get(index), "index {index}");
        }
    }

    #[test]
    fn test_vector_layout_two_servers() {
        run_retrieval(false, 2);
    }

    #[test]
    fn test_rebalanced_layout_two_servers() {
        run_retrieval(true, 2);
    }

    #[test]
    fn test_vector_layout_three_servers() {
        run_retrieval(false, 3);
    }

    #[test]
    fn test_out_of_range_index() {
        let mut db_xof = Xof::new(b"itgf range db");
        let db = BitDb::create_random_bits(&mut db_xof, 1, 16).unwrap();
        let mut client = ItGfClient::new(Xof::new(b"itgf range"), &db.info);

        assert!(matches!(
            client.query(16, 2),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(client.query(0, 1), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_tampered_answer_rejected() {
        let mut db_xof = Xof::new(b"itgf tamper db");
        let db = Arc::new(BitDb::create_random_bits(&mut db_xof, 1, 32).unwrap());
        let mut client = ItGfClient::new(Xof::new(b"itgf tamper"), &db.info);
        let server = ItGfServer::new(db.clone());

        let queries = client.query(5, 2).unwrap();
        let mut answers: Vec<Vec<crate::field::Gf128>> =
            queries.iter().map(|q| server.answer(q).unwrap()).collect();
        answers[0][0] += crate::field::Gf128::from_u128(0x1234_5678);

        assert!(matches!(
            client.reconstruct(&answers),
            Err(Error::Reject(_))
        ));
    }

    #[test]
    fn test_reconstruct_without_query() {
        let mut db_xof = Xof::new(b"itgf idle db");
        let db = BitDb::create_random_bits(&mut db_xof, 1, 8).unwrap();
        let mut client = ItGfClient::new(Xof::new(b"itgf idle"), &db.info);

        assert!(matches!(
            client.reconstruct(&[vec![Gf128::ZERO]]),
            Err(Error::Internal(_))
        ));
    }
}
