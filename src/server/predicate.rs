//! Server for the FSS-based predicate queries.
//!
//! Every row is matched by evaluating the FSS key on the record bits the
//! query descriptor selects. COUNT folds the evaluation vectors directly,
//! SUM weighs them by the row value, AVG returns the count half and the sum
//! half concatenated.

use std::sync::Arc;

use rayon::prelude::*;

use crate::database::{FieldDb, Info};
use crate::error::{Error, Result};
use crate::field::{Element, CONCURRENT_EXECUTIONS};
use crate::fss::Fss;
use crate::query::{encode_element_vector, Aggregation, FssQuery};
use crate::server::add_vectors;

pub struct PredicateServer {
    db: Arc<FieldDb>,
    fss: Fss,
    party: u8,
}

impl PredicateServer {
    /// `party` is 0 or 1; `prf_keys` are the client's negotiated PRF keys.
    pub fn new(db: Arc<FieldDb>, party: u8, prf_keys: Vec<[u8; 16]>) -> Result<PredicateServer> {
        if party > 1 {
            return Err(Error::InvalidInput(format!("party {party} out of range")));
        }
        let fss = Fss::server_initialize(prf_keys, 1 + CONCURRENT_EXECUTIONS)?;
        Ok(PredicateServer { db, fss, party })
    }

    pub fn info(&self) -> Info {
        self.db.info.clone()
    }

    /// Folds the per-record FSS evaluations under the requested aggregate.
    pub fn answer(&self, query: &FssQuery) -> Result<Vec<Element>> {
        let m = 1 + CONCURRENT_EXECUTIONS;
        if query.key.final_cw.len() != m {
            return Err(Error::InvalidInput(format!(
                "key with {} value slots, expected {m}",
                query.key.final_cw.len()
            )));
        }
        if self.db.records.is_empty() {
            return Err(Error::InvalidInput(
                "database carries no records to match".into(),
            ));
        }

        let width = match query.info.agg {
            Aggregation::Avg => 2 * m,
            _ => m,
        };

        self.db
            .records
            .par_iter()
            .map(|record| {
                let bits = query.info.target_bits(record);
                if bits.len() != query.key.cw.len() {
                    // A record whose attribute window does not exist cannot
                    // match; it contributes nothing.
                    return Ok(vec![Element::ZERO; width]);
                }
                let shares = self.fss.evaluate_pf(self.party, &query.key, &bits)?;
                let value = Element::from_u32(record.value);

                Ok(match query.info.agg {
                    Aggregation::Count => shares,
                    Aggregation::Sum => shares.iter().map(|&s| s * value).collect(),
                    Aggregation::Avg => {
                        let mut out = Vec::with_capacity(2 * m);
                        out.extend_from_slice(&shares);
                        out.extend(shares.iter().map(|&s| s * value));
                        out
                    }
                })
            })
            .try_reduce(|| vec![Element::ZERO; width], |a, b| Ok(add_vectors(a, b)))
    }

    pub fn answer_bytes(&self, query: &[u8]) -> Result<Vec<u8>> {
        let decoded = FssQuery::decode(query)?;
        Ok(encode_element_vector(&self.answer(&decoded)?))
    }
}
