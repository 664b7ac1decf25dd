//! Client for the FSS-based predicate queries with information-theoretic
//! MACs.
//!
//! A query samples `CONCURRENT_EXECUTIONS` MAC scalars α_i and shares the
//! vector `[1, α_1, …, α_k]` through the tree predicate FSS. Matching rows
//! contribute the vector (COUNT) or its multiple by the row value (SUM), so
//! slot 0 of the combined answers is the aggregate and every slot i must
//! equal `aggregate · α_i` for the answer to be accepted.

use crate::client::{check_num_servers, no_pending_query};
use crate::database::Info;
use crate::error::{Error, RejectCause, Result};
use crate::field::{Element, CONCURRENT_EXECUTIONS};
use crate::fss::Fss;
use crate::prg::Xof;
use crate::query::{decode_element_vector, ClientFss, FssQuery};

pub struct PredicateClient {
    xof: Xof,
    #[allow(dead_code)]
    info: Info,
    fss: Fss,
    state: Option<State>,
}

struct State {
    alphas: Vec<Element>,
}

/// The reconstructed aggregate of a predicate query.
pub type PredicateOutput = u32;

impl PredicateClient {
    /// One value slot for the data plus the MAC slots.
    pub fn new(mut xof: Xof, info: &Info) -> PredicateClient {
        let fss = Fss::client_initialize(1 + CONCURRENT_EXECUTIONS, &mut xof);
        PredicateClient {
            xof,
            info: info.clone(),
            fss,
            state: None,
        }
    }

    /// The PRF keys servers need to evaluate this client's queries,
    /// negotiated once at construction.
    pub fn prf_keys(&self) -> &[[u8; 16]] {
        self.fss.prf_keys()
    }

    /// Generates the two FSS query shares for a predicate.
    pub fn query(&mut self, q: &ClientFss, num_servers: usize) -> Result<Vec<FssQuery>> {
        check_num_servers(num_servers, 2)?;
        if num_servers != 2 {
            return Err(Error::InvalidInput(
                "the predicate family is a two-server scheme".into(),
            ));
        }
        if q.input.is_empty() {
            return Err(Error::InvalidInput("empty predicate input".into()));
        }

        let mut alphas = Vec::with_capacity(CONCURRENT_EXECUTIONS);
        let mut a = Vec::with_capacity(1 + CONCURRENT_EXECUTIONS);
        a.push(Element::ONE);
        for _ in 0..CONCURRENT_EXECUTIONS {
            let alpha = Element::set_random(&mut self.xof);
            alphas.push(alpha);
            a.push(alpha);
        }

        let (key_a, key_b) = self.fss.generate_tree_pf(&q.input, &a, &mut self.xof)?;
        self.state = Some(State { alphas });

        Ok(vec![
            FssQuery {
                info: q.info.clone(),
                key: key_a,
            },
            FssQuery {
                info: q.info.clone(),
                key: key_b,
            },
        ])
    }

    /// Combines the two answers and verifies every MAC slot. AVG answers
    /// carry a count half and a sum half that are checked separately.
    pub fn reconstruct(&mut self, answers: &[Vec<Element>]) -> Result<PredicateOutput> {
        let Some(state) = self.state.take() else {
            return no_pending_query();
        };
        let m = 1 + CONCURRENT_EXECUTIONS;
        if answers.len() != 2 {
            return Err(Error::InvalidInput("expected two answers".into()));
        }

        if answers[0].len() == 2 * m && answers[1].len() == 2 * m {
            let count = answers[0][0] + answers[1][0];
            let sum = answers[0][m] + answers[1][m];

            for (i, &alpha) in state.alphas.iter().enumerate() {
                let count_tag = answers[0][i + 1] + answers[1][i + 1];
                if count * alpha != count_tag {
                    return Err(Error::Reject(RejectCause::MacCount));
                }
                let sum_tag = answers[0][m + i + 1] + answers[1][m + i + 1];
                if sum * alpha != sum_tag {
                    return Err(Error::Reject(RejectCause::MacSum));
                }
            }

            if count.is_zero() {
                return Err(Error::NoMatch);
            }
            Ok(sum.value() / count.value())
        } else if answers[0].len() == m && answers[1].len() == m {
            let data = answers[0][0] + answers[1][0];
            for (i, &alpha) in state.alphas.iter().enumerate() {
                let tag = answers[0][i + 1] + answers[1][i + 1];
                if data * alpha != tag {
                    return Err(Error::Reject(RejectCause::Mac));
                }
            }
            Ok(data.value())
        } else {
            Err(Error::InvalidInput(format!(
                "answers of {} and {} slots",
                answers[0].len(),
                answers[1].len()
            )))
        }
    }

    /// Wire wrapper over an encoded [`ClientFss`].
    pub fn query_bytes(&mut self, input: &[u8], num_servers: usize) -> Result<Vec<Vec<u8>>> {
        let q = ClientFss::decode(input)?;
        let queries = self.query(&q, num_servers)?;
        Ok(queries.iter().map(FssQuery::encode).collect())
    }

    pub fn reconstruct_bytes(&mut self, answers: &[Vec<u8>]) -> Result<PredicateOutput> {
        let decoded = answers
            .iter()
            .map(|a| decode_element_vector(a))
            .collect::<Result<Vec<_>>>()?;
        self.reconstruct(&decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{FieldDb, Record};
    use crate::query::{Aggregation, Target};
    use crate::server::PredicateServer;
    use std::sync::Arc;

    fn records_with_domain(matching: usize, other: usize) -> Vec<Record> {
        let mut records = Vec::new();
        for i in 0..matching + other {
            let domain = if i < matching { "epfl.ch" } else { "example.org" };
            let record = Record {
                id: format!("{i:08x}"),
                email: format!("user{i}@{domain}"),
                creation_time: 1_600_000_000 + i as u32,
                pub_key_algo: 19,
                value: (i + 1) as u32,
                packet: Vec::new(),
            };
            records.push(Record {
                packet: record.encode_packet(),
                ..record
            });
        }
        records
    }

    fn db_with(records: Vec<Record>) -> Arc<FieldDb> {
        Arc::new(FieldDb::create_keys_db(records, 3, false).unwrap())
    }

    fn run(
        db: &Arc<FieldDb>,
        q: &ClientFss,
        tamper: Option<(usize, usize)>,
    ) -> Result<PredicateOutput> {
        let mut client = PredicateClient::new(Xof::new(b"predicate client"), &db.info);
        let servers = [
            PredicateServer::new(db.clone(), 0, client.prf_keys().to_vec()).unwrap(),
            PredicateServer::new(db.clone(), 1, client.prf_keys().to_vec()).unwrap(),
        ];

        let queries = client.query(q, 2)?;
        let mut answers: Vec<Vec<Element>> = servers
            .iter()
            .zip(&queries)
            .map(|(s, q)| s.answer(q))
            .collect::<Result<Vec<_>>>()?;
        if let Some((server, slot)) = tamper {
            answers[server][slot] += Element::ONE;
        }
        client.reconstruct(&answers)
    }

    #[test]
    fn test_count_matching_domain() {
        let db = db_with(records_with_domain(1, 30));
        let q = ClientFss::match_suffix(Target::Email, b"epfl.ch", Aggregation::Count).unwrap();

        assert_eq!(run(&db, &q, None).unwrap(), 1);
    }

    #[test]
    fn test_count_several_matches() {
        let db = db_with(records_with_domain(5, 20));
        let q = ClientFss::match_suffix(Target::Email, b"epfl.ch", Aggregation::Count).unwrap();

        assert_eq!(run(&db, &q, None).unwrap(), 5);
    }

    #[test]
    fn test_sum_over_matching_rows() {
        let db = db_with(records_with_domain(3, 10));
        let q = ClientFss::match_suffix(Target::Email, b"epfl.ch", Aggregation::Sum).unwrap();

        // Matching rows carry values 1, 2, 3.
        assert_eq!(run(&db, &q, None).unwrap(), 6);
    }

    #[test]
    fn test_avg_over_matching_rows() {
        let db = db_with(records_with_domain(4, 8));
        let q = ClientFss::match_suffix(Target::Email, b"epfl.ch", Aggregation::Avg).unwrap();

        // Values 1..=4 average to 10/4 = 2 under integer division.
        assert_eq!(run(&db, &q, None).unwrap(), 2);
    }

    #[test]
    fn test_avg_without_matches_is_no_match() {
        let db = db_with(records_with_domain(0, 12));
        let q = ClientFss::match_suffix(Target::Email, b"epfl.ch", Aggregation::Avg).unwrap();

        assert!(matches!(run(&db, &q, None), Err(Error::NoMatch)));
    }

    #[test]
    fn test_flipped_answer_bit_rejects() {
        let db = db_with(records_with_domain(1, 10));
        let q = ClientFss::match_suffix(Target::Email, b"epfl.ch", Aggregation::Count).unwrap();

        assert!(matches!(
            run(&db, &q, Some((0, 1))),
            Err(Error::Reject(RejectCause::Mac))
        ));
    }

    #[test]
    fn test_flipped_avg_slots_name_the_failing_half() {
        let db = db_with(records_with_domain(2, 6));
        let q = ClientFss::match_suffix(Target::Email, b"epfl.ch", Aggregation::Avg).unwrap();
        let m = 1 + CONCURRENT_EXECUTIONS;

        assert!(matches!(
            run(&db, &q, Some((1, 1))),
            Err(Error::Reject(RejectCause::MacCount))
        ));
        assert!(matches!(
            run(&db, &q, Some((1, m + 1))),
            Err(Error::Reject(RejectCause::MacSum))
        ));
    }

    #[test]
    fn test_wire_roundtrip() {
        let db = db_with(records_with_domain(2, 10));
        let q = ClientFss::match_suffix(Target::Email, b"epfl.ch", Aggregation::Count).unwrap();

        let mut client = PredicateClient::new(Xof::new(b"predicate wire"), &db.info);
        let servers = [
            PredicateServer::new(db.clone(), 0, client.prf_keys().to_vec()).unwrap(),
            PredicateServer::new(db.clone(), 1, client.prf_keys().to_vec()).unwrap(),
        ];

        let queries = client.query_bytes(&q.encode(), 2).unwrap();
        let answers: Vec<Vec<u8>> = servers
            .iter()
            .zip(&queries)
            .map(|(s, q)| s.answer_bytes(q).unwrap())
            .collect();

        assert_eq!(client.reconstruct_bytes(&answers).unwrap(), 2);
    }
}
