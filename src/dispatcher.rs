//! Scatter/gather between one client and its servers.
//!
//! The dispatcher owns the per-server connections, sends one query per
//! connection concurrently and hands back the answers in query order. Any
//! transport error aborts the whole round: partial answer sets are never
//! surfaced. Cancellation is cooperative through a shared flag; once it is
//! raised, outstanding requests are abandoned and nothing is published.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::database::Info;
use crate::error::{Error, Result};

/// A channel to one server. Implementations are expected to enforce the
/// per-request timeout themselves and surface failures as
/// [`Error::Transport`].
pub trait Connection: Sync {
    fn send_query(&self, query: &[u8], timeout: Duration) -> Result<Vec<u8>>;
    fn fetch_info(&self) -> Result<Info>;
}

pub struct Dispatcher<C: Connection> {
    connections: Vec<C>,
}

impl<C: Connection> Dispatcher<C> {
    pub fn new(connections: Vec<C>) -> Result<Dispatcher<C>> {
        if connections.is_empty() {
            return Err(Error::InvalidInput("no server connections".into()));
        }
        Ok(Dispatcher { connections })
    }

    pub fn num_servers(&self) -> usize {
        self.connections.len()
    }

    /// Sends the j-th query over the j-th connection; the j-th answer in the
    /// result corresponds to it regardless of completion order.
    pub fn run_queries(
        &self,
        queries: &[Vec<u8>],
        timeout: Duration,
        cancel: &AtomicBool,
    ) -> Result<Vec<Vec<u8>>> {
        if queries.len() != self.connections.len() {
            return Err(Error::InvalidInput(format!(
                "{} queries for {} connections",
                queries.len(),
                self.connections.len()
            )));
        }

        let results: Vec<Result<Vec<u8>>> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .connections
                .iter()
                .zip(queries)
                .enumerate()
                .map(|(j, (conn, query))| {
                    scope.spawn(move || {
                        if cancel.load(Ordering::Relaxed) {
                            return Err(Error::Transport("query cancelled".into()));
                        }
                        debug!(server = j, bytes = query.len(), "sending query");
                        conn.send_query(query, timeout)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .unwrap_or_else(|_| Err(Error::Internal("answer thread panicked".into())))
                })
                .collect()
        });

        if cancel.load(Ordering::Relaxed) {
            return Err(Error::Transport("query cancelled".into()));
        }
        results.into_iter().collect()
    }

    /// Gathers the DB info message from every server and cross-checks that
    /// the replicas agree on the database geometry.
    pub fn fetch_db_infos(&self) -> Result<Vec<Info>> {
        let infos: Vec<Info> = self
            .connections
            .iter()
            .map(Connection::fetch_info)
            .collect::<Result<Vec<_>>>()?;

        if let Some(mismatch) = infos.iter().find(|i| !infos[0].matches(i)) {
            return Err(Error::InvalidInput(format!(
                "replicas disagree on database geometry: {:?} vs {:?}",
                infos[0], mismatch
            )));
        }
        Ok(infos)
    }
}

/// In-process connection wrapping a server closure, used by tests and
/// single-binary demos.
pub struct LocalConnection<F>
where
    F: Fn(&[u8]) -> Result<Vec<u8>> + Sync,
{
    info: Info,
    serve: F,
}

impl<F> LocalConnection<F>
where
    F: Fn(&[u8]) -> Result<Vec<u8>> + Sync,
{
    pub fn new(info: Info, serve: F) -> LocalConnection<F> {
        LocalConnection { info, serve }
    }
}

impl<F> Connection for LocalConnection<F>
where
    F: Fn(&[u8]) -> Result<Vec<u8>> + Sync,
{
    fn send_query(&self, query: &[u8], _timeout: Duration) -> Result<Vec<u8>> {
        (self.serve)(query)
    }

    fn fetch_info(&self) -> Result<Info> {
        Ok(self.info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Primitive;

    fn info() -> Info {
        Info {
            num_rows: 1,
            num_columns: 8,
            block_size: 4,
            pir_type: Primitive::PirClassic,
            merkle: None,
        }
    }

    type ServeFn = fn(&[u8]) -> Result<Vec<u8>>;

    fn echo(q: &[u8]) -> Result<Vec<u8>> {
        Ok(q.to_vec())
    }

    fn failing(_q: &[u8]) -> Result<Vec<u8>> {
        Err(Error::Transport("connection reset".into()))
    }

    fn echo_connection() -> LocalConnection<ServeFn> {
        LocalConnection::new(info(), echo as ServeFn)
    }

    #[test]
    fn test_answers_keep_query_order() {
        let dispatcher = Dispatcher::new(vec![echo_connection(), echo_connection()]).unwrap();
        let queries = vec![vec![1u8, 2], vec![3u8, 4]];

        let answers = dispatcher
            .run_queries(&queries, Duration::from_secs(1), &AtomicBool::new(false))
            .unwrap();
        assert_eq!(answers, queries);
    }

    #[test]
    fn test_transport_error_aborts_round() {
        let conns = vec![
            echo_connection(),
            LocalConnection::new(info(), failing as ServeFn),
        ];
        let dispatcher = Dispatcher::new(conns).unwrap();

        let result = dispatcher.run_queries(
            &[vec![1], vec![2]],
            Duration::from_secs(1),
            &AtomicBool::new(false),
        );
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[test]
    fn test_cancellation_discards_answers() {
        let dispatcher = Dispatcher::new(vec![echo_connection()]).unwrap();
        let cancel = AtomicBool::new(true);

        let result = dispatcher.run_queries(&[vec![1]], Duration::from_secs(1), &cancel);
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[test]
    fn test_query_count_must_match() {
        let dispatcher = Dispatcher::new(vec![echo_connection()]).unwrap();
        let result = dispatcher.run_queries(
            &[vec![1], vec![2]],
            Duration::from_secs(1),
            &AtomicBool::new(false),
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_info_mismatch_detected() {
        let mut other = info();
        other.num_columns = 16;
        let conns = vec![
            echo_connection(),
            LocalConnection::new(other, echo as ServeFn),
        ];
        let dispatcher = Dispatcher::new(conns).unwrap();

        assert!(dispatcher.fetch_db_infos().is_err());
    }

    #[test]
    fn test_empty_dispatcher_rejected() {
        let conns: Vec<LocalConnection<ServeFn>> = vec![];
        assert!(Dispatcher::new(conns).is_err());
    }
}
