use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use vpir::client::PredicateClient;
use vpir::database::{random_records, FieldDb};
use vpir::prg::Xof;
use vpir::query::{Aggregation, ClientFss, Target};
use vpir::server::PredicateServer;

/// Server answer time for a suffix predicate over growing record counts.
fn answer_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("predicate/answer");
    group.sample_size(20);

    for num_records in [100usize, 1000] {
        let mut xof = Xof::new(b"bench predicate");
        let records = random_records(&mut xof, num_records);
        let db = Arc::new(FieldDb::create_keys_db(records, 3, false).unwrap());

        let mut client = PredicateClient::new(Xof::new(b"bench predicate client"), &db.info);
        let server = PredicateServer::new(db, 0, client.prf_keys().to_vec()).unwrap();

        let q = ClientFss::match_suffix(Target::Email, b"epfl.ch", Aggregation::Count).unwrap();
        let queries = client.query(&q, 2).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(num_records),
            &num_records,
            |b, _| {
                b.iter(|| server.answer(&queries[0]).unwrap());
            },
        );
    }
    group.finish();
}

criterion_group!(benches, answer_benchmark);
criterion_main!(benches);
