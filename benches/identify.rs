use std::sync::Arc;
use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use idlink::{IdentifyRequest, IdentityResolver, InMemoryContactStore};

fn seeded_resolver(clusters: u64) -> IdentityResolver {
    let store = Arc::new(InMemoryContactStore::new());
    let resolver = IdentityResolver::new(store);

    // Seed clusters of three records each so lookups traverse real links.
    for i in 0..clusters {
        let email = format!("user{i}@example.com");
        let phone = format!("555{i:07}");
        resolver
            .identify(&IdentifyRequest::new(
                Some(email.clone()),
                Some(phone.clone()),
            ))
            .unwrap();
        resolver
            .identify(&IdentifyRequest::new(
                Some(format!("alt{i}@example.com")),
                Some(phone),
            ))
            .unwrap();
        resolver
            .identify(&IdentifyRequest::new(Some(email), Some(format!("556{i:07}"))))
            .unwrap();
    }

    resolver
}

fn bench_identify_known_fact(c: &mut Criterion) {
    let resolver = seeded_resolver(256);
    let request = IdentifyRequest::new(Some("user42@example.com".to_string()), None);

    let mut group = c.benchmark_group("identify");
    group.throughput(Throughput::Elements(1));
    group.bench_function("known_fact", |b| {
        b.iter(|| resolver.identify(&request).unwrap());
    });
    group.finish();
}

fn bench_identify_new_contact(c: &mut Criterion) {
    c.bench_function("identify/new_contact", |b| {
        b.iter_custom(|iters| {
            // Fresh state per sample so accumulation does not leak between samples.
            let store = Arc::new(InMemoryContactStore::new());
            let resolver = IdentityResolver::new(store);

            let start = Instant::now();
            for i in 0..iters {
                let request =
                    IdentifyRequest::new(Some(format!("fresh{i}@example.com")), None);
                resolver.identify(&request).unwrap();
            }
            start.elapsed()
        });
    });
}

criterion_group!(benches, bench_identify_known_fact, bench_identify_new_contact);
criterion_main!(benches);
