use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{seq::SliceRandom, thread_rng};
use std::sync::Arc;
use travel_assistant::identifier_cache::{IdentifierCache, Namespace};
use travel_assistant::provider::ProviderError;
use travel_assistant::resolver::{IdentifierResolver, PlaceLookup};

// Answers instantly so the benchmark measures cache overhead only
struct EchoLookup;

#[async_trait]
impl PlaceLookup for EchoLookup {
    async fn lookup(&self, city: &str) -> Result<Option<String>, ProviderError> {
        Ok(Some(city.to_uppercase()))
    }
}

// Concurrent resolutions over a warm-ish cache, mostly hits after the first pass
pub fn cache_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("identifier_resolver");

    for city_count in [10usize, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(city_count),
            city_count,
            |b, &city_count| {
                b.to_async(&runtime).iter(|| async move {
                    let resolver = Arc::new(IdentifierResolver::new(
                        Arc::new(IdentifierCache::new()),
                        Arc::new(EchoLookup),
                        Arc::new(EchoLookup),
                    ));
                    let cities: Vec<String> =
                        (0..city_count).map(|i| format!(" city{} ", i)).collect();

                    let mut handles = vec![];
                    for task in 0..4 {
                        let resolver = Arc::clone(&resolver);
                        let cities = cities.clone();
                        handles.push(tokio::spawn(async move {
                            let namespace = if task % 2 == 0 {
                                Namespace::FlightEntity
                            } else {
                                Namespace::HotelGeo
                            };
                            for _ in 0..250 {
                                let city = cities.choose(&mut thread_rng()).unwrap().clone();
                                let _ = resolver.resolve(namespace, &city).await;
                            }
                        }));
                    }

                    for handle in handles {
                        handle.await.unwrap();
                    }

                    black_box(resolver.cache().stats())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, cache_benchmark);
criterion_main!(benches);
