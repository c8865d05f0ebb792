use confcrypt_crypto::prelude::*;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::thread;

fn build(pooled: bool) -> Provider {
    Provider::builder()
        .engine_config(EngineConfig { iterations: 1_000, ..EngineConfig::with_salt(b"bench-salt") })
        .unwrap()
        .passphrase("bench-passphrase")
        .pooled(pooled)
        .build()
        .unwrap()
}

fn bench_encrypt_decrypt(c: &mut Criterion) {
    let mut group = c.benchmark_group("encrypt_decrypt");
    let sizes = [("32B", 32usize), ("1KB", 1024), ("16KB", 16 * 1024)];

    for (strategy, provider) in [("single", build(false)), ("pooled", build(true))] {
        for (label, size) in sizes {
            let value = "x".repeat(size);
            group.throughput(Throughput::Bytes(size as u64));

            group.bench_with_input(
                BenchmarkId::new(format!("encrypt_{strategy}"), label),
                &value,
                |b, v| {
                    b.iter(|| provider.encrypt(v).unwrap());
                },
            );

            let sealed = provider.encrypt(&value).expect("encrypt failed");
            group.bench_with_input(
                BenchmarkId::new(format!("decrypt_{strategy}"), label),
                &sealed,
                |b, s| {
                    b.iter(|| provider.decrypt(s).unwrap());
                },
            );
        }
    }

    group.finish();
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_roundtrip");
    let threads = thread::available_parallelism().map_or(4, usize::from);

    for (strategy, provider) in [("single", build(false)), ("pooled", build(true))] {
        group.bench_function(BenchmarkId::new(strategy, threads), |b| {
            b.iter(|| {
                thread::scope(|scope| {
                    for _ in 0..threads {
                        scope.spawn(|| {
                            let sealed = provider.encrypt("db.password=s3cr3t").unwrap();
                            provider.decrypt(&sealed).unwrap();
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

fn bench_key_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_derivation");
    group.sample_size(10);

    for kdf in [KdfAlgorithm::Pbkdf2HmacSha256, KdfAlgorithm::Pbkdf2HmacSha512] {
        let engine = AesGcmEngine::new(EngineConfig {
            kdf_algorithm: kdf,
            ..EngineConfig::with_salt(b"bench-salt")
        })
        .unwrap();

        group.bench_function(BenchmarkId::new("pbkdf2", kdf), |b| {
            b.iter(|| engine.derive_key("bench-passphrase").unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encrypt_decrypt, bench_contended, bench_key_derivation);
criterion_main!(benches);
