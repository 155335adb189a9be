use criterion::{black_box, criterion_group, criterion_main, Criterion};
use smkes::registry::KeyRegistry;
use smkes::set_lock::SetLock;
use smkes::backend::memory::MemoryBackend;

fn registry_register_fresh_keys(n: u64) {
    let registry = KeyRegistry::new();
    for i in 0..n {
        registry.register(&format!("find_user:{i}")).unwrap();
    }
}

fn registry_register_same_key(n: u64) {
    let registry = KeyRegistry::new();
    for _ in 0..n {
        registry.register("find_user:5").unwrap();
    }
}

fn set_lock_sadd_distinct_members(rt: &tokio::runtime::Runtime, n: u64) {
    rt.block_on(async {
        let backend = MemoryBackend::new();
        let lock = SetLock::new(4);
        for i in 0..n {
            lock.sadd(&backend, "__set:user:1", i).await.unwrap();
        }
    });
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("registry register 1000 fresh keys", |b| {
        b.iter(|| registry_register_fresh_keys(black_box(1000)))
    });

    c.bench_function("registry register same key 1000 times", |b| {
        b.iter(|| registry_register_same_key(black_box(1000)))
    });

    let rt = tokio::runtime::Runtime::new().unwrap();
    c.bench_function("set lock fallback sadd 200 distinct members", |b| {
        b.iter(|| set_lock_sadd_distinct_members(&rt, black_box(200)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
