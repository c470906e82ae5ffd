use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use engine::{Engine, IndexType, Options};
use tempfile::tempdir;

const N_KEYS: usize = 10_000;
const VALUE_SIZE: usize = 100;

fn options(dir: &std::path::Path) -> Options {
    Options {
        dir_path: dir.to_path_buf(),
        data_file_size: 64 * 1024 * 1024,
        sync_writes: false,
        index_type: IndexType::Btree,
    }
}

fn populated_engine() -> (tempfile::TempDir, Engine) {
    let dir = tempdir().unwrap();
    let engine = Engine::open(options(dir.path())).unwrap();
    for i in 0..N_KEYS {
        engine
            .put(format!("key{:06}", i).into_bytes(), vec![b'x'; VALUE_SIZE])
            .unwrap();
    }
    (dir, engine)
}

fn put_benchmark(c: &mut Criterion) {
    c.bench_function("engine_put_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let engine = Engine::open(options(dir.path())).unwrap();
                (dir, engine)
            },
            |(_dir, engine)| {
                for i in 0..N_KEYS {
                    engine
                        .put(format!("key{:06}", i).into_bytes(), vec![b'x'; VALUE_SIZE])
                        .unwrap();
                }
            },
            BatchSize::PerIteration,
        );
    });
}

fn get_hit_benchmark(c: &mut Criterion) {
    let (_dir, engine) = populated_engine();
    let mut i = 0usize;
    c.bench_function("engine_get_hit", |b| {
        b.iter(|| {
            let key = format!("key{:06}", i % N_KEYS).into_bytes();
            i += 1;
            engine.get(&key).unwrap()
        });
    });
}

fn merge_benchmark(c: &mut Criterion) {
    c.bench_function("engine_merge_10k_half_dead", |b| {
        b.iter_batched(
            || {
                let (dir, engine) = populated_engine();
                for i in (0..N_KEYS).step_by(2) {
                    engine.delete(format!("key{:06}", i).into_bytes()).unwrap();
                }
                (dir, engine)
            },
            |(_dir, engine)| engine.merge().unwrap(),
            BatchSize::PerIteration,
        );
    });
}

criterion_group!(benches, put_benchmark, get_hit_benchmark, merge_benchmark);
criterion_main!(benches);
