use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use skin_database::cache::ResponseCache;
use skin_database::types::{MuseumItem, SkinType};
use skin_database::{db, skins, upload};
use sqlx::sqlite::SqlitePoolOptions;
use std::hint::black_box;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::runtime::Runtime;

fn page(n: usize) -> Vec<MuseumItem> {
    (0..n)
        .map(|i| MuseumItem {
            md5: format!("{:032x}", i),
            file_name: format!("skin_{}.wsz", i),
            nsfw: i % 7 == 0,
            color: None,
        })
        .collect()
}

fn benchmark_cache_hits(c: &mut Criterion) {
    let cache = ResponseCache::new(NonZeroUsize::new(100).unwrap(), Duration::from_secs(3600));
    for i in 0..100 {
        cache.insert(format!("/skins?offset={}&first=100", i * 100), page(100));
    }

    c.bench_function("cache_hit", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 1) % 100;
            black_box(cache.get(&format!("/skins?offset={}&first=100", i * 100)))
        })
    });
}

fn benchmark_cache_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_churn");

    for capacity in [10usize, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), capacity, |b, &capacity| {
            let cache = ResponseCache::new(NonZeroUsize::new(capacity).unwrap(), Duration::from_secs(3600));
            let mut i = 0usize;
            b.iter(|| {
                i += 1;
                let key = format!("/skins?offset={}", i);
                if cache.get(&key).is_none() {
                    black_box(cache.insert(key, page(10)));
                }
            })
        });
    }
    group.finish();
}

fn benchmark_museum_page(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let pool = rt.block_on(async {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::init_db(&pool).await.unwrap();
        for i in 0..2000u32 {
            let md5 = format!("{:032x}", i);
            skins::insert_skin(&pool, &md5, SkinType::Classic).await.unwrap();
            skins::record_filename(&pool, &md5, &format!("skin_{}.wsz", i), "bench").await.unwrap();
        }
        pool
    });

    let mut group = c.benchmark_group("museum_page");
    for first in [10i64, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(first), first, |b, &first| {
            b.iter(|| rt.block_on(async { black_box(skins::museum_page(&pool, 500, first).await.unwrap()) }))
        });
    }
    group.finish();
}

fn benchmark_detect_skin_type(c: &mut Criterion) {
    let mut archive = b"PK\x03\x04".to_vec();
    archive.extend(std::iter::repeat(0xA5u8).take(2 * 1024 * 1024));
    archive.extend_from_slice(b"main.bmp");

    c.bench_function("detect_skin_type_2mb", |b| {
        b.iter(|| black_box(upload::detect_skin_type(&archive, "skin.wsz").unwrap()))
    });
}

criterion_group!(
    benches,
    benchmark_cache_hits,
    benchmark_cache_churn,
    benchmark_museum_page,
    benchmark_detect_skin_type
);
criterion_main!(benches);
