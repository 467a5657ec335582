//! Benchmarks for tile packing and mapping generation.
//!
//! Run with: `cargo bench -p udim-texture`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use udim_core::TileNumber;
use udim_texture::{PackRequest, TileMapping, TilePacker};

/// Mixed tile sizes, as produced by texture painting workflows.
fn requests(count: u32) -> Vec<PackRequest> {
    (0..count)
        .map(|i| {
            let size = [4096, 2048, 1024, 512][(i % 4) as usize];
            let height = if i % 3 == 0 { size / 2 } else { size };
            PackRequest::new(TileNumber::from_index(i), size, height)
        })
        .collect()
}

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack");

    for count in [10u32, 100, 1000] {
        let tiles = requests(count);
        group.throughput(Throughput::Elements(u64::from(count)));

        group.bench_with_input(BenchmarkId::new("unlimited", count), &tiles, |b, t| {
            let packer = TilePacker::new(16384);
            b.iter(|| packer.pack(black_box(t)));
        });

        group.bench_with_input(BenchmarkId::new("limit_1024", count), &tiles, |b, t| {
            let packer = TilePacker::new(1024);
            b.iter(|| packer.pack(black_box(t)));
        });
    }

    group.finish();
}

fn bench_mapping(c: &mut Criterion) {
    let tiles = requests(1000);
    let layout = TilePacker::new(16384).pack(&tiles).expect("packable tiles");

    c.bench_function("mapping_from_layout", |b| {
        b.iter(|| TileMapping::from_layout(black_box(&layout)));
    });
}

criterion_group!(benches, bench_pack, bench_mapping);
criterion_main!(benches);
