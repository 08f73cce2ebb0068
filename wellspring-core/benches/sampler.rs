//! Sampling and drain throughput.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use wellspring_core::config::SamplerConfig;
use wellspring_core::sampler::AquiferSampler;
use wellspring_core::{AquiferConfig, AquiferService, VoxelCell, VoxelClass, WorldInfo};
use wellspring_utils::CellKey;

const WORLD: WorldInfo = WorldInfo::new(42, 256);

/// A cell with a salty band over scattered fresh water and a boiling floor.
fn layered_cell(key: CellKey) -> VoxelCell {
    let mut cell = VoxelCell::new(key, WORLD).with_rain(0.6);
    cell.fill_layers(0, 2, VoxelClass::BoilingWater);
    cell.fill_layers(8, 12, VoxelClass::SaltWater);
    for i in 0..16 {
        cell.set(i, 4, (i * 7) % 16, VoxelClass::FreshWater);
    }
    cell
}

fn bench_scan(c: &mut Criterion) {
    let cell = layered_cell(CellKey::new(0, 1, 0));

    let mut group = c.benchmark_group("aquifer_scan");
    for stride in [1, 2, 4] {
        let sampler = AquiferSampler::new(SamplerConfig {
            stride,
            ..SamplerConfig::default()
        });
        group.bench_with_input(BenchmarkId::from_parameter(stride), &stride, |b, _| {
            b.iter(|| black_box(sampler.scan(black_box(&cell))));
        });
    }
    group.finish();
}

fn bench_sample(c: &mut Criterion) {
    let key = CellKey::new(3, 2, -5);
    let cell = layered_cell(key);
    let sampler = AquiferSampler::new(SamplerConfig::default());

    c.bench_function("aquifer_sample_single_cell", |b| {
        b.iter(|| black_box(sampler.sample(black_box(&cell), key)));
    });
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("aquifer_drain");
    group.sample_size(10);
    for radius in [1, 2] {
        let side = radius * 2 + 1;
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{side}x{side}x{side}")),
            &radius,
            |b, &r| {
                b.iter(|| {
                    let service = AquiferService::with_memory_store(AquiferConfig::default())
                        .expect("default config is valid");
                    for x in -r..=r {
                        for y in -r..=r {
                            for z in -r..=r {
                                let key = CellKey::new(x, y + 4, z);
                                service.on_region_loaded(key, Arc::new(layered_cell(key)));
                            }
                        }
                    }
                    black_box(service.drain_until_idle());
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_scan, bench_sample, bench_drain);
criterion_main!(benches);
