use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::time::Duration;

use strata_chunk::{Voxel, VoxelGrid};
use strata_geom::{IVec3, Region};
use strata_mesh_cpu::extract_tile;
use strata_world::{CancelToken, FlatGenerator, GenContext, Generator, NoiseTerrain};

fn fill(grid: &mut VoxelGrid, generator: &dyn Generator, ctx: &GenContext) {
    let region = grid.region();
    let lo = region.lower();
    let hi = region.upper();
    for y in lo.y..=hi.y {
        for z in lo.z..=hi.z {
            for x in lo.x..=hi.x {
                let p = IVec3::new(x, y, z);
                grid.set(p, Voxel::new(generator.material_at(ctx, p)));
            }
        }
    }
}

fn bench_extract_flat(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_flat");
    let ctx = GenContext {
        seed: 1,
        water_level: 0,
        max_height: 255,
    };
    let tile = Region::from_origin_size(IVec3::new(0, 0, 0), 64);
    let mut grid = VoxelGrid::new(tile.grown(1));
    fill(&mut grid, &FlatGenerator::new(32), &ctx);
    let cancel = CancelToken::new();
    group.bench_function("flat_64", |b| {
        b.iter(|| black_box(extract_tile(&grid, tile, &cancel)))
    });
    group.finish();
}

fn bench_extract_noise(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_noise");
    group.measurement_time(Duration::from_secs(10));
    let ctx = GenContext {
        seed: 0x5EED,
        water_level: 40,
        max_height: 255,
    };
    let terrain = NoiseTerrain::new(ctx.seed, 0.008, 48, 24.0);
    let tile = Region::from_origin_size(IVec3::new(-32, 16, 96), 64);
    let mut grid = VoxelGrid::new(tile.grown(1));
    fill(&mut grid, &terrain, &ctx);
    let cancel = CancelToken::new();
    group.bench_function("noise_64", |b| {
        b.iter(|| black_box(extract_tile(&grid, tile, &cancel)))
    });
    group.finish();
}

criterion_group!(benches, bench_extract_flat, bench_extract_noise);
criterion_main!(benches);
