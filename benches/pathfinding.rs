use civitas::core::config::SimulationConfig;
use civitas::core::types::GridPos;
use civitas::simulation::{demo_town, scenario::town_world};
use civitas::spatial::find_path;
use civitas::world::{Terrain, TileMap};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

fn bench_find_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_path");

    let open = TileMap::new(64, 64, Terrain::Grass);
    group.bench_function("open_64", |b| {
        b.iter(|| {
            find_path(
                black_box(&open),
                GridPos::new(1, 1),
                GridPos::new(62, 62),
                2000,
            )
        })
    });

    // A long wall with a single gap at the far end
    let mut walled = TileMap::new(64, 64, Terrain::Grass);
    walled.fill(GridPos::new(32, 0), GridPos::new(32, 60), Terrain::Wall);
    group.bench_function("walled_64", |b| {
        b.iter(|| {
            find_path(
                black_box(&walled),
                GridPos::new(2, 30),
                GridPos::new(60, 30),
                5000,
            )
        })
    });

    let town = town_world();
    group.bench_function("town_well_to_baths", |b| {
        b.iter(|| {
            find_path(
                black_box(&town.map),
                GridPos::new(9, 16),
                GridPos::new(31, 15),
                2000,
            )
        })
    });

    group.finish();
}

fn bench_town_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("town_tick");
    for agents in [16_usize, 64] {
        group.bench_function(format!("agents_{agents}"), |b| {
            b.iter_batched(
                || demo_town(SimulationConfig::default(), 3, agents),
                |mut sim| {
                    for _ in 0..20 {
                        black_box(sim.step(1.0));
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_find_path, bench_town_tick);
criterion_main!(benches);
