use std::collections::HashMap;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use fleet_core::{build_corridor, diff_keys};
use fleet_proto::{LatLon, VehicleId, VehicleState};

fn synth_vehicles(count: usize, id_offset: usize) -> HashMap<VehicleId, VehicleState> {
    (0..count)
        .map(|i| {
            let id = VehicleId(format!("MB{}", i + id_offset));
            let state = VehicleState {
                id: id.clone(),
                position: LatLon::new(-6.2 + i as f64 * 1e-4, 106.8),
                status: "idle".to_string(),
                battery_percent: 64.0,
                online_status: "online".to_string(),
                assignment: None,
            };
            (id, state)
        })
        .collect()
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");

    for size in [100usize, 1_000, 5_000] {
        // half the fleet overlaps between consecutive snapshots
        let previous = synth_vehicles(size, 0);
        let current = synth_vehicles(size, size / 2);
        group.bench_with_input(BenchmarkId::new("vehicles", size), &size, |b, _| {
            b.iter(|| diff_keys(&previous, &current))
        });
    }

    group.finish();
}

fn bench_corridor(c: &mut Criterion) {
    let mut group = c.benchmark_group("corridor");

    for points in [16usize, 128, 1_024] {
        let path: Vec<LatLon> = (0..points)
            .map(|i| LatLon::new(-6.2 + i as f64 * 1e-3, 106.8 + i as f64 * 7e-4))
            .collect();
        group.bench_with_input(BenchmarkId::new("rings", points), &points, |b, _| {
            b.iter(|| build_corridor(&path, 2_000.0))
        });
    }

    group.finish();
}

criterion_group!(sync_benches, bench_diff, bench_corridor);
criterion_main!(sync_benches);
