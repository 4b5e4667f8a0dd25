//! # Local Navigation Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use comms_if::local_nav::{Cluster, ObstacleClusters, WaypointCheckReq};
use nalgebra::Point2;
use nav_lib::local_nav::{check_path, LocalNavParams, LocalPlanner, RecursiveBug};

/// Ring of `n` points of radius `r_m` about `centre`, with a little
/// deterministic jitter so the concave hull has something to dig into.
fn blob(centre: Point2<f64>, r_m: f64, n: usize) -> Cluster {
    (0..n)
        .map(|i| {
            let angle = i as f64 * std::f64::consts::TAU / n as f64;
            let r = r_m * (1.0 - 0.2 * ((i * 7) % 5) as f64 / 5.0);
            Point2::new(centre.x + r * angle.cos(), centre.y + r * angle.sin())
        })
        .collect()
}

fn local_nav_benchmark(c: &mut Criterion) {
    // ---- Build a dense obstacle field ----

    let mut clusters: Vec<Cluster> = Vec::new();
    for ix in 0..10 {
        for iy in 0..10 {
            let centre = Point2::new(1.0 + ix as f64 * 1.5, -7.0 + iy as f64 * 1.5);
            clusters.push(blob(centre, 0.4, 4 + (ix + iy) % 20));
        }
    }

    let planner = LocalPlanner::new(LocalNavParams::default());
    planner.update_obstacles(ObstacleClusters::new(clusters));

    let outlines = planner.refresh_outlines();

    let current = Point2::new(0.0, 0.1);
    let target = Point2::new(16.0, 0.3);

    // ---- Benchmarks ----

    c.bench_function("refresh outlines", |b| b.iter(|| planner.refresh_outlines()));

    c.bench_function("check path", |b| {
        b.iter(|| check_path(black_box(&current), black_box(&target), &outlines))
    });

    if let Some(collision) = check_path(&current, &target, &outlines) {
        let bug = RecursiveBug::new(planner.params().clearance_m(), planner.params().sweep_max_deg);
        let outline = &outlines[collision.outline_index];

        c.bench_function("plan detour", |b| {
            b.iter(|| bug.plan(black_box(&current), black_box(&target), &collision.point_m, outline))
        });
    }

    let req = WaypointCheckReq {
        current_m: current,
        target_m: target,
    };

    c.bench_function("waypoint check", |b| b.iter(|| planner.waypoint_check(black_box(&req))));
}

criterion_group!(benches, local_nav_benchmark);
criterion_main!(benches);
