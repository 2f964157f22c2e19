use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::{Rotation3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use fidreg::{
    cluster_centroids, cluster_points, IcpConfig, IcpRequest, IcpSolver, KabschSolver, Point3,
    PointToPointIcp, RigidRequest, RigidSolver, Transform,
};

/// `groups` blobs of `per_group` points, blob centres 200 units apart.
fn make_landmarks(groups: usize, per_group: usize, seed: u64) -> Vec<Point3> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut points = Vec::with_capacity(groups * per_group);
    for g in 0..groups {
        let c = [
            200.0 * (g % 4) as f64,
            200.0 * ((g / 4) % 4) as f64,
            200.0 * (g / 16) as f64,
        ];
        for _ in 0..per_group {
            points.push([
                c[0] + rng.gen_range(-10.0..10.0),
                c[1] + rng.gen_range(-10.0..10.0),
                c[2] + rng.gen_range(-10.0..10.0),
            ]);
        }
    }
    points
}

fn make_motion() -> Transform {
    let rot = Rotation3::from_euler_angles(0.002, -0.001, 0.003);
    Transform::from_rotation_translation(rot.matrix(), &Vector3::new(1.0, -0.5, 0.3))
}

fn bench_cluster(c: &mut Criterion) {
    let points = make_landmarks(32, 8, 11);
    c.bench_function("cluster_points_256pts", |b| {
        b.iter(|| black_box(cluster_points(black_box(&points), 40.0)))
    });
    c.bench_function("cluster_centroids_256pts", |b| {
        b.iter(|| black_box(cluster_centroids(black_box(&points), 40.0)))
    });
}

fn bench_kabsch(c: &mut Criterion) {
    let moving = make_landmarks(16, 1, 5);
    let fixed = make_motion().apply_all(&moving);
    c.bench_function("kabsch_16pairs", |b| {
        b.iter(|| {
            let t = KabschSolver
                .solve(black_box(&RigidRequest {
                    fixed: &fixed,
                    moving: &moving,
                }))
                .expect("non-degenerate fixture should always fit");
            black_box(t)
        })
    });
}

fn bench_icp(c: &mut Criterion) {
    let moving = make_landmarks(16, 4, 23);
    let fixed = make_motion().apply_all(&moving);
    let config = IcpConfig::default();
    c.bench_function("icp_64pts_from_identity", |b| {
        b.iter(|| {
            let result = PointToPointIcp
                .refine(black_box(&IcpRequest {
                    fixed: &fixed,
                    moving: &moving,
                    initial: None,
                    config: &config,
                }))
                .expect("small motion should converge");
            black_box(result)
        })
    });
}

criterion_group!(hotpaths, bench_cluster, bench_kabsch, bench_icp);
criterion_main!(hotpaths);
