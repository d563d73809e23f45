use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use stitch3d_cloud::{pointcloud::PointCloud, transforms::RigidTransform};
use stitch3d_icp::{
    align,
    correspondence::find_correspondences,
    spatial::{KdTreeIndex, SpatialIndex},
    AlignmentContext, ErrorMetric, Subsampling,
};

fn relief_scan(side: usize, pose: &RigidTransform) -> PointCloud {
    let half = side as f64 / 2.0;
    let points = (0..side)
        .flat_map(|r| (0..side).map(move |c| (c as f64 - half, r as f64 - half)))
        .map(|(x, y)| pose.apply(&[x, y, 12.0 * (x / 9.0).sin() + 10.0 * (y / 11.0).cos()]))
        .collect::<Vec<_>>();
    PointCloud::organized(side, side, points, None, None).unwrap()
}

fn bench_correspondences(c: &mut Criterion) {
    let mut group = c.benchmark_group("Correspondences");

    for side in [64, 128, 256].iter() {
        group.throughput(criterion::Throughput::Elements((*side * *side) as u64));

        let fixed = relief_scan(*side, &RigidTransform::IDENTITY);
        let moving = relief_scan(*side, &RigidTransform::from_translation([0.3, 0.2, 0.1]));
        let index = KdTreeIndex::new(fixed.points().to_vec());

        group.bench_with_input(
            BenchmarkId::new("kdtree", side),
            &(&index, &moving),
            |b, (index, moving)| {
                b.iter(|| find_correspondences(black_box(moving.points()), *index, None))
            },
        );

        group.bench_with_input(BenchmarkId::new("build_index", side), &fixed, |b, fixed| {
            b.iter(|| KdTreeIndex::new(black_box(fixed.points().to_vec())).len())
        });
    }
    group.finish();
}

fn bench_align(c: &mut Criterion) {
    let mut group = c.benchmark_group("Align");
    group.sample_size(10);

    let motion =
        RigidTransform::from_axis_angle(&[0.0, 0.0, 1.0], 2.0_f64.to_radians(), [1.0, 0.0, 0.0])
            .unwrap();

    for side in [64, 128].iter() {
        let fixed = relief_scan(*side, &RigidTransform::IDENTITY);
        let moving = relief_scan(*side, &motion);

        for metric in [ErrorMetric::PointToPoint, ErrorMetric::PointToPlane] {
            let context = AlignmentContext::default()
                .with_error_metric(metric)
                .with_subsampling(Subsampling::disabled());

            group.bench_with_input(
                BenchmarkId::new(metric.to_string(), side),
                &(&fixed, &moving),
                |b, (fixed, moving)| {
                    b.iter(|| align(black_box(&context), fixed, moving, None).unwrap())
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_correspondences, bench_align);
criterion_main!(benches);
