use criterion::{black_box, criterion_group, criterion_main, Criterion};

use dogm::{Dogm, LidarMeasurement, Params, RadarDetection, SensorFrame};

fn bench_update(c: &mut Criterion) {
    let params = Params {
        size: 10.0,
        resolution: 0.2,
        particle_count: 20_000,
        new_born_particle_count: 2_000,
        ..Params::default()
    };

    let frame = SensorFrame {
        timestamp: 0.0,
        lidar: LidarMeasurement {
            ranges: vec![2.0; 90],
            angles: (0..90)
                .map(|i| -std::f32::consts::PI / 2.0 + i as f32 * (std::f32::consts::PI / 90.0))
                .collect(),
        },
        radar: vec![RadarDetection {
            position: (5.5, 5.2),
            radial_velocity: 1.0,
            snr: 18.0,
        }],
        ego_pose: (5.0, 5.0),
        ego_yaw: 0.0,
    };

    c.bench_function("dogm_update_single_frame", |b| {
        b.iter_batched(
            || Dogm::new(params).unwrap(),
            |mut dogm| {
                dogm.update(black_box(&frame), black_box(0.1));
                black_box(dogm.grid_cells().len());
            },
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_update);
criterion_main!(benches);
