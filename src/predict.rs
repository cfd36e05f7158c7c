use rayon::prelude::*;

use crate::dogm::Params;
use crate::geometry::GridGeometry;
use crate::rng::Rng;
use crate::types::ParticlesSoA;

/// Propagates persistent particles by `dt` under a constant-velocity model
/// with additive Gaussian process noise; kills (zero-weights) particles that
/// leave the grid rather than wrapping or reflecting them.
pub struct Predictor;

impl Predictor {
    pub fn predict(
        particles: &mut ParticlesSoA,
        rng: &mut Rng,
        geometry: &GridGeometry,
        params: &Params,
        dt: f32,
    ) {
        let n = particles.len();

        // Draw all process noise in a single serial pass so the RNG call
        // order stays deterministic regardless of how the parallel loop
        // below schedules its shards.
        let mut noise = Vec::with_capacity(n);
        for _ in 0..n {
            noise.push((
                rng.normal(0.0, params.stddev_process_noise_position),
                rng.normal(0.0, params.stddev_process_noise_position),
                rng.normal(0.0, params.stddev_process_noise_velocity),
                rng.normal(0.0, params.stddev_process_noise_velocity),
            ));
        }

        let grid_size = geometry.grid_size as f32;

        particles
            .x
            .par_iter_mut()
            .zip(particles.y.par_iter_mut())
            .zip(particles.vx.par_iter_mut())
            .zip(particles.vy.par_iter_mut())
            .zip(particles.weight.par_iter_mut())
            .zip(particles.cell_idx.par_iter_mut())
            .zip(noise.par_iter())
            .for_each(
                |((((((x, y), vx), vy), weight), cell_idx), (ep_x, ep_y, ev_x, ev_y))| {
                    *x += *vx * dt + ep_x;
                    *y += *vy * dt + ep_y;
                    *vx += ev_x;
                    *vy += ev_y;

                    *weight *= params.persistence_prob;

                    if *x < 0.0 || *x >= grid_size || *y < 0.0 || *y >= grid_size {
                        *weight = 0.0;
                    }

                    let px = (*x).clamp(0.0, grid_size - 1.0) as i32;
                    let py = (*y).clamp(0.0, grid_size - 1.0) as i32;
                    *cell_idx = py * geometry.grid_size as i32 + px;
                },
            );
    }
}
