use rayon::prelude::*;

use crate::rng::Rng;
use crate::types::ParticlesSoA;

/// Multinomial resampling from the joint persistent-∪-birth weight
/// distribution. Every resampled particle inherits its source's state and
/// `associated` flag, and is assigned the normalised weight `total / P`.
pub struct Resampler;

impl Resampler {
    pub fn resample(
        particles: &ParticlesSoA,
        particles_next: &mut ParticlesSoA,
        birth_particles: &ParticlesSoA,
        weight_array: &[f32],
        birth_weight_array: &[f32],
        rng: &mut Rng,
        init_max_velocity: f32,
        grid_size: usize,
    ) {
        let persistent_count = particles.len();
        let total_count = persistent_count + birth_particles.len();

        let mut accum = vec![0.0f32; total_count];
        let mut running = 0.0f32;
        for i in 0..persistent_count {
            running += weight_array[i];
            accum[i] = running;
        }
        for i in 0..birth_particles.len() {
            running += birth_weight_array[i];
            accum[persistent_count + i] = running;
        }
        let total_weight = running;

        let p = particles_next.len();

        if total_weight <= 0.0 {
            reinitialise_uniform(particles_next, rng, init_max_velocity, grid_size);
            return;
        }

        let new_weight = total_weight / p as f32;

        // Draws taken in a single serial pass so RNG order stays
        // deterministic regardless of how rayon schedules the parallel
        // binary search and copy below.
        let draws: Vec<f32> = (0..p).map(|_| rng.uniform(0.0, total_weight)).collect();

        particles_next
            .x
            .par_iter_mut()
            .zip(particles_next.y.par_iter_mut())
            .zip(particles_next.vx.par_iter_mut())
            .zip(particles_next.vy.par_iter_mut())
            .zip(particles_next.associated.par_iter_mut())
            .zip(particles_next.weight.par_iter_mut())
            .zip(particles_next.cell_idx.par_iter_mut())
            .zip(draws.par_iter())
            .for_each(
                |(((((((x, y), vx), vy), associated), weight), cell_idx), &draw)| {
                    let idx = lower_bound(&accum, draw);
                    if idx < persistent_count {
                        *x = particles.x[idx];
                        *y = particles.y[idx];
                        *vx = particles.vx[idx];
                        *vy = particles.vy[idx];
                        *associated = particles.associated[idx];
                    } else {
                        let b = idx - persistent_count;
                        *x = birth_particles.x[b];
                        *y = birth_particles.y[b];
                        *vx = birth_particles.vx[b];
                        *vy = birth_particles.vy[b];
                        *associated = birth_particles.associated[b];
                    }
                    *weight = new_weight;
                    // Recomputed by the next frame's Predictor.
                    *cell_idx = 0;
                },
            );
    }
}

/// First index `i` with `accum[i] > draw`, clamped to the last index.
fn lower_bound(accum: &[f32], draw: f32) -> usize {
    let mut lo = 0usize;
    let mut hi = accum.len();
    while lo < hi {
        let mid = (lo + hi) / 2;
        if accum[mid] > draw {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo.min(accum.len() - 1)
}

fn reinitialise_uniform(
    particles_next: &mut ParticlesSoA,
    rng: &mut Rng,
    init_max_velocity: f32,
    grid_size: usize,
) {
    let n = particles_next.len();
    let new_weight = if n > 0 { 1.0 / n as f32 } else { 0.0 };
    for i in 0..n {
        let x = rng.uniform(0.0, grid_size as f32 - 1.0);
        let y = rng.uniform(0.0, grid_size as f32 - 1.0);
        let vx = rng.uniform(-init_max_velocity, init_max_velocity);
        let vy = rng.uniform(-init_max_velocity, init_max_velocity);
        particles_next.x[i] = x;
        particles_next.y[i] = y;
        particles_next.vx[i] = vx;
        particles_next.vy[i] = vy;
        particles_next.cell_idx[i] = y as i32 * grid_size as i32 + x as i32;
        particles_next.weight[i] = new_weight;
        particles_next.associated[i] = false;
    }
}
