use rayon::prelude::*;

use crate::types::{GridCell, MeasurementCell, ParticlesSoA};

/// Re-normalises particle weights against the measurement grid's
/// association probability, then folds in the radar radial-velocity
/// likelihood.
///
/// The ego position passed here must already be in grid-cell units, the
/// same frame the particles live in. The original source hard-coded the
/// sensor origin at `(1.5, 1.5)` in two places; this implementation takes
/// the runtime ego pose everywhere instead.
pub struct WeightNormaliser;

impl WeightNormaliser {
    pub fn normalize(
        particles: &mut ParticlesSoA,
        grid_cells: &mut [GridCell],
        meas_cells: &[MeasurementCell],
        weight_array: &mut [f32],
        ego_grid: (f32, f32),
    ) {
        let n = particles.len();

        // Kernel 1: unnormalised weights, likelihood-scaled.
        for i in 0..n {
            let cell_idx = particles.cell_idx[i] as usize;
            weight_array[i] = meas_cells[cell_idx].likelihood * particles.weight[i];
        }

        let mut weight_accum = vec![0.0f32; n];
        let mut running = 0.0f32;
        for (i, w) in weight_array.iter().enumerate() {
            running += w;
            weight_accum[i] = running;
        }

        // Kernel 2: per-cell normalisation components.
        grid_cells.par_iter_mut().for_each(|cell| {
            if cell.start_idx >= 0 {
                let start = cell.start_idx as usize;
                let end = cell.end_idx as usize;
                let segment_sum = if start == 0 {
                    weight_accum[end]
                } else {
                    weight_accum[end] - weight_accum[start - 1]
                };
                cell.mu_a = if segment_sum > 0.0 {
                    cell.pers_occ_mass / segment_sum
                } else {
                    0.0
                };
                cell.mu_ua = if cell.pred_occ_mass > 0.0 {
                    cell.pers_occ_mass / cell.pred_occ_mass
                } else {
                    0.0
                };
            } else {
                cell.mu_a = 0.0;
                cell.mu_ua = 0.0;
            }
        });

        // Kernel 3: per-particle normalised weight, plus radar velocity likelihood.
        let (ego_x, ego_y) = ego_grid;
        particles
            .x
            .par_iter()
            .zip(particles.y.par_iter())
            .zip(particles.vx.par_iter())
            .zip(particles.vy.par_iter())
            .zip(particles.cell_idx.par_iter())
            .zip(particles.weight.par_iter())
            .zip(weight_array.par_iter_mut())
            .for_each(|((((((x, y), vx), vy), cell_idx), old_weight), w)| {
                let cell = &grid_cells[*cell_idx as usize];
                let meas = &meas_cells[*cell_idx as usize];

                let mut new_weight =
                    meas.p_a * cell.mu_a * *w + (1.0 - meas.p_a) * cell.mu_ua * old_weight;

                if meas.velocity_confidence > 0.5 {
                    let dx = *x - ego_x;
                    let dy = *y - ego_y;
                    let angle = dy.atan2(dx);
                    let particle_radial_vel = vx * angle.cos() + vy * angle.sin();
                    let vel_diff = particle_radial_vel - meas.radial_velocity;
                    let stddev = 0.5 * (1.0 - meas.velocity_confidence * 0.8);
                    let vel_likelihood = (-0.5 * vel_diff * vel_diff / (stddev * stddev)).exp();
                    new_weight *= vel_likelihood;
                }

                *w = new_weight;
            });

        for i in 0..n {
            particles.weight[i] = weight_array[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_stay_finite_and_nonnegative() {
        let mut particles = ParticlesSoA::with_capacity(2);
        particles.x = vec![1.0, 1.0];
        particles.y = vec![1.0, 1.0];
        particles.vx = vec![0.5, -0.5];
        particles.vy = vec![0.0, 0.0];
        particles.cell_idx = vec![0, 0];
        particles.weight = vec![0.5, 0.5];

        let mut grid_cells = vec![GridCell {
            start_idx: 0,
            end_idx: 1,
            pers_occ_mass: 0.6,
            pred_occ_mass: 1.0,
            ..GridCell::default()
        }];
        let meas_cells = vec![MeasurementCell {
            p_a: 0.9,
            velocity_confidence: 0.9,
            radial_velocity: 0.5,
            ..MeasurementCell::default()
        }];
        let mut weight_array = vec![0.0; 2];

        WeightNormaliser::normalize(
            &mut particles,
            &mut grid_cells,
            &meas_cells,
            &mut weight_array,
            (0.0, 0.0),
        );

        for w in &particles.weight {
            assert!(w.is_finite());
            assert!(*w >= 0.0);
        }
    }

    #[test]
    fn zero_segment_sum_and_zero_pred_give_zero_mu() {
        let mut particles = ParticlesSoA::with_capacity(0);
        let mut grid_cells = vec![GridCell::default()];
        let meas_cells = vec![MeasurementCell::default()];
        let mut weight_array: Vec<f32> = vec![];

        WeightNormaliser::normalize(
            &mut particles,
            &mut grid_cells,
            &meas_cells,
            &mut weight_array,
            (0.0, 0.0),
        );

        assert_eq!(grid_cells[0].mu_a, 0.0);
        assert_eq!(grid_cells[0].mu_ua, 0.0);
    }
}
