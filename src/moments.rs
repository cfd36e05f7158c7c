use rayon::prelude::*;

use crate::types::{GridCell, ParticlesSoA};

/// Per-cell weighted mean and (co)variance of velocity, computed over each
/// cell's segment of the sorted particle array.
///
/// Normalises by the segment's own weight sum, not by `pers_occ_mass`: the
/// two source revisions disagreed on this, and the segment-weight-sum
/// normalisation is the one that keeps the moments numerically sane when
/// `pers_occ_mass` is small but the segment itself carries real weight.
pub struct MomentEstimator;

impl MomentEstimator {
    pub fn estimate(particles: &ParticlesSoA, grid_cells: &mut [GridCell], weight_array: &[f32]) {
        grid_cells.par_iter_mut().for_each(|cell| {
            if cell.start_idx < 0 || cell.pers_occ_mass <= 0.0 {
                cell.mean_vx = 0.0;
                cell.mean_vy = 0.0;
                cell.var_vx = 0.0;
                cell.var_vy = 0.0;
                cell.covar_vxy = 0.0;
                return;
            }

            let start = cell.start_idx as usize;
            let end = cell.end_idx as usize;

            let mut sum_vx = 0.0f32;
            let mut sum_vy = 0.0f32;
            let mut sum_vx2 = 0.0f32;
            let mut sum_vy2 = 0.0f32;
            let mut sum_vxy = 0.0f32;
            let mut total_weight = 0.0f32;

            for i in start..=end {
                let w = weight_array[i];
                let vx = particles.vx[i];
                let vy = particles.vy[i];
                sum_vx += w * vx;
                sum_vy += w * vy;
                sum_vx2 += w * vx * vx;
                sum_vy2 += w * vy * vy;
                sum_vxy += w * vx * vy;
                total_weight += w;
            }

            if total_weight < 1e-9 {
                return;
            }

            let inv_w = 1.0 / total_weight;
            let mean_vx = inv_w * sum_vx;
            let mean_vy = inv_w * sum_vy;

            cell.mean_vx = mean_vx;
            cell.mean_vy = mean_vy;
            cell.var_vx = inv_w * sum_vx2 - mean_vx * mean_vx;
            cell.var_vy = inv_w * sum_vy2 - mean_vy * mean_vy;
            cell.covar_vxy = inv_w * sum_vxy - mean_vx * mean_vy;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_segment_zeroes_statistics() {
        let particles = ParticlesSoA::with_capacity(0);
        let mut grid_cells = vec![GridCell::default()];
        let weight_array: Vec<f32> = vec![];

        MomentEstimator::estimate(&particles, &mut grid_cells, &weight_array);

        assert_eq!(grid_cells[0].mean_vx, 0.0);
        assert_eq!(grid_cells[0].mean_vy, 0.0);
    }

    #[test]
    fn weighted_mean_matches_hand_computation() {
        let mut particles = ParticlesSoA::with_capacity(2);
        particles.vx = vec![1.0, 3.0];
        particles.vy = vec![0.0, 2.0];
        let weight_array = vec![1.0, 1.0];
        let mut grid_cells = vec![GridCell {
            start_idx: 0,
            end_idx: 1,
            pers_occ_mass: 0.5,
            ..GridCell::default()
        }];

        MomentEstimator::estimate(&particles, &mut grid_cells, &weight_array);

        assert!((grid_cells[0].mean_vx - 2.0).abs() < 1e-6);
        assert!((grid_cells[0].mean_vy - 1.0).abs() < 1e-6);
        assert!((grid_cells[0].var_vx - 1.0).abs() < 1e-6); // E[x^2]-E[x]^2 = 5-4=1
    }

    #[test]
    fn near_zero_weight_leaves_statistics_untouched() {
        let particles = ParticlesSoA {
            vx: vec![5.0],
            vy: vec![5.0],
            ..ParticlesSoA::with_capacity(1)
        };
        let weight_array = vec![1e-12];
        let mut grid_cells = vec![GridCell {
            start_idx: 0,
            end_idx: 0,
            pers_occ_mass: 0.5,
            mean_vx: 42.0,
            ..GridCell::default()
        }];

        MomentEstimator::estimate(&particles, &mut grid_cells, &weight_array);

        assert_eq!(grid_cells[0].mean_vx, 42.0);
    }
}
