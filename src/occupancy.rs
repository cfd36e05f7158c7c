use rayon::prelude::*;

use crate::dogm::Params;
use crate::types::{GridCell, MeasurementCell};

const CONFLICT_EPS: f32 = 1e-9;

/// Dempster-Shafer combination of the predicted occupancy/free masses with
/// the current measurement grid, split into a persistence share and a
/// newly-born share.
pub struct OccupancyUpdater;

impl OccupancyUpdater {
    pub fn update(
        grid_cells: &mut [GridCell],
        weight_array: &[f32],
        meas_cells: &[MeasurementCell],
        born_masses: &mut [f32],
        params: &Params,
        dt: f32,
    ) {
        let mut weight_accum = vec![0.0f32; weight_array.len()];
        let mut running = 0.0f32;
        for (i, w) in weight_array.iter().enumerate() {
            running += w;
            weight_accum[i] = running;
        }

        let alpha = params.freespace_discount.powf(dt);

        grid_cells
            .par_iter_mut()
            .zip(meas_cells.par_iter())
            .zip(born_masses.par_iter_mut())
            .for_each(|((cell, meas), born)| {
                let m_occ_pred = if cell.start_idx >= 0 {
                    let start = cell.start_idx as usize;
                    let end = cell.end_idx as usize;
                    let sum = if start == 0 {
                        weight_accum[end]
                    } else {
                        weight_accum[end] - weight_accum[start - 1]
                    };
                    sum.clamp(0.0, 1.0)
                } else {
                    0.0
                };

                let m_free_pred = (alpha * cell.free_mass).min(1.0 - m_occ_pred);

                let unknown_pred = 1.0 - m_occ_pred - m_free_pred;
                let unknown_meas = 1.0 - meas.occ_mass - meas.free_mass;
                let k = m_free_pred * meas.occ_mass + m_occ_pred * meas.free_mass;

                let (m_occ_up, m_free_up) = if (1.0 - k).abs() < CONFLICT_EPS {
                    (0.0, 0.0)
                } else {
                    let denom = 1.0 - k;
                    let m_occ_up = (m_occ_pred * unknown_meas
                        + unknown_pred * meas.occ_mass
                        + m_occ_pred * meas.occ_mass)
                        / denom;
                    let m_free_up = (m_free_pred * unknown_meas
                        + unknown_pred * meas.free_mass
                        + m_free_pred * meas.free_mass)
                        / denom;
                    (m_occ_up, m_free_up)
                };

                let rho_b = (m_occ_up * params.birth_prob * (1.0 - m_occ_pred))
                    / (m_occ_pred + params.birth_prob * (1.0 - m_occ_pred) + CONFLICT_EPS);
                let rho_p = m_occ_up - rho_b;

                cell.pers_occ_mass = rho_p.clamp(0.0, 1.0);
                cell.new_born_occ_mass = rho_b.clamp(0.0, 1.0);
                cell.free_mass = m_free_up.clamp(0.0, 1.0);
                cell.occ_mass = m_occ_up.clamp(0.0, 1.0);
                cell.pred_occ_mass = m_occ_pred;
                *born = cell.new_born_occ_mass;
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_params() -> Params {
        Params {
            birth_prob: 0.02,
            freespace_discount: 0.01,
            ..Params::default()
        }
    }

    #[test]
    fn full_conflict_does_not_produce_nan() {
        let mut grid_cells = vec![GridCell {
            free_mass: 1.0,
            ..GridCell::default()
        }];
        // no particles assigned -> m_occ_pred = 0, m_free_pred = min(alpha*1, 1) ~ alpha
        let weight_array: Vec<f32> = vec![];
        let meas_cells = vec![MeasurementCell {
            occ_mass: 1.0,
            free_mass: 0.0,
            ..MeasurementCell::default()
        }];
        let mut born = vec![0.0];
        let params = base_params();

        OccupancyUpdater::update(&mut grid_cells, &weight_array, &meas_cells, &mut born, &params, 0.1);

        assert!(grid_cells[0].occ_mass.is_finite());
        assert!(grid_cells[0].free_mass.is_finite());
        assert!(!grid_cells[0].occ_mass.is_nan());
        assert!(!grid_cells[0].free_mass.is_nan());
        assert!(grid_cells[0].occ_mass >= 0.0 && grid_cells[0].occ_mass <= 1.0);
    }

    #[test]
    fn masses_stay_in_unit_interval_and_split_sums_to_occ() {
        let mut grid_cells = vec![GridCell {
            start_idx: 0,
            end_idx: 0,
            free_mass: 0.2,
            ..GridCell::default()
        }];
        let weight_array = vec![0.3f32];
        let meas_cells = vec![MeasurementCell {
            occ_mass: 0.5,
            free_mass: 0.3,
            ..MeasurementCell::default()
        }];
        let mut born = vec![0.0];
        let params = base_params();

        OccupancyUpdater::update(&mut grid_cells, &weight_array, &meas_cells, &mut born, &params, 0.1);

        let cell = grid_cells[0];
        assert!(cell.occ_mass >= 0.0 && cell.occ_mass <= 1.0);
        assert!(cell.free_mass >= 0.0 && cell.free_mass <= 1.0);
        assert!(cell.occ_mass + cell.free_mass <= 1.0 + 1e-5);
        assert!((cell.pers_occ_mass + cell.new_born_occ_mass - cell.occ_mass).abs() <= 1e-5);
    }
}
