use crate::dogm::Params;
use crate::geometry::GridGeometry;
use crate::rng::Rng;
use crate::types::{GridCell, MeasurementCell, ParticlesSoA};

/// Distributes new-born particles over grid cells in proportion to each
/// cell's born occupancy mass, then samples each birth particle's position
/// (cell-centre plus jitter) and velocity (radar-cued for associated slots,
/// zero-mean otherwise).
pub struct BirthSampler;

impl BirthSampler {
    pub fn sample(
        birth_particles: &mut ParticlesSoA,
        grid_cells: &[GridCell],
        meas_cells: &[MeasurementCell],
        born_masses: &[f32],
        rng: &mut Rng,
        geometry: &GridGeometry,
        params: &Params,
        ego_grid: (f32, f32),
    ) {
        let cell_count = grid_cells.len();
        let p_b = birth_particles.len();

        let mut accum = vec![0.0f32; cell_count];
        let mut running = 0.0f32;
        for (i, m) in born_masses.iter().enumerate() {
            running += m;
            accum[i] = running;
        }
        let total = running;

        if total <= 0.0 || p_b == 0 {
            for w in birth_particles.weight.iter_mut() {
                *w = 0.0;
            }
            return;
        }

        // Pre-compute, per slot, which cell it belongs to and whether it is
        // an associated draw, then take all RNG draws in one serial pass
        // so the call order is deterministic before writing the SoA arrays.
        let mut slot_cell = vec![0usize; p_b];
        let mut slot_associated = vec![false; p_b];
        let mut slot_weight = vec![0.0f32; p_b];

        for j in 0..cell_count {
            let start_order = if j == 0 { 0.0 } else { accum[j - 1] };
            let end_order = accum[j];
            let start_idx = (start_order / total * p_b as f32).ceil() as usize;
            let end_idx = (end_order / total * p_b as f32).ceil() as usize;
            let end_idx = end_idx.min(p_b);
            if end_idx <= start_idx {
                continue;
            }
            let num = end_idx - start_idx;
            let p_a = meas_cells[j].p_a;
            let nu_a = (num as f32 * p_a).round() as usize;
            let nu_a = nu_a.min(num);
            let nu_ua = num - nu_a;

            let w_a = if nu_a > 0 {
                p_a * born_masses[j] / nu_a as f32
            } else {
                0.0
            };
            let w_ua = if nu_ua > 0 {
                (1.0 - p_a) * born_masses[j] / nu_ua as f32
            } else {
                0.0
            };

            for (k, slot) in (start_idx..end_idx).enumerate() {
                let is_associated = k < nu_a;
                slot_cell[slot] = j;
                slot_associated[slot] = is_associated;
                slot_weight[slot] = if is_associated { w_a } else { w_ua };
            }
        }

        let (ego_x, ego_y) = ego_grid;

        for slot in 0..p_b {
            let j = slot_cell[slot];
            let meas = &meas_cells[j];
            let centre = geometry.cell_centre(j);

            let jitter_x: f32 = rng.uniform(-0.5, 0.5);
            let jitter_y: f32 = rng.uniform(-0.5, 0.5);

            let (vx, vy) = if slot_associated[slot] && meas.velocity_confidence > 0.5 {
                let angle = (centre.y - ego_y).atan2(centre.x - ego_x);
                let mean_vx = meas.radial_velocity * angle.cos();
                let mean_vy = meas.radial_velocity * angle.sin();
                (
                    rng.normal(mean_vx, params.stddev_velocity / 2.0),
                    rng.normal(mean_vy, params.stddev_velocity / 2.0),
                )
            } else {
                (
                    rng.normal(0.0, params.stddev_velocity),
                    rng.normal(0.0, params.stddev_velocity),
                )
            };

            birth_particles.x[slot] = centre.x + jitter_x;
            birth_particles.y[slot] = centre.y + jitter_y;
            birth_particles.vx[slot] = vx;
            birth_particles.vy[slot] = vy;
            birth_particles.cell_idx[slot] = j as i32;
            birth_particles.weight[slot] = slot_weight[slot];
            birth_particles.associated[slot] = slot_associated[slot];
        }
    }
}
