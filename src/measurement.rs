use rayon::prelude::*;

use crate::geometry::GridGeometry;
use crate::types::{MeasurementCell, SensorFrame};

/// Builds the per-cell measurement grid from a fused LiDAR+Radar sensor
/// frame: LiDAR inverse sensor model (ray-cast free/occupied evidence),
/// Radar fusion (SNR-weighted occupancy + velocity hint), then Dempster-Shafer
/// renormalisation and the association-probability `p_A`.
pub struct MeasurementBuilder;

/// SNR to confidence in `[0, 1]`: `< 5` is no confidence, `> 20` is full
/// confidence, linear in between.
fn snr_to_confidence(snr: f32) -> f32 {
    ((snr - 5.0) / 15.0).clamp(0.0, 1.0)
}

impl MeasurementBuilder {
    /// Overwrites `meas_cells` in place from `frame`. `meas_cells.len()` must
    /// equal `geometry.cell_count()`.
    pub fn build(geometry: &GridGeometry, frame: &SensorFrame, meas_cells: &mut [MeasurementCell]) {
        debug_assert_eq!(meas_cells.len(), geometry.cell_count());
        for cell in meas_cells.iter_mut() {
            *cell = MeasurementCell::default();
        }

        Self::apply_lidar(geometry, frame, meas_cells);
        Self::apply_radar(geometry, frame, meas_cells);

        meas_cells.par_iter_mut().for_each(|cell| {
            let total = cell.occ_mass + cell.free_mass;
            if total > 1.0 {
                cell.occ_mass /= total;
                cell.free_mass /= total;
            }
            cell.likelihood = 1.0;
            cell.p_a = 0.5 + 0.4 * cell.velocity_confidence;
        });
    }

    fn apply_lidar(geometry: &GridGeometry, frame: &SensorFrame, meas_cells: &mut [MeasurementCell]) {
        let (ego_x, ego_y) = frame.ego_pose;
        for (range, angle) in frame
            .lidar
            .ranges
            .iter()
            .zip(frame.lidar.angles.iter())
        {
            if !range.is_finite() || *range <= 0.0 {
                continue;
            }
            let (sin_a, cos_a) = angle.sin_cos();

            let mut r = 0.0f32;
            while r < *range {
                let wx = ego_x + r * cos_a;
                let wy = ego_y + r * sin_a;
                let g = geometry.world_to_grid(nalgebra::Vector2::new(wx, wy));
                if let Some(idx) = geometry.cell_index(g.x, g.y) {
                    let cell = &mut meas_cells[idx];
                    cell.free_mass = cell.free_mass.max(0.7);
                    cell.occ_mass *= 0.5;
                }
                r += geometry.resolution;
            }

            let end_x = ego_x + range * cos_a;
            let end_y = ego_y + range * sin_a;
            let g_end = geometry.world_to_grid(nalgebra::Vector2::new(end_x, end_y));
            if let Some(idx) = geometry.cell_index(g_end.x, g_end.y) {
                let cell = &mut meas_cells[idx];
                cell.occ_mass = cell.occ_mass.max(0.8);
                cell.free_mass = 0.0;
            }
        }
    }

    fn apply_radar(geometry: &GridGeometry, frame: &SensorFrame, meas_cells: &mut [MeasurementCell]) {
        for detection in &frame.radar {
            let g = geometry.world_to_grid(nalgebra::Vector2::new(
                detection.position.0,
                detection.position.1,
            ));
            let idx = match geometry.cell_index(g.x, g.y) {
                Some(idx) => idx,
                None => continue,
            };
            let confidence = snr_to_confidence(detection.snr);
            let cell = &mut meas_cells[idx];
            cell.occ_mass = cell.occ_mass.max(0.7 * confidence);
            cell.free_mass *= 1.0 - confidence;
            if confidence > cell.velocity_confidence {
                cell.radial_velocity = detection.radial_velocity;
                cell.velocity_confidence = confidence;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LidarMeasurement, RadarDetection};
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    fn empty_frame(ego_pose: (f32, f32), ego_yaw: f32) -> SensorFrame {
        SensorFrame {
            timestamp: 0.0,
            lidar: LidarMeasurement::default(),
            radar: Vec::new(),
            ego_pose,
            ego_yaw,
        }
    }

    #[test]
    fn empty_frame_leaves_all_cells_zero() {
        let geometry = GridGeometry::new(20.0, 0.2);
        let mut cells = vec![MeasurementCell::default(); geometry.cell_count()];
        let frame = empty_frame((10.0, 0.0), PI / 2.0);
        MeasurementBuilder::build(&geometry, &frame, &mut cells);
        for cell in &cells {
            assert_eq!(cell.occ_mass, 0.0);
            assert_eq!(cell.free_mass, 0.0);
        }
    }

    #[test]
    fn single_lidar_beam_marks_endpoint_occupied_and_ray_free() {
        let geometry = GridGeometry::new(20.0, 0.2);
        let mut cells = vec![MeasurementCell::default(); geometry.cell_count()];
        let mut frame = empty_frame((10.0, 2.0), PI / 2.0);
        frame.lidar.angles.push(PI / 2.0);
        frame.lidar.ranges.push(2.0);

        MeasurementBuilder::build(&geometry, &frame, &mut cells);

        let end_idx = geometry.cell_index(50.0, 20.0).unwrap();
        assert!(cells[end_idx].occ_mass >= 0.8);
        assert_eq!(cells[end_idx].free_mass, 0.0);

        let mid_idx = geometry.cell_index(50.0, 12.0).unwrap();
        assert!(cells[mid_idx].free_mass >= 0.7);

        let untouched_idx = geometry.cell_index(0.0, 0.0).unwrap();
        assert_eq!(cells[untouched_idx].occ_mass, 0.0);
        assert_eq!(cells[untouched_idx].free_mass, 0.0);
    }

    #[test]
    fn single_radar_detection_high_snr() {
        let geometry = GridGeometry::new(20.0, 0.2);
        let mut cells = vec![MeasurementCell::default(); geometry.cell_count()];
        let mut frame = empty_frame((10.0, 2.0), PI / 2.0);
        frame.radar.push(RadarDetection {
            position: (11.0, 3.0),
            radial_velocity: 1.0,
            snr: 20.0,
        });

        MeasurementBuilder::build(&geometry, &frame, &mut cells);

        let idx = geometry.cell_index(55.0, 15.0).unwrap();
        assert!(cells[idx].occ_mass >= 0.7);
        assert_relative_eq!(cells[idx].velocity_confidence, 1.0, epsilon = 1e-6);
        assert_relative_eq!(cells[idx].radial_velocity, 1.0, epsilon = 1e-6);
        assert_relative_eq!(cells[idx].p_a, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn snr_confidence_clamps() {
        assert_eq!(snr_to_confidence(0.0), 0.0);
        assert_eq!(snr_to_confidence(5.0), 0.0);
        assert_eq!(snr_to_confidence(20.0), 1.0);
        assert_eq!(snr_to_confidence(100.0), 1.0);
        assert_relative_eq!(snr_to_confidence(12.5), 0.5, epsilon = 1e-6);
    }
}
