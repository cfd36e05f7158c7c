use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::types::GridCell;

/// One emitted grid cell: its coordinates, pignistic occupancy probability,
/// and velocity mean.
#[derive(Debug, Serialize)]
pub struct GridRecord {
    pub timestamp: f64,
    pub cell_x: usize,
    pub cell_y: usize,
    pub occ_prob: f32,
    pub mean_vx: f32,
    pub mean_vy: f32,
}

/// Writes grid snapshots to CSV, one row per cell whose pignistic occupancy
/// probability lands strictly inside `(0.1, 0.9)`, the "interesting" band
/// excluding cells that are confidently free or confidently occupied.
pub struct CsvGridWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvGridWriter<std::fs::File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let writer = csv::Writer::from_path(path)?;
        Ok(Self { writer })
    }
}

impl<W: Write> CsvGridWriter<W> {
    pub fn from_writer(inner: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
        }
    }

    pub fn write_frame(&mut self, timestamp: f64, grid_cells: &[GridCell], grid_size: usize) -> Result<()> {
        for (idx, cell) in grid_cells.iter().enumerate() {
            let occ_prob = pignistic_probability(cell);
            if occ_prob <= 0.1 || occ_prob >= 0.9 {
                continue;
            }
            let record = GridRecord {
                timestamp,
                cell_x: idx % grid_size,
                cell_y: idx / grid_size,
                occ_prob,
                mean_vx: cell.mean_vx,
                mean_vy: cell.mean_vy,
            };
            self.writer.serialize(&record)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// `m_occ + 0.5 * (1 - m_occ - m_free)`, the Dempster-Shafer pignistic
/// transform, used only at the output boundary.
pub fn pignistic_probability(cell: &GridCell) -> f32 {
    cell.occ_mass + 0.5 * (1.0 - cell.occ_mass - cell.free_mass)
}
