use nalgebra::Vector2;

/// Cell-size, resolution, and world↔grid conversions.
///
/// All particle coordinates inside the core are in *grid-cell units*; world
/// units (metres) only appear when ingesting or emitting data at the crate's
/// boundary (the measurement builder's sensor frame, and the CSV writer).
#[derive(Debug, Clone, Copy)]
pub struct GridGeometry {
    pub size: f32,
    pub resolution: f32,
    pub grid_size: usize,
}

impl GridGeometry {
    pub fn new(size: f32, resolution: f32) -> Self {
        let grid_size = (size / resolution).floor() as usize;
        Self {
            size,
            resolution,
            grid_size,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.grid_size * self.grid_size
    }

    /// World-frame metres to continuous grid-cell units.
    pub fn world_to_grid(&self, world: Vector2<f32>) -> Vector2<f32> {
        world / self.resolution
    }

    /// Continuous grid-cell units back to world-frame metres.
    pub fn grid_to_world(&self, grid: Vector2<f32>) -> Vector2<f32> {
        grid * self.resolution
    }

    /// Flat cell index for a point already in grid-cell units, or `None` if
    /// it falls outside `[0, grid_size)^2`.
    pub fn cell_index(&self, x: f32, y: f32) -> Option<usize> {
        if x < 0.0 || y < 0.0 || x >= self.grid_size as f32 || y >= self.grid_size as f32 {
            return None;
        }
        let gx = x as usize;
        let gy = y as usize;
        Some(gy * self.grid_size + gx)
    }

    /// Centre of cell `idx`, in grid-cell units.
    pub fn cell_centre(&self, idx: usize) -> Vector2<f32> {
        let gx = (idx % self.grid_size) as f32;
        let gy = (idx / self.grid_size) as f32;
        Vector2::new(gx + 0.5, gy + 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_size_floors_size_over_resolution() {
        let g = GridGeometry::new(20.0, 0.2);
        assert_eq!(g.grid_size, 100);
        assert_eq!(g.cell_count(), 10_000);
    }

    #[test]
    fn cell_index_rejects_out_of_bounds() {
        let g = GridGeometry::new(20.0, 0.2);
        assert_eq!(g.cell_index(-0.1, 0.0), None);
        assert_eq!(g.cell_index(0.0, 100.0), None);
        assert_eq!(g.cell_index(50.0, 20.0), Some(20 * 100 + 50));
    }

    #[test]
    fn world_grid_roundtrip() {
        let g = GridGeometry::new(20.0, 0.2);
        let w = Vector2::new(10.0, 2.0);
        let gr = g.world_to_grid(w);
        assert_eq!(gr, Vector2::new(50.0, 10.0));
        assert_eq!(g.grid_to_world(gr), w);
    }
}
