use log::debug;

use crate::assign::Assigner;
use crate::birth::BirthSampler;
use crate::error::{DogmError, Result};
use crate::geometry::GridGeometry;
use crate::measurement::MeasurementBuilder;
use crate::moments::MomentEstimator;
use crate::normalize::WeightNormaliser;
use crate::occupancy::OccupancyUpdater;
use crate::predict::Predictor;
use crate::resample::Resampler;
use crate::rng::Rng;
use crate::types::{GridCell, MeasurementCell, ParticlesSoA, SensorFrame};

/// Construction-time parameters for the filter, matching the original
/// source's `DOGM::Params` field-for-field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    /// Grid side length, in metres.
    pub size: f32,
    /// Cell size, in metres/cell.
    pub resolution: f32,
    pub particle_count: usize,
    pub new_born_particle_count: usize,
    pub persistence_prob: f32,
    pub stddev_process_noise_position: f32,
    pub stddev_process_noise_velocity: f32,
    pub birth_prob: f32,
    pub stddev_velocity: f32,
    pub init_max_velocity: f32,
    pub freespace_discount: f32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            size: 3.0,
            resolution: 0.1,
            particle_count: 10_000,
            new_born_particle_count: 1_000,
            persistence_prob: 0.99,
            stddev_process_noise_position: 0.02,
            stddev_process_noise_velocity: 0.5,
            birth_prob: 0.02,
            stddev_velocity: 1.0,
            init_max_velocity: 3.0,
            freespace_discount: 0.01,
        }
    }
}

impl Params {
    fn validate(&self) -> Result<()> {
        if self.size <= 0.0 {
            return Err(DogmError::InvalidParams("size must be positive".into()));
        }
        if self.resolution <= 0.0 {
            return Err(DogmError::InvalidParams(
                "resolution must be positive".into(),
            ));
        }
        if self.particle_count == 0 {
            return Err(DogmError::InvalidParams(
                "particle_count must be positive".into(),
            ));
        }
        if self.new_born_particle_count == 0 {
            return Err(DogmError::InvalidParams(
                "new_born_particle_count must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// The Dynamic Occupancy Grid Map: a particle-based random-finite-set filter
/// fusing LiDAR and Radar evidence into per-cell occupancy and velocity.
///
/// `Dogm::update` sequences the pipeline `MeasurementBuilder -> Predictor ->
/// Assigner -> OccupancyUpdater -> WeightNormaliser -> BirthSampler ->
/// MomentEstimator -> Resampler` once per frame, then swaps the two particle
/// buffers.
pub struct Dogm {
    params: Params,
    geometry: GridGeometry,

    grid_cells: Vec<GridCell>,
    meas_cells: Vec<MeasurementCell>,

    particles: ParticlesSoA,
    particles_next: ParticlesSoA,
    birth_particles: ParticlesSoA,

    weight_array: Vec<f32>,
    birth_weight_array: Vec<f32>,
    born_masses: Vec<f32>,

    rng: Rng,

    first_update: bool,
    ego_pose: (f32, f32),
    ego_yaw: f32,
}

impl Dogm {
    pub fn new(params: Params) -> Result<Self> {
        Self::with_seed(params, 123_456)
    }

    pub fn with_seed(params: Params, seed: u64) -> Result<Self> {
        params.validate()?;

        let geometry = GridGeometry::new(params.size, params.resolution);
        let cell_count = geometry.cell_count();

        let mut rng = Rng::new(seed);
        let mut particles = ParticlesSoA::with_capacity(params.particle_count);
        init_particles(&mut particles, &mut rng, &geometry, params.init_max_velocity);

        Ok(Self {
            params,
            geometry,
            grid_cells: vec![GridCell::default(); cell_count],
            meas_cells: vec![MeasurementCell::default(); cell_count],
            particles,
            particles_next: ParticlesSoA::with_capacity(params.particle_count),
            birth_particles: ParticlesSoA::with_capacity(params.new_born_particle_count),
            weight_array: vec![0.0; params.particle_count],
            birth_weight_array: vec![0.0; params.new_born_particle_count],
            born_masses: vec![0.0; cell_count],
            rng,
            first_update: true,
            ego_pose: (0.0, 0.0),
            ego_yaw: 0.0,
        })
    }

    pub fn update(&mut self, frame: &SensorFrame, dt: f32) {
        self.ego_pose = frame.ego_pose;
        self.ego_yaw = frame.ego_yaw;
        let ego_grid = (
            self.ego_pose.0 / self.params.resolution,
            self.ego_pose.1 / self.params.resolution,
        );

        debug!("frame t={:.3}: building measurement grid", frame.timestamp);
        MeasurementBuilder::build(&self.geometry, frame, &mut self.meas_cells);

        debug!("predicting {} particles", self.particles.len());
        Predictor::predict(&mut self.particles, &mut self.rng, &self.geometry, &self.params, dt);

        Assigner::assign(&mut self.particles, &mut self.grid_cells, &mut self.weight_array);

        OccupancyUpdater::update(
            &mut self.grid_cells,
            &self.weight_array,
            &self.meas_cells,
            &mut self.born_masses,
            &self.params,
            dt,
        );

        WeightNormaliser::normalize(
            &mut self.particles,
            &mut self.grid_cells,
            &self.meas_cells,
            &mut self.weight_array,
            ego_grid,
        );

        BirthSampler::sample(
            &mut self.birth_particles,
            &self.grid_cells,
            &self.meas_cells,
            &self.born_masses,
            &mut self.rng,
            &self.geometry,
            &self.params,
            ego_grid,
        );
        self.birth_weight_array
            .copy_from_slice(&self.birth_particles.weight);

        MomentEstimator::estimate(&self.particles, &mut self.grid_cells, &self.weight_array);

        Resampler::resample(
            &self.particles,
            &mut self.particles_next,
            &self.birth_particles,
            &self.weight_array,
            &self.birth_weight_array,
            &mut self.rng,
            self.params.init_max_velocity,
            self.geometry.grid_size,
        );

        std::mem::swap(&mut self.particles, &mut self.particles_next);
        self.first_update = false;
        debug!("frame t={:.3} complete", frame.timestamp);
    }

    pub fn grid_cells(&self) -> &[GridCell] {
        &self.grid_cells
    }

    pub fn measurement_cells(&self) -> &[MeasurementCell] {
        &self.meas_cells
    }

    pub fn particles(&self) -> &ParticlesSoA {
        &self.particles
    }

    pub fn grid_size(&self) -> usize {
        self.geometry.grid_size
    }

    pub fn resolution(&self) -> f32 {
        self.params.resolution
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn is_first_update(&self) -> bool {
        self.first_update
    }
}

fn init_particles(
    particles: &mut ParticlesSoA,
    rng: &mut Rng,
    geometry: &GridGeometry,
    max_velocity: f32,
) {
    let n = particles.len();
    let new_weight = if n > 0 { 1.0 / n as f32 } else { 0.0 };
    let grid_size = geometry.grid_size as f32;
    for i in 0..n {
        let x = rng.uniform(0.0, grid_size - 1.0);
        let y = rng.uniform(0.0, grid_size - 1.0);
        particles.x[i] = x;
        particles.y[i] = y;
        particles.vx[i] = rng.uniform(-max_velocity, max_velocity);
        particles.vy[i] = rng.uniform(-max_velocity, max_velocity);
        particles.weight[i] = new_weight;
        particles.cell_idx[i] = y as i32 * geometry.grid_size as i32 + x as i32;
        particles.associated[i] = false;
    }
}
