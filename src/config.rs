use serde::Deserialize;

use crate::dogm::Params;
use crate::error::{DogmError, Result};

/// TOML-deserialisable mirror of [`Params`], with the same defaults, used by
/// the `dogm-run` binary's `--config` flag.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub size: f32,
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

impl Default for AppConfig {
    fn default() -> Self {
        let p = Params::default();
        Self {
            size: p.size,
            resolution: p.resolution,
            particle_count: p.particle_count,
            new_born_particle_count: p.new_born_particle_count,
            persistence_prob: p.persistence_prob,
            stddev_process_noise_position: p.stddev_process_noise_position,
            stddev_process_noise_velocity: p.stddev_process_noise_velocity,
            birth_prob: p.birth_prob,
            stddev_velocity: p.stddev_velocity,
            init_max_velocity: p.init_max_velocity,
            freespace_discount: p.freespace_discount,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Converts to [`Params`], surfacing non-positive `size`/`resolution`/
    /// `particle_count`/`new_born_particle_count` as `DogmError::InvalidParams`
    /// rather than waiting for `Dogm::new` to reject them.
    pub fn into_params(self) -> Result<Params> {
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

        Ok(Params {
            size: self.size,
            resolution: self.resolution,
            particle_count: self.particle_count,
            new_born_particle_count: self.new_born_particle_count,
            persistence_prob: self.persistence_prob,
            stddev_process_noise_position: self.stddev_process_noise_position,
            stddev_process_noise_velocity: self.stddev_process_noise_velocity,
            birth_prob: self.birth_prob,
            stddev_velocity: self.stddev_velocity,
            init_max_velocity: self.init_max_velocity,
            freespace_discount: self.freespace_discount,
        })
    }
}
