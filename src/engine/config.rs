use crate::assets::MaterialId;
use crate::context::{EngineError, InvalidConfigErr};
use crate::physics::StepWorkers;
use bon::Builder;
use nalgebra::Vector3;
use snafu::ensure;
use std::path::PathBuf;

/// Tunables of the engine core. Every field has a default, so
/// `EngineConfig::builder().build()` is a working configuration.
///
/// ```
/// use rayforce::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .fixed_step(1.0 / 120.0)
///     .worker_threads(2)
///     .build();
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Builder)]
pub struct EngineConfig {
    #[builder(default = Vector3::new(0.0, -9.81, 0.0))]
    pub gravity: Vector3<f32>,
    /// Step used whenever the measured frame time can't be trusted.
    #[builder(default = 1.0 / 60.0)]
    pub fixed_step: f32,
    /// Longest frame time that is still simulated as measured.
    #[builder(default = 0.25)]
    pub max_frame_time: f32,
    #[builder(default = 0.02)]
    pub contact_offset: f32,
    #[builder(default = 0.0)]
    pub rest_offset: f32,
    #[builder(default = 0.2)]
    pub sleep_threshold: f32,
    /// Substituted for non-positive or non-finite masses.
    #[builder(default = 1.0)]
    pub default_mass: f32,
    /// Mass new entities start with.
    #[builder(default = 10.0)]
    pub entity_mass: f32,
    #[builder(default = 0.001)]
    pub weld_tolerance: f32,
    #[builder(default = StepWorkers::recommended_threads())]
    pub worker_threads: usize,
    #[builder(default = PathBuf::from("resources/models"), into)]
    pub asset_root: PathBuf,
    #[builder(default = MaterialId::Basic)]
    pub ground_material: MaterialId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::builder().build()
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        ensure!(
            self.fixed_step.is_finite() && self.fixed_step > 0.0,
            InvalidConfigErr {
                reason: format!("fixed step must be positive, got {}", self.fixed_step)
            }
        );
        ensure!(
            self.max_frame_time.is_finite() && self.max_frame_time >= self.fixed_step,
            InvalidConfigErr {
                reason: format!(
                    "max frame time {} is below the fixed step {}",
                    self.max_frame_time, self.fixed_step
                )
            }
        );
        ensure!(
            self.rest_offset >= 0.0 && self.contact_offset >= self.rest_offset,
            InvalidConfigErr {
                reason: format!(
                    "contact offset {} must not be below rest offset {}",
                    self.contact_offset, self.rest_offset
                )
            }
        );
        ensure!(
            self.default_mass.is_finite() && self.default_mass > 0.0,
            InvalidConfigErr {
                reason: format!("default mass must be positive, got {}", self.default_mass)
            }
        );
        ensure!(
            self.gravity.iter().all(|c| c.is_finite()),
            InvalidConfigErr {
                reason: "gravity must be finite"
            }
        );
        ensure!(
            self.worker_threads > 0,
            InvalidConfigErr {
                reason: "at least one physics worker is required"
            }
        );

        Ok(())
    }
}
