//! View configuration
//!
//! Every field has a default, so a config file only needs the values it
//! changes. Files are read as YAML or JSON depending on the extension.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EcoError, EcoResult};
use crate::particles::{DEFAULT_PARTICLE_SIZE, DEFAULT_PARTICLE_SPEED};
use crate::performance::DEFAULT_SAMPLE_INTERVAL_MS;
use crate::quality::QualityTier;
use crate::simulation::SimulationConfig;

/// Default orbital force strength
pub const DEFAULT_ORBITAL_STRENGTH: f32 = 1.0;

/// Settings for an [`EcosystemView`](crate::view::EcosystemView)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewConfig {
    /// Orbital force strength; 0 disables orbiting
    pub orbital_strength: f32,
    /// Whether links with value carry particle flows
    pub particles_enabled: bool,
    /// Offset advanced per frame along a link
    pub particle_speed: f32,
    /// Particle size before the tier multiplier
    pub base_particle_size: f32,
    /// FPS sampling window
    pub monitor_interval_ms: f64,
    /// Tier used until the first FPS report
    pub initial_tier: QualityTier,
    /// Follow FPS reports; when false the initial tier is kept
    pub adaptive_quality: bool,
    /// Seed for particle offsets
    pub seed: u64,
    pub simulation: SimulationConfig,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            orbital_strength: DEFAULT_ORBITAL_STRENGTH,
            particles_enabled: true,
            particle_speed: DEFAULT_PARTICLE_SPEED,
            base_particle_size: DEFAULT_PARTICLE_SIZE,
            monitor_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            initial_tier: QualityTier::High,
            adaptive_quality: true,
            seed: 0,
            simulation: SimulationConfig::default(),
        }
    }
}

impl ViewConfig {
    /// Load from a `.yaml`/`.yml` or `.json` file
    pub fn from_path(path: &Path) -> EcoResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> EcoResult<()> {
        if !self.orbital_strength.is_finite() || self.orbital_strength < 0.0 {
            return Err(EcoError::Configuration(format!(
                "orbital_strength must be a non-negative number, got {}",
                self.orbital_strength
            )));
        }
        if !(self.particle_speed > 0.0 && self.particle_speed < 1.0) {
            return Err(EcoError::Configuration(format!(
                "particle_speed must be in (0, 1), got {}",
                self.particle_speed
            )));
        }
        if !(self.base_particle_size > 0.0) {
            return Err(EcoError::Configuration(format!(
                "base_particle_size must be positive, got {}",
                self.base_particle_size
            )));
        }
        if !(self.monitor_interval_ms > 0.0) {
            return Err(EcoError::Configuration(format!(
                "monitor_interval_ms must be positive, got {}",
                self.monitor_interval_ms
            )));
        }
        Ok(())
    }
}
