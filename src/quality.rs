//! Quality tiers and the parameters they select
//!
//! Measured FPS picks a tier; the tier picks geometry resolution, the
//! per-link particle budget and the particle size multiplier.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Below this FPS the low tier is recommended
pub const LOW_FPS_THRESHOLD: u32 = 15;

/// At or above this FPS the high tier is recommended
pub const HIGH_FPS_THRESHOLD: u32 = 30;

/// Rendering detail level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

impl QualityTier {
    /// Tier for a measured frame rate
    ///
    /// Half-open bands: `[0, 15)` low, `[15, 30)` medium, `[30, ∞)` high.
    pub fn from_fps(fps: u32) -> Self {
        if fps < LOW_FPS_THRESHOLD {
            QualityTier::Low
        } else if fps < HIGH_FPS_THRESHOLD {
            QualityTier::Medium
        } else {
            QualityTier::High
        }
    }

    pub fn settings(self) -> QualitySettings {
        QualitySettings::for_tier(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete rendering parameters for a tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualitySettings {
    pub tier: QualityTier,
    /// Multiplier applied to every geometry's base segment count
    pub geometry_scale: f32,
    /// Minimum segment count after scaling
    pub min_segments: u32,
    /// Particle budget per link
    pub max_particles_per_link: usize,
    /// Multiplier on the base particle size
    pub particle_size_multiplier: f32,
}

impl QualitySettings {
    pub fn for_tier(tier: QualityTier) -> Self {
        match tier {
            QualityTier::High => Self {
                tier,
                geometry_scale: 1.0,
                min_segments: 0,
                max_particles_per_link: 50,
                particle_size_multiplier: 2.0,
            },
            QualityTier::Medium => Self {
                tier,
                geometry_scale: 0.7,
                min_segments: 8,
                max_particles_per_link: 25,
                particle_size_multiplier: 1.5,
            },
            QualityTier::Low => Self {
                tier,
                geometry_scale: 0.5,
                min_segments: 6,
                max_particles_per_link: 10,
                particle_size_multiplier: 1.0,
            },
        }
    }

    /// Segment count for a geometry whose full-quality resolution is `base`
    pub fn segments(&self, base: u32) -> u32 {
        let scaled = (base as f32 * self.geometry_scale).floor() as u32;
        scaled.max(self.min_segments)
    }

    /// Particle render size for a base size
    pub fn particle_size(&self, base: f32) -> f32 {
        base * self.particle_size_multiplier
    }
}

/// Tracks the active tier and reports only actual changes
#[derive(Debug, Clone)]
pub struct QualityController {
    current: QualityTier,
    adaptive: bool,
}

impl QualityController {
    pub fn new(initial: QualityTier) -> Self {
        Self {
            current: initial,
            adaptive: true,
        }
    }

    /// A controller that never leaves its initial tier
    pub fn fixed(tier: QualityTier) -> Self {
        Self {
            current: tier,
            adaptive: false,
        }
    }

    pub fn current(&self) -> QualityTier {
        self.current
    }

    pub fn settings(&self) -> QualitySettings {
        self.current.settings()
    }

    /// Feed a new FPS measurement; returns the new tier if it changed
    pub fn on_fps(&mut self, fps: u32) -> Option<QualityTier> {
        if !self.adaptive {
            return None;
        }
        let tier = QualityTier::from_fps(fps);
        if tier == self.current {
            return None;
        }
        info!(fps, from = %self.current, to = %tier, "quality tier changed");
        self.current = tier;
        Some(tier)
    }
}
