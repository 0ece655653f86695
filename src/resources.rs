//! Explicitly owned rendering resources
//!
//! The pool caches one sphere mesh per node kind and the particle material
//! parameters for the active quality tier. It is created uninitialized,
//! initialized with a tier, re-initialized only when the tier actually
//! changes, and disposed explicitly when the view goes away.

use std::collections::HashMap;

use rand::Rng;
use tracing::debug;

use crate::error::{EcoError, EcoResult};
use crate::geometry::{SphereMesh, uv_sphere};
use crate::model::NodeKind;
use crate::particles::{ParticleSystem, create_particle_system, emits_particles, particle_count};
use crate::quality::{QualitySettings, QualityTier};

/// Full-quality sphere resolution (segments around the equator) per node kind
pub fn base_segments(kind: NodeKind) -> u32 {
    match kind {
        NodeKind::Root => 32,
        NodeKind::Branch => 24,
        NodeKind::Leaf => 16,
    }
}

/// Particle parameters shared by every link at the current tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleMaterial {
    /// Particle budget per link
    pub max_particles_per_link: usize,
    /// Render size of each particle
    pub size: f32,
}

/// Parameters for building one link's particle batch
#[derive(Debug, Clone, Copy)]
pub struct ParticleRequest {
    pub source: [f32; 3],
    pub target: [f32; 3],
    pub color: [f32; 4],
    /// Offset advanced per frame
    pub speed: f32,
    /// Link value (drives the particle count)
    pub value: f32,
}

struct PoolState {
    settings: QualitySettings,
    geometries: HashMap<NodeKind, SphereMesh>,
    material: ParticleMaterial,
}

/// Node geometries and particle material for one view
pub struct ResourcePool {
    base_particle_size: f32,
    state: Option<PoolState>,
    generation: u64,
}

impl ResourcePool {
    /// Create an uninitialized pool
    pub fn new(base_particle_size: f32) -> Self {
        Self {
            base_particle_size,
            state: None,
            generation: 0,
        }
    }

    /// Build resources for `tier`
    ///
    /// Returns `false` without touching anything if `tier` is already active.
    pub fn init(&mut self, tier: QualityTier) -> bool {
        if self.tier() == Some(tier) {
            return false;
        }

        let settings = tier.settings();
        let geometries = NodeKind::ALL
            .iter()
            .map(|&kind| {
                let base = base_segments(kind);
                let mesh = uv_sphere(settings.segments(base), settings.segments(base / 2));
                (kind, mesh)
            })
            .collect();
        let material = ParticleMaterial {
            max_particles_per_link: settings.max_particles_per_link,
            size: settings.particle_size(self.base_particle_size),
        };

        self.state = Some(PoolState {
            settings,
            geometries,
            material,
        });
        self.generation += 1;
        debug!(%tier, generation = self.generation, "resource pool rebuilt");
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn tier(&self) -> Option<QualityTier> {
        self.state.as_ref().map(|s| s.settings.tier)
    }

    pub fn settings(&self) -> Option<QualitySettings> {
        self.state.as_ref().map(|s| s.settings)
    }

    /// Number of rebuilds so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cached sphere for a node kind
    pub fn geometry(&self, kind: NodeKind) -> Option<&SphereMesh> {
        self.state.as_ref()?.geometries.get(&kind)
    }

    pub fn particle_material(&self) -> EcoResult<ParticleMaterial> {
        self.state
            .as_ref()
            .map(|s| s.material)
            .ok_or_else(|| EcoError::Configuration("resource pool is not initialized".to_string()))
    }

    /// Build the particle batch for a link, if it should carry one
    ///
    /// Fails with [`EcoError::Configuration`] before [`ResourcePool::init`];
    /// returns `Ok(None)` for zero-value links or when particles are disabled.
    pub fn create_particles<R: Rng + ?Sized>(
        &self,
        request: &ParticleRequest,
        enabled: bool,
        rng: &mut R,
    ) -> EcoResult<Option<ParticleSystem>> {
        let material = self.particle_material()?;
        if !emits_particles(request.value, enabled) {
            return Ok(None);
        }

        let count = particle_count(request.value, material.max_particles_per_link);
        Ok(Some(create_particle_system(
            request.source,
            request.target,
            request.color,
            request.speed,
            count,
            material.size,
            rng,
        )))
    }

    /// Release every cached resource; the pool must be re-initialized before use
    pub fn dispose(&mut self) {
        if self.state.take().is_some() {
            debug!("resource pool disposed");
        }
    }
}
