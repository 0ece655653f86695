//! Particle flow along links
//!
//! Each link with a positive value carries a small batch of particles that
//! stream from source to target. Particles are stored as offsets in [0, 1)
//! along the segment and re-projected every frame from the link's current
//! endpoints, so the flow stays locked to nodes while the layout settles.

use bytemuck::{Pod, Zeroable};
use rand::Rng;

use crate::vector::{add, length, normalize, scale, sub};

/// Offset advanced per frame when a caller has no preference
pub const DEFAULT_PARTICLE_SPEED: f32 = 0.01;

/// Render size of a particle before the quality multiplier
pub const DEFAULT_PARTICLE_SIZE: f32 = 1.5;

/// Particles per unit of link value
const PARTICLES_PER_VALUE: f32 = 2.0;

/// A particle position ready for vertex buffer upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ParticleVertex {
    pub position: [f32; 3],
}

/// Flow metadata attached to a link's particle batch
#[derive(Debug, Clone)]
pub struct ParticleFlow {
    /// Number of particles in the batch
    pub count: usize,
    /// Offset advanced per frame (a small fraction of the segment)
    pub speed: f32,
    /// Unit source -> target direction from the last non-degenerate frame
    pub direction: [f32; 3],
    /// Segment length from the last update
    pub length: f32,
    /// Per-particle offsets in [0, 1)
    pub offsets: Vec<f32>,
}

/// A renderable particle batch plus its flow metadata
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    /// Position buffer, one vertex per particle
    pub vertices: Vec<ParticleVertex>,
    /// RGBA color shared by the batch
    pub color: [f32; 4],
    /// Render size shared by the batch
    pub size: f32,
    pub flow: ParticleFlow,
    dirty: bool,
}

impl ParticleSystem {
    /// Particle positions as raw bytes for upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Whether positions changed since the last upload
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag, returning its previous value
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// Create a particle batch along `source -> target`
///
/// Offsets are drawn uniformly from [0, 1) so the flow looks continuous
/// rather than pulsing; the initial clumping evens out after a few frames.
pub fn create_particle_system<R: Rng + ?Sized>(
    source: [f32; 3],
    target: [f32; 3],
    color: [f32; 4],
    speed: f32,
    count: usize,
    size: f32,
    rng: &mut R,
) -> ParticleSystem {
    let segment = sub(target, source);
    let offsets: Vec<f32> = (0..count).map(|_| rng.random::<f32>()).collect();
    let vertices = offsets
        .iter()
        .map(|&t| ParticleVertex {
            position: add(source, scale(segment, t)),
        })
        .collect();

    ParticleSystem {
        vertices,
        color,
        size,
        flow: ParticleFlow {
            count,
            speed,
            direction: normalize(segment),
            length: length(segment),
            offsets,
        },
        dirty: true,
    }
}

/// Advance a particle batch by one frame
///
/// A zero-length segment (source and target coincide) leaves every position
/// untouched for this frame.
pub fn update_particles(system: &mut ParticleSystem, source: [f32; 3], target: [f32; 3]) {
    let segment = sub(target, source);
    let len = length(segment);
    system.flow.length = len;
    if len == 0.0 {
        return;
    }
    system.flow.direction = scale(segment, 1.0 / len);

    let step = scale(system.flow.direction, len);
    for (offset, vertex) in system.flow.offsets.iter_mut().zip(&mut system.vertices) {
        *offset += system.flow.speed;
        // speed is always well below 1, so one wrap per frame suffices
        if *offset >= 1.0 {
            *offset -= 1.0;
        }
        vertex.position = add(source, scale(step, *offset));
    }
    system.dirty = true;
}

/// Whether a link should carry particles at all
pub fn emits_particles(value: f32, enabled: bool) -> bool {
    enabled && value > 0.0
}

/// Particles for a link: `min(ceil(value * 2), max_particles)`
pub fn particle_count(value: f32, max_particles: usize) -> usize {
    if value <= 0.0 {
        return 0;
    }
    ((value * PARTICLES_PER_VALUE).ceil() as usize).min(max_particles)
}

/// Line opacity for a link, brighter for higher-value flows
pub fn link_opacity(value: f32) -> f32 {
    0.3 + 0.5 * (value / 10.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<ParticleVertex>(), 12);
    }

    #[test]
    fn creates_particles_on_segment() {
        let (source, target) = ([0.0, 0.0, 0.0], [10.0, 0.0, 0.0]);
        let system = create_particle_system(source, target, WHITE, 0.02, 16, 2.0, &mut rng());

        assert_eq!(system.len(), 16);
        assert_eq!(system.flow.count, 16);
        assert_eq!(system.flow.direction, [1.0, 0.0, 0.0]);
        assert_eq!(system.flow.length, 10.0);
        assert!(system.is_dirty());
        for (offset, vertex) in system.flow.offsets.iter().zip(&system.vertices) {
            assert!((0.0..1.0).contains(offset));
            assert!((vertex.position[0] - offset * 10.0).abs() < 1e-5);
            assert_eq!(vertex.position[1], 0.0);
        }
        assert_eq!(system.as_bytes().len(), 16 * 12);
    }

    #[test]
    fn offset_wraps_past_the_end() {
        let (source, target) = ([0.0, 0.0, 0.0], [10.0, 0.0, 0.0]);
        let mut system = create_particle_system(source, target, WHITE, 0.1, 1, 1.0, &mut rng());
        system.flow.offsets[0] = 0.95;

        update_particles(&mut system, source, target);

        assert!((system.flow.offsets[0] - 0.05).abs() < 1e-5);
        assert!((system.vertices[0].position[0] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn offset_landing_on_one_wraps_to_source() {
        let (source, target) = ([2.0, 0.0, 0.0], [10.0, 0.0, 0.0]);
        let mut system = create_particle_system(source, target, WHITE, 0.25, 1, 1.0, &mut rng());
        system.flow.offsets[0] = 0.75;

        update_particles(&mut system, source, target);

        assert_eq!(system.flow.offsets[0], 0.0);
        assert_eq!(system.vertices[0].position, source);
    }

    #[test]
    fn follows_moving_endpoints() {
        let mut system =
            create_particle_system([0.0; 3], [10.0, 0.0, 0.0], WHITE, 0.1, 4, 1.0, &mut rng());
        let (source, target) = ([0.0, 5.0, 0.0], [0.0, 5.0, 20.0]);

        update_particles(&mut system, source, target);

        assert_eq!(system.flow.direction, [0.0, 0.0, 1.0]);
        assert_eq!(system.flow.length, 20.0);
        for (offset, vertex) in system.flow.offsets.iter().zip(&system.vertices) {
            assert_eq!(vertex.position[1], 5.0);
            assert!((vertex.position[2] - offset * 20.0).abs() < 1e-4);
        }
    }

    #[test]
    fn degenerate_segment_leaves_positions() {
        let mut system =
            create_particle_system([0.0; 3], [4.0, 4.0, 4.0], WHITE, 0.05, 8, 1.0, &mut rng());
        system.take_dirty();
        let before = system.vertices.clone();
        let offsets = system.flow.offsets.clone();

        update_particles(&mut system, [3.0, 3.0, 3.0], [3.0, 3.0, 3.0]);

        assert_eq!(system.vertices, before);
        assert_eq!(system.flow.offsets, offsets);
        assert!(!system.is_dirty());
        assert!(system.vertices.iter().all(|v| v.position.iter().all(|c| c.is_finite())));
    }

    #[test]
    fn take_dirty_clears_flag() {
        let mut system = create_particle_system([0.0; 3], [1.0; 3], WHITE, 0.05, 2, 1.0, &mut rng());
        assert!(system.take_dirty());
        assert!(!system.take_dirty());

        update_particles(&mut system, [0.0; 3], [1.0; 3]);
        assert!(system.is_dirty());
    }

    #[test]
    fn count_formula() {
        assert_eq!(particle_count(3.0, 25), 6);
        assert_eq!(particle_count(20.0, 10), 10);
        assert_eq!(particle_count(0.2, 50), 1);
        assert_eq!(particle_count(0.0, 50), 0);
    }

    #[test]
    fn only_positive_enabled_links_emit() {
        assert!(emits_particles(0.5, true));
        assert!(!emits_particles(0.0, true));
        assert!(!emits_particles(5.0, false));
    }

    #[test]
    fn opacity_grows_with_value() {
        assert_eq!(link_opacity(0.0), 0.3);
        assert!(link_opacity(5.0) > link_opacity(1.0));
        assert_eq!(link_opacity(100.0), 0.8);
    }
}
