//! Renderable objects for nodes and links
//!
//! The scene mirrors the simulation: one node object per token, one link
//! object per link. Link objects own their particle batch, so rebuilding
//! the scene after a quality change drops the old batches with it.

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::error::EcoResult;
use crate::model::NodeKind;
use crate::particles::{ParticleSystem, link_opacity, update_particles};
use crate::resources::{ParticleRequest, ResourcePool};
use crate::simulation::{LinkEnd, SimNode, Simulation};

/// Particle display options for a scene build
#[derive(Debug, Clone, Copy)]
pub struct ParticleOptions {
    pub enabled: bool,
    /// Offset advanced per frame
    pub speed: f32,
}

/// A token sphere
#[derive(Debug, Clone)]
pub struct NodeObject {
    /// Index into the simulation's nodes
    pub node: usize,
    pub kind: NodeKind,
    pub position: [f32; 3],
    pub radius: f32,
    pub color: [f32; 4],
    /// Sphere resolution from the resource pool
    pub segments: u32,
}

/// A link line and its optional particle flow
#[derive(Debug)]
pub struct LinkObject {
    /// Index into the simulation's links
    pub link: usize,
    pub source_node: usize,
    pub target_node: usize,
    /// Line endpoints as of the last update
    pub source: [f32; 3],
    pub target: [f32; 3],
    pub color: [f32; 4],
    pub opacity: f32,
    pub particles: Option<ParticleSystem>,
}

/// Totals reported in view snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParticleTotals {
    /// Links carrying a particle batch
    pub systems: usize,
    /// Particles across every batch
    pub particles: usize,
}

/// Everything the renderer draws for one ecosystem
#[derive(Debug, Default)]
pub struct Scene {
    pub nodes: Vec<NodeObject>,
    pub links: Vec<LinkObject>,
}

impl Scene {
    /// Build node and link objects from the simulation's current state
    ///
    /// Fails if the pool has not been initialized.
    pub fn build<R: Rng + ?Sized>(
        simulation: &Simulation,
        pool: &ResourcePool,
        options: ParticleOptions,
        rng: &mut R,
    ) -> EcoResult<Self> {
        let material = pool.particle_material()?;

        let nodes = simulation
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| NodeObject {
                node: i,
                kind: node.kind,
                position: node.position(),
                radius: node.size,
                color: node.color,
                segments: pool.geometry(node.kind).map_or(0, |g| g.width_segments),
            })
            .collect();

        let resolve = |end: &LinkEnd| match end {
            LinkEnd::Node(i) => Some(*i),
            LinkEnd::Id(id) => simulation.node_index(id),
        };

        let mut links = Vec::with_capacity(simulation.links.len());
        for (i, link) in simulation.links.iter().enumerate() {
            let (Some(s), Some(t)) = (resolve(&link.source), resolve(&link.target)) else {
                continue;
            };
            let source = simulation.nodes[s].position();
            let target = simulation.nodes[t].position();
            let request = ParticleRequest {
                source,
                target,
                color: link.color,
                speed: options.speed,
                value: link.value,
            };
            links.push(LinkObject {
                link: i,
                source_node: s,
                target_node: t,
                source,
                target,
                color: link.color,
                opacity: link_opacity(link.value),
                particles: pool.create_particles(&request, options.enabled, rng)?,
            });
        }

        debug!(
            nodes = simulation.nodes.len(),
            links = links.len(),
            particle_size = material.size,
            "scene built"
        );
        Ok(Self { nodes, links })
    }

    /// Copy current node positions onto the spheres
    pub fn sync_nodes(&mut self, nodes: &[SimNode]) {
        for object in &mut self.nodes {
            if let Some(node) = nodes.get(object.node) {
                object.position = node.position();
            }
        }
    }

    pub fn particle_totals(&self) -> ParticleTotals {
        let systems = self.links.iter().filter_map(|l| l.particles.as_ref());
        ParticleTotals {
            systems: systems.clone().count(),
            particles: systems.map(|p| p.len()).sum(),
        }
    }
}

/// Advance every link object one frame
///
/// Line endpoints follow the nodes, and links carrying particles move their
/// flow along the refreshed segment.
pub fn update_link_objects(scene: &mut Scene, nodes: &[SimNode]) {
    for object in &mut scene.links {
        let (Some(source), Some(target)) = (nodes.get(object.source_node), nodes.get(object.target_node))
        else {
            continue;
        };
        object.source = source.position();
        object.target = target.position();
        if let Some(particles) = object.particles.as_mut() {
            update_particles(particles, object.source, object.target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EcosystemGraph;
    use crate::quality::QualityTier;
    use crate::simulation::SimulationConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const OPTIONS: ParticleOptions = ParticleOptions {
        enabled: true,
        speed: 0.01,
    };

    fn setup(tier: QualityTier) -> (Simulation, ResourcePool) {
        let graph = EcosystemGraph::sample(1, 2, 3);
        let sim = Simulation::from_graph(&graph, SimulationConfig::default());
        let mut pool = ResourcePool::new(1.5);
        pool.init(tier);
        (sim, pool)
    }

    #[test]
    fn build_requires_initialized_pool() {
        let (sim, _) = setup(QualityTier::High);
        let pool = ResourcePool::new(1.5);
        let result = Scene::build(&sim, &pool, OPTIONS, &mut StdRng::seed_from_u64(1));
        assert!(result.is_err());
    }

    #[test]
    fn build_resolves_unticked_links() {
        let (sim, pool) = setup(QualityTier::High);
        let scene = Scene::build(&sim, &pool, OPTIONS, &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(scene.nodes.len(), sim.nodes.len());
        assert_eq!(scene.links.len(), sim.links.len());
        let root = &scene.nodes[0];
        assert_eq!(root.kind, NodeKind::Root);
        assert_eq!(root.segments, 32);
    }

    #[test]
    fn zero_value_links_carry_no_particles() {
        let (sim, pool) = setup(QualityTier::High);
        let scene = Scene::build(&sim, &pool, OPTIONS, &mut StdRng::seed_from_u64(1)).unwrap();

        for object in &scene.links {
            let value = sim.links[object.link].value;
            assert_eq!(object.particles.is_some(), value > 0.0, "link {}", object.link);
        }
    }

    #[test]
    fn disabled_particles_build_lines_only() {
        let (sim, pool) = setup(QualityTier::High);
        let options = ParticleOptions {
            enabled: false,
            ..OPTIONS
        };
        let scene = Scene::build(&sim, &pool, options, &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(scene.particle_totals().systems, 0);
        assert!(!scene.links.is_empty());
    }

    #[test]
    fn update_follows_moved_nodes() {
        let (mut sim, pool) = setup(QualityTier::Medium);
        let mut scene = Scene::build(&sim, &pool, OPTIONS, &mut StdRng::seed_from_u64(1)).unwrap();

        for node in &mut sim.nodes {
            node.x += 5.0;
        }
        update_link_objects(&mut scene, &sim.nodes);

        for object in &scene.links {
            assert_eq!(object.source, sim.nodes[object.source_node].position());
            assert_eq!(object.target, sim.nodes[object.target_node].position());
            if let Some(particles) = &object.particles {
                assert!(particles.is_dirty());
            }
        }
    }

    #[test]
    fn totals_count_particles() {
        let (sim, pool) = setup(QualityTier::Low);
        let scene = Scene::build(&sim, &pool, OPTIONS, &mut StdRng::seed_from_u64(1)).unwrap();
        let totals = scene.particle_totals();

        let expected: usize = scene
            .links
            .iter()
            .filter_map(|l| l.particles.as_ref())
            .map(|p| p.len())
            .sum();
        assert_eq!(totals.particles, expected);
        assert!(totals.systems > 0);
    }
}
