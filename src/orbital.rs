//! Orbital force: non-root tokens circle their structural parent
//!
//! Each tick, every branch and leaf is nudged toward a point on a tilted
//! circular orbit around its parent. The orbit radius shrinks as the
//! connecting link's value grows, leaves orbit faster than branches, and the
//! per-tick correction is capped so far-away nodes drift in rather than jump.
//!
//! The orbital phase is driven by the simulation-time accumulator carried in
//! [`TickContext`], so orbit positions are a pure function of elapsed
//! simulation time and replay identically across runs.

use std::cell::{Cell, RefCell};
use std::f32::consts::PI;
use std::rc::Rc;

use tracing::debug;

use crate::error::{EcoError, EcoResult};
use crate::model::NodeKind;
use crate::simulation::{Force, SimLink, SimNode, Simulation, TickContext};
use crate::vector::{add, length, sub};

/// Registry slot reserved for the orbital force
pub const ORBITAL_FORCE_NAME: &str = "orbital";

/// Gap kept between parent and child surfaces
pub const ORBIT_BASE_GAP: f32 = 10.0;

/// Extra radius for a link of value <= 1; divided by the value above that
pub const ORBIT_LINK_SPREAD: f32 = 30.0;

/// Maximum per-tick velocity correction (before alpha and strength)
pub const MAX_CORRECTION: f32 = 2.0;

/// Branch angular speed in radians per simulation second
pub const BRANCH_ANGULAR_SPEED: f32 = 0.3;

/// Leaf angular speed in radians per simulation second
pub const LEAF_ANGULAR_SPEED: f32 = 0.6;

/// Orbital-plane tilts (rotation about the x axis), selected by `index % 5`
pub const ORBIT_TILTS: [f32; 5] = [0.0, PI / 6.0, PI / 4.0, PI / 3.0, -PI / 5.0];

/// Phase spacing between consecutive nodes
const GOLDEN_ANGLE: f32 = 2.399_963;

/// Orbit radius for a child around its parent
///
/// Stronger (higher-value) links orbit tighter; the radius never drops below
/// `parent_size + node_size + ORBIT_BASE_GAP`.
pub fn orbit_radius(parent_size: f32, node_size: f32, link_value: f32) -> f32 {
    let adjustment = if link_value > 0.0 {
        ORBIT_LINK_SPREAD / link_value.max(1.0)
    } else {
        ORBIT_LINK_SPREAD
    };
    parent_size + node_size + ORBIT_BASE_GAP + adjustment
}

/// Angular speed for a node kind, scaled by the force strength
pub fn angular_speed(kind: NodeKind, strength: f32) -> f32 {
    let base = match kind {
        NodeKind::Leaf => LEAF_ANGULAR_SPEED,
        NodeKind::Branch | NodeKind::Root => BRANCH_ANGULAR_SPEED,
    };
    base * strength
}

/// Point at `angle` on a circle of `radius` around `center`, tilted about x
pub fn orbit_target(center: [f32; 3], radius: f32, angle: f32, tilt: f32) -> [f32; 3] {
    let (sin_a, cos_a) = angle.sin_cos();
    let (sin_t, cos_t) = tilt.sin_cos();
    add(
        center,
        [
            radius * cos_a,
            -radius * sin_a * sin_t,
            radius * sin_a * cos_t,
        ],
    )
}

/// The parent a node orbits and the value of the link connecting them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    /// Index of the parent node
    pub parent: usize,
    /// Value of the first qualifying link
    pub link_value: f32,
}

/// Derive each node's parent from the link collection
///
/// For a non-root node the parent is the other endpoint of the first link (in
/// collection order) that touches the node and whose other endpoint is a root
/// or branch. Links with unresolved endpoints are ignored. The result is
/// index-aligned with `nodes`.
pub fn find_anchors(nodes: &[SimNode], links: &[SimLink]) -> Vec<Option<Anchor>> {
    let mut anchors = vec![None; nodes.len()];

    for link in links {
        let Some((source, target)) = link.endpoints() else {
            continue;
        };
        if source == target || source >= nodes.len() || target >= nodes.len() {
            continue;
        }

        for (child, parent) in [(source, target), (target, source)] {
            if anchors[child].is_none()
                && nodes[child].kind != NodeKind::Root
                && nodes[parent].kind.is_anchor()
            {
                anchors[child] = Some(Anchor {
                    parent,
                    link_value: link.value,
                });
            }
        }
    }

    anchors
}

/// Shared control state between the installed force and its handle
#[derive(Debug)]
struct OrbitControls {
    strength: Cell<f32>,
    focal_point: RefCell<Option<String>>,
}

/// External control surface for an installed orbital force
#[derive(Debug, Clone)]
pub struct OrbitalForceHandle {
    controls: Rc<OrbitControls>,
}

impl OrbitalForceHandle {
    /// Current strength multiplier
    pub fn strength(&self) -> f32 {
        self.controls.strength.get()
    }

    /// Set the strength multiplier; 0 disables the force, negatives clamp to 0
    pub fn set_strength(&self, strength: f32) {
        self.controls.strength.set(sanitize_strength(strength));
    }

    /// Node the camera and other collaborators currently center on
    pub fn focal_point(&self) -> Option<String> {
        self.controls.focal_point.borrow().clone()
    }

    pub fn set_focal_point(&self, id: impl Into<String>) {
        *self.controls.focal_point.borrow_mut() = Some(id.into());
    }

    pub fn clear_focal_point(&self) {
        *self.controls.focal_point.borrow_mut() = None;
    }
}

fn sanitize_strength(strength: f32) -> f32 {
    if strength.is_finite() { strength.max(0.0) } else { 0.0 }
}

/// Force pulling non-root nodes onto orbits around their parents
pub struct OrbitalForce {
    controls: Rc<OrbitControls>,
    anchors: Vec<Option<Anchor>>,
    bound_topology: Option<u64>,
}

impl OrbitalForce {
    pub fn new(strength: f32) -> Self {
        Self {
            controls: Rc::new(OrbitControls {
                strength: Cell::new(sanitize_strength(strength)),
                focal_point: RefCell::new(None),
            }),
            anchors: Vec::new(),
            bound_topology: None,
        }
    }

    /// Control handle sharing state with this force
    pub fn handle(&self) -> OrbitalForceHandle {
        OrbitalForceHandle {
            controls: Rc::clone(&self.controls),
        }
    }

    /// Parent table from the most recent binding
    pub fn anchors(&self) -> &[Option<Anchor>] {
        &self.anchors
    }

    fn bind(&mut self, nodes: &[SimNode], links: &[SimLink], topology: u64) {
        self.anchors = find_anchors(nodes, links);
        self.bound_topology = Some(topology);
        debug!(
            topology,
            anchored = self.anchors.iter().filter(|a| a.is_some()).count(),
            "orbital anchors rebuilt"
        );
    }
}

impl Force for OrbitalForce {
    fn apply(&mut self, ctx: &TickContext, nodes: &mut [SimNode], links: &[SimLink]) {
        let strength = self.controls.strength.get();
        if strength <= 0.0 {
            return;
        }

        if self.bound_topology != Some(ctx.topology) || self.anchors.len() != nodes.len() {
            self.bind(nodes, links, ctx.topology);
        }

        for index in 0..nodes.len() {
            if nodes[index].kind == NodeKind::Root {
                continue;
            }
            let Some(anchor) = self.anchors[index] else {
                continue;
            };

            let parent = &nodes[anchor.parent];
            let (parent_position, parent_size) = (parent.position(), parent.size);

            let node = &mut nodes[index];
            let radius = orbit_radius(parent_size, node.size, anchor.link_value);
            let angle = ctx.time * angular_speed(node.kind, strength) + index as f32 * GOLDEN_ANGLE;
            let target = orbit_target(parent_position, radius, angle, ORBIT_TILTS[index % 5]);

            let delta = sub(target, node.position());
            let distance = length(delta);
            if distance == 0.0 {
                continue;
            }

            let k = distance.min(MAX_CORRECTION) * ctx.alpha * strength / distance;
            node.vx += delta[0] * k;
            node.vy += delta[1] * k;
            node.vz += delta[2] * k;
        }
    }
}

/// Install the orbital force into a simulation
///
/// Fails with [`EcoError::Configuration`] when no simulation is given or its
/// force registry is no longer available (disposed).
pub fn setup_orbital_physics(
    simulation: Option<&mut Simulation>,
    strength: f32,
) -> EcoResult<OrbitalForceHandle> {
    let simulation = simulation.ok_or_else(|| {
        EcoError::Configuration("orbital physics requires a simulation".to_string())
    })?;
    let registry = simulation.forces().ok_or_else(|| {
        EcoError::Configuration("simulation force registry is unavailable".to_string())
    })?;

    let force = OrbitalForce::new(strength);
    let handle = force.handle();
    registry.insert(ORBITAL_FORCE_NAME, Box::new(force));
    debug!(strength = handle.strength(), "orbital force installed");

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EcosystemGraph, Token, TokenLink};
    use crate::simulation::SimulationConfig;

    fn ctx(alpha: f32, time: f32) -> TickContext {
        TickContext {
            alpha,
            time,
            topology: 1,
        }
    }

    /// root(0) - branch(1) - leaf(2), plus an isolated leaf(3)
    fn system() -> (Vec<SimNode>, Vec<SimLink>) {
        let nodes = vec![
            SimNode::at("root", NodeKind::Root, 10.0, [0.0, 0.0, 0.0]),
            SimNode::at("branch", NodeKind::Branch, 5.0, [40.0, 5.0, -3.0]),
            SimNode::at("leaf", NodeKind::Leaf, 2.0, [300.0, -80.0, 20.0]),
            SimNode::at("stray", NodeKind::Leaf, 2.0, [7.0, 7.0, 7.0]),
        ];
        let links = vec![SimLink::between(0, 1, 3.0), SimLink::between(1, 2, 1.0)];
        (nodes, links)
    }

    #[test]
    fn radius_examples() {
        assert_eq!(orbit_radius(10.0, 2.0, 1.0), 52.0);
        assert_eq!(orbit_radius(10.0, 2.0, 5.0), 28.0);
        assert_eq!(orbit_radius(10.0, 2.0, 0.0), 52.0);
        assert_eq!(orbit_radius(10.0, 2.0, 0.5), 52.0);
    }

    #[test]
    fn radius_is_monotonic_in_link_value() {
        let mut previous = orbit_radius(10.0, 2.0, 0.0);
        for step in 1..100 {
            let r = orbit_radius(10.0, 2.0, step as f32 * 0.25);
            assert!(r <= previous, "radius grew at value {}", step as f32 * 0.25);
            assert!(r > 10.0 + 2.0 + ORBIT_BASE_GAP);
            previous = r;
        }
    }

    #[test]
    fn leaves_orbit_faster_than_branches() {
        assert!(angular_speed(NodeKind::Leaf, 1.0) > angular_speed(NodeKind::Branch, 1.0));
        assert_eq!(angular_speed(NodeKind::Leaf, 0.0), 0.0);
    }

    #[test]
    fn orbit_target_lies_on_circle() {
        let center = [5.0, -2.0, 9.0];
        for (i, tilt) in ORBIT_TILTS.iter().enumerate() {
            let p = orbit_target(center, 30.0, i as f32 * 1.1, *tilt);
            assert!((length(sub(p, center)) - 30.0).abs() < 1e-3);
        }
    }

    #[test]
    fn anchors_follow_first_matching_link() {
        let nodes = vec![
            SimNode::at("a", NodeKind::Branch, 4.0, [0.0; 3]),
            SimNode::at("b", NodeKind::Branch, 4.0, [10.0, 0.0, 0.0]),
            SimNode::at("leaf", NodeKind::Leaf, 1.0, [5.0, 5.0, 0.0]),
            SimNode::at("other", NodeKind::Leaf, 1.0, [5.0, -5.0, 0.0]),
        ];
        let links = vec![
            // leaf-leaf links never anchor
            SimLink::between(2, 3, 9.0),
            SimLink::between(2, 0, 2.0),
            SimLink::between(1, 2, 7.0),
        ];

        let anchors = find_anchors(&nodes, &links);

        assert_eq!(
            anchors[2],
            Some(Anchor {
                parent: 0,
                link_value: 2.0
            })
        );
        assert_eq!(anchors[3], None);
        // Branches linked only to leaves stay unanchored
        assert_eq!(anchors[0], None);
        assert_eq!(anchors[1], None);
    }

    #[test]
    fn unresolved_links_are_ignored() {
        let graph = EcosystemGraph {
            nodes: vec![
                Token::new("r", NodeKind::Root, 5.0),
                Token::new("l", NodeKind::Leaf, 1.0),
            ],
            links: vec![TokenLink::new("r", "l", 1.0)],
        };
        let sim = Simulation::from_graph(&graph, SimulationConfig::default());

        let anchors = find_anchors(&sim.nodes, &sim.links);
        assert_eq!(anchors, vec![None, None]);
    }

    #[test]
    fn zero_strength_is_a_no_op() {
        let (mut nodes, links) = system();
        let before: Vec<[f32; 3]> = nodes.iter().map(SimNode::velocity).collect();

        let mut force = OrbitalForce::new(0.0);
        force.apply(&ctx(1.0, 3.0), &mut nodes, &links);

        let after: Vec<[f32; 3]> = nodes.iter().map(SimNode::velocity).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn roots_are_never_moved() {
        let mut nodes = vec![
            SimNode::at("r1", NodeKind::Root, 10.0, [0.0; 3]),
            SimNode::at("r2", NodeKind::Root, 10.0, [500.0, 0.0, 0.0]),
            SimNode::at("b", NodeKind::Branch, 3.0, [90.0, 10.0, 0.0]),
        ];
        let links = vec![
            SimLink::between(0, 1, 4.0),
            SimLink::between(2, 0, 1.0),
            SimLink::between(1, 2, 1.0),
        ];

        let mut force = OrbitalForce::new(1.0);
        for tick in 0..20 {
            force.apply(&ctx(1.0, tick as f32 * 0.1), &mut nodes, &links);
        }

        assert_eq!(nodes[0].velocity(), [0.0, 0.0, 0.0]);
        assert_eq!(nodes[1].velocity(), [0.0, 0.0, 0.0]);
        assert_ne!(nodes[2].velocity(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn correction_is_capped() {
        let (mut nodes, links) = system();
        let (alpha, strength) = (0.7, 1.5);

        let mut force = OrbitalForce::new(strength);
        force.apply(&ctx(alpha, 0.0), &mut nodes, &links);

        // The leaf starts hundreds of units away from its orbit
        let applied = length(nodes[2].velocity());
        let cap = MAX_CORRECTION * alpha * strength;
        assert!(applied <= cap + 1e-4, "applied {applied} exceeds cap {cap}");
        assert!((applied - cap).abs() < 1e-3);
    }

    #[test]
    fn unanchored_nodes_are_untouched() {
        let (mut nodes, links) = system();

        let mut force = OrbitalForce::new(1.0);
        force.apply(&ctx(1.0, 0.5), &mut nodes, &links);

        assert_eq!(nodes[3].velocity(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn node_on_target_gets_no_force() {
        let mut nodes = vec![
            SimNode::at("root", NodeKind::Root, 10.0, [0.0; 3]),
            SimNode::at("branch", NodeKind::Branch, 2.0, [0.0; 3]),
        ];
        let links = vec![SimLink::between(0, 1, 1.0)];
        let time = 0.0;
        let angle = time * angular_speed(NodeKind::Branch, 1.0) + GOLDEN_ANGLE;
        let target = orbit_target([0.0; 3], orbit_radius(10.0, 2.0, 1.0), angle, ORBIT_TILTS[1]);
        (nodes[1].x, nodes[1].y, nodes[1].z) = (target[0], target[1], target[2]);

        let mut force = OrbitalForce::new(1.0);
        force.apply(&ctx(1.0, time), &mut nodes, &links);

        let v = length(nodes[1].velocity());
        assert!(v < 1e-4 && v.is_finite());
    }

    #[test]
    fn anchors_rebind_on_topology_change() {
        let (mut nodes, mut links) = system();
        let mut force = OrbitalForce::new(1.0);
        force.apply(&ctx(1.0, 0.0), &mut nodes, &links);
        assert!(force.anchors()[3].is_none());

        links.push(SimLink::between(0, 3, 1.0));
        // Same topology version: cached table is reused
        force.apply(&ctx(1.0, 0.0), &mut nodes, &links);
        assert!(force.anchors()[3].is_none());

        let changed = TickContext {
            alpha: 1.0,
            time: 0.0,
            topology: 2,
        };
        force.apply(&changed, &mut nodes, &links);
        assert_eq!(force.anchors()[3].map(|a| a.parent), Some(0));
    }

    #[test]
    fn orbit_replays_identically() {
        let graph = EcosystemGraph::sample(1, 3, 3);
        let run = || {
            let mut sim = Simulation::from_graph(&graph, SimulationConfig::default());
            setup_orbital_physics(Some(&mut sim), 1.0).unwrap();
            sim.run_to_convergence(120);
            sim.nodes.iter().map(SimNode::position).collect::<Vec<_>>()
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn setup_installs_force_and_handle_controls_it() {
        let graph = EcosystemGraph::sample(1, 2, 2);
        let mut sim = Simulation::from_graph(&graph, SimulationConfig::default());

        let handle = setup_orbital_physics(Some(&mut sim), 0.8).unwrap();

        assert!(sim.has_force(ORBITAL_FORCE_NAME));
        assert_eq!(handle.strength(), 0.8);
        handle.set_strength(-3.0);
        assert_eq!(handle.strength(), 0.0);
        handle.set_strength(1.2);
        assert_eq!(handle.strength(), 1.2);

        assert_eq!(handle.focal_point(), None);
        handle.set_focal_point("root-0");
        assert_eq!(handle.focal_point().as_deref(), Some("root-0"));
        handle.clear_focal_point();
        assert_eq!(handle.focal_point(), None);
    }

    #[test]
    fn setup_without_simulation_fails() {
        let err = setup_orbital_physics(None, 1.0).unwrap_err();
        assert!(matches!(err, EcoError::Configuration(_)));
    }

    #[test]
    fn setup_on_disposed_simulation_fails() {
        let mut sim = Simulation::from_graph(&EcosystemGraph::sample(1, 1, 1), SimulationConfig::default());
        sim.dispose();

        let err = setup_orbital_physics(Some(&mut sim), 1.0).unwrap_err();
        assert!(err.to_string().contains("registry is unavailable"));
    }

    #[test]
    fn children_settle_near_their_orbit() {
        let graph = EcosystemGraph {
            nodes: vec![
                Token::new("sun", NodeKind::Root, 10.0),
                Token::new("planet", NodeKind::Branch, 2.0),
            ],
            links: vec![TokenLink::new("sun", "planet", 1.0)],
        };
        let config = SimulationConfig {
            charge: 0.0,
            link_strength: 0.0,
            center_strength: 0.0,
            alpha_target: 0.3,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::from_graph(&graph, config);
        setup_orbital_physics(Some(&mut sim), 1.0).unwrap();

        let start = length(sub(sim.nodes[1].position(), sim.nodes[0].position()));
        for _ in 0..600 {
            sim.tick();
        }
        let end = length(sub(sim.nodes[1].position(), sim.nodes[0].position()));

        let radius = orbit_radius(10.0, 2.0, 1.0);
        assert!((end - radius).abs() < (start - radius).abs());
    }
}
