//! 3D force simulation hosting the ecosystem layout
//!
//! A d3-force style simulation: a named registry of forces is applied once
//! per tick, velocities decay, positions integrate and alpha cools toward
//! `alpha_target`. The orbital force plugs into the same registry as the
//! standard many-body, link and center forces.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{EcosystemGraph, NodeKind, Token, TokenLink, colors};

/// A node with 3D position and velocity for simulation
#[derive(Debug, Clone)]
pub struct SimNode {
    /// Token id
    pub id: String,
    /// Human-readable label for display
    pub label: String,
    /// Hierarchy level
    pub kind: NodeKind,
    /// Token size (render radius and orbit spacing)
    pub size: f32,
    /// Position in 3D space
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Velocity
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    /// RGBA color
    pub color: [f32; 4],
}

impl SimNode {
    /// Create from a token with initial position on a sphere
    pub fn from_token(token: &Token, index: usize, total: usize) -> Self {
        let [x, y, z] = fibonacci_sphere(index, total, 100.0);

        Self {
            id: token.id.clone(),
            label: token.label().to_string(),
            kind: token.kind,
            size: token.size,
            x,
            y,
            z,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            color: token.display_color(),
        }
    }

    /// Create a bare node at the given position (mostly for tests and tools)
    pub fn at(id: impl Into<String>, kind: NodeKind, size: f32, position: [f32; 3]) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            kind,
            size,
            x: position[0],
            y: position[1],
            z: position[2],
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            color: kind.color(),
        }
    }

    pub fn position(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn velocity(&self) -> [f32; 3] {
        [self.vx, self.vy, self.vz]
    }
}

/// Distribute points on a sphere using a Fibonacci lattice
fn fibonacci_sphere(index: usize, total: usize, radius: f32) -> [f32; 3] {
    let golden_ratio = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let i = index as f32;
    let n = total.max(1) as f32;

    let theta = 2.0 * std::f32::consts::PI * i / golden_ratio;
    let phi = (1.0 - 2.0 * (i + 0.5) / n).clamp(-1.0, 1.0).acos();

    [
        radius * phi.sin() * theta.cos(),
        radius * phi.sin() * theta.sin(),
        radius * phi.cos(),
    ]
}

/// One end of a link: either still an id, or resolved to a live node
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEnd {
    /// Unresolved token id
    Id(String),
    /// Index into the simulation's node collection
    Node(usize),
}

impl LinkEnd {
    /// Node index if this end has been resolved
    pub fn index(&self) -> Option<usize> {
        match self {
            LinkEnd::Node(i) => Some(*i),
            LinkEnd::Id(_) => None,
        }
    }
}

/// A value-flow link in the simulation
#[derive(Debug, Clone)]
pub struct SimLink {
    pub source: LinkEnd,
    pub target: LinkEnd,
    /// Flow value (orbit tightening, particle count, opacity)
    pub value: f32,
    /// RGBA color
    pub color: [f32; 4],
}

impl SimLink {
    /// Create an unresolved link from a model link
    pub fn from_token_link(link: &TokenLink) -> Self {
        Self {
            source: LinkEnd::Id(link.source.clone()),
            target: LinkEnd::Id(link.target.clone()),
            value: link.value,
            color: link.color.unwrap_or(colors::LINK),
        }
    }

    /// Create a link whose endpoints are already resolved
    pub fn between(source: usize, target: usize, value: f32) -> Self {
        Self {
            source: LinkEnd::Node(source),
            target: LinkEnd::Node(target),
            value,
            color: colors::LINK,
        }
    }

    /// Both endpoint indices, if the link is fully resolved
    pub fn endpoints(&self) -> Option<(usize, usize)> {
        Some((self.source.index()?, self.target.index()?))
    }
}

/// Per-tick state handed to every force
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    /// Current alpha (simulation temperature)
    pub alpha: f32,
    /// Elapsed simulation time in seconds
    pub time: f32,
    /// Topology version; changes whenever nodes or links are replaced or resolved
    pub topology: u64,
}

/// A force term applied once per simulation tick
pub trait Force {
    /// Adjust node velocities in place
    ///
    /// `nodes` and `links` are the simulation's current collections; they are
    /// supplied on every call and must not be cached across calls.
    fn apply(&mut self, ctx: &TickContext, nodes: &mut [SimNode], links: &[SimLink]);
}

/// Named forces, applied in insertion order
#[derive(Default)]
pub struct ForceRegistry {
    entries: Vec<(String, Box<dyn Force>)>,
}

impl ForceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a force, replacing any existing force with the same name in place
    pub fn insert(&mut self, name: &str, force: Box<dyn Force>) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = force;
        } else {
            self.entries.push((name.to_string(), force));
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Force>> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Registered force names, in application order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    fn apply_all(&mut self, ctx: &TickContext, nodes: &mut [SimNode], links: &[SimLink]) {
        for (_, force) in &mut self.entries {
            force.apply(ctx, nodes, links);
        }
    }
}

/// Configuration for the 3D force simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Repulsion strength (negative = repulsion)
    pub charge: f32,
    /// Link distance (rest length)
    pub link_distance: f32,
    /// Link strength
    pub link_strength: f32,
    /// Center force strength
    pub center_strength: f32,
    /// Velocity multiplier applied each tick (friction)
    pub velocity_decay: f32,
    /// Current alpha (simulation temperature)
    pub alpha: f32,
    /// Minimum alpha before stopping
    pub alpha_min: f32,
    /// Alpha decay rate
    pub alpha_decay: f32,
    /// Alpha settles toward this value; above `alpha_min` the layout keeps moving
    pub alpha_target: f32,
    /// Simulation seconds advanced per tick
    pub tick_seconds: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            charge: -50.0,
            link_distance: 60.0,
            link_strength: 0.3,
            center_strength: 0.08,
            velocity_decay: 0.6,
            alpha: 1.0,
            alpha_min: 0.001,
            alpha_decay: 1.0 - 0.001_f32.powf(1.0 / 300.0),
            alpha_target: 0.0,
            tick_seconds: 1.0 / 60.0,
        }
    }
}

/// 3D CPU force simulation
pub struct Simulation {
    pub nodes: Vec<SimNode>,
    pub links: Vec<SimLink>,
    pub config: SimulationConfig,
    /// `None` once the simulation has been disposed
    registry: Option<ForceRegistry>,
    /// Mapping from node ID to index
    node_id_to_index: HashMap<String, usize>,
    time: f32,
    ticks: u64,
    topology: u64,
    paused: bool,
}

impl Simulation {
    /// Create simulation from graph data with the standard forces installed
    pub fn from_graph(graph: &EcosystemGraph, config: SimulationConfig) -> Self {
        let mut registry = ForceRegistry::new();
        registry.insert(
            "charge",
            Box::new(ManyBodyForce {
                strength: config.charge,
            }),
        );
        registry.insert(
            "link",
            Box::new(LinkForce {
                distance: config.link_distance,
                strength: config.link_strength,
            }),
        );
        registry.insert(
            "center",
            Box::new(CenterForce {
                strength: config.center_strength,
            }),
        );

        let mut sim = Self {
            nodes: Vec::new(),
            links: Vec::new(),
            config,
            registry: Some(registry),
            node_id_to_index: HashMap::new(),
            time: 0.0,
            ticks: 0,
            topology: 0,
            paused: false,
        };
        sim.load(graph);
        sim
    }

    fn load(&mut self, graph: &EcosystemGraph) {
        let total = graph.nodes.len();
        let previous: HashMap<String, [f32; 6]> = self
            .nodes
            .iter()
            .map(|n| (n.id.clone(), [n.x, n.y, n.z, n.vx, n.vy, n.vz]))
            .collect();

        self.nodes = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(i, token)| {
                let mut node = SimNode::from_token(token, i, total);
                // Keep nodes that survive a data change where they were
                if let Some(&[x, y, z, vx, vy, vz]) = previous.get(&token.id) {
                    (node.x, node.y, node.z) = (x, y, z);
                    (node.vx, node.vy, node.vz) = (vx, vy, vz);
                }
                node
            })
            .collect();
        self.node_id_to_index = index_by_id(&self.nodes);
        self.links = graph.links.iter().map(SimLink::from_token_link).collect();
        self.topology += 1;
    }

    /// Replace nodes and links, keeping positions of surviving nodes, and reheat
    pub fn replace_data(&mut self, graph: &EcosystemGraph) {
        self.load(graph);
        self.config.alpha = 1.0;
        debug!(
            nodes = self.nodes.len(),
            links = self.links.len(),
            topology = self.topology,
            "simulation data replaced"
        );
    }

    /// Look up a force registry entry; `None` once disposed
    pub fn forces(&mut self) -> Option<&mut ForceRegistry> {
        self.registry.as_mut()
    }

    /// Install (or replace) a named force
    ///
    /// Returns `false` when the simulation has been disposed.
    pub fn set_force(&mut self, name: &str, force: Box<dyn Force>) -> bool {
        match self.registry.as_mut() {
            Some(registry) => {
                registry.insert(name, force);
                true
            }
            None => false,
        }
    }

    pub fn has_force(&self, name: &str) -> bool {
        self.registry.as_ref().is_some_and(|r| r.contains(name))
    }

    pub fn remove_force(&mut self, name: &str) -> Option<Box<dyn Force>> {
        self.registry.as_mut()?.remove(name)
    }

    /// Index of the node with the given id
    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.node_id_to_index.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&SimNode> {
        self.node_index(id).map(|i| &self.nodes[i])
    }

    /// Elapsed simulation time in seconds
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn topology_version(&self) -> u64 {
        self.topology
    }

    /// Check if simulation is still running
    pub fn is_running(&self) -> bool {
        !self.paused && self.registry.is_some() && self.config.alpha > self.config.alpha_min
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Raise alpha so the layout starts moving again
    pub fn reheat(&mut self, alpha: f32) {
        self.config.alpha = alpha;
    }

    /// Resolve id endpoints to node indices
    ///
    /// Returns true if any endpoint changed.
    fn resolve_links(&mut self) -> bool {
        let mut changed = false;
        for link in &mut self.links {
            for end in [&mut link.source, &mut link.target] {
                if let LinkEnd::Id(id) = end {
                    if let Some(&index) = self.node_id_to_index.get(id.as_str()) {
                        *end = LinkEnd::Node(index);
                        changed = true;
                    }
                }
            }
        }
        changed
    }

    /// Run one simulation tick
    pub fn tick(&mut self) {
        if !self.is_running() {
            return;
        }

        if self.resolve_links() {
            self.topology += 1;
        }

        let ctx = TickContext {
            alpha: self.config.alpha,
            time: self.time,
            topology: self.topology,
        };

        if let Some(registry) = self.registry.as_mut() {
            registry.apply_all(&ctx, &mut self.nodes, &self.links);
        }

        // Apply velocity and decay
        for node in &mut self.nodes {
            node.vx *= self.config.velocity_decay;
            node.vy *= self.config.velocity_decay;
            node.vz *= self.config.velocity_decay;
            node.x += node.vx;
            node.y += node.vy;
            node.z += node.vz;
        }

        self.time += self.config.tick_seconds;
        self.ticks += 1;

        // Decay alpha
        self.config.alpha += (self.config.alpha_target - self.config.alpha) * self.config.alpha_decay;
    }

    /// Run simulation to convergence (or max iterations)
    pub fn run_to_convergence(&mut self, max_iterations: usize) {
        for _ in 0..max_iterations {
            if !self.is_running() {
                break;
            }
            self.tick();
        }
    }

    /// Tear down: forces are released and the node/link collections emptied
    pub fn dispose(&mut self) {
        self.registry = None;
        self.nodes.clear();
        self.links.clear();
        self.node_id_to_index.clear();
        self.topology += 1;
    }
}

fn index_by_id(nodes: &[SimNode]) -> HashMap<String, usize> {
    nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.clone(), i))
        .collect()
}

// =============================================================================
// Standard forces
// =============================================================================

/// Repulsion between all node pairs (Coulomb's law)
pub struct ManyBodyForce {
    /// Negative = repulsion
    pub strength: f32,
}

impl Force for ManyBodyForce {
    fn apply(&mut self, ctx: &TickContext, nodes: &mut [SimNode], _links: &[SimLink]) {
        let n = nodes.len();

        for i in 0..n {
            for j in (i + 1)..n {
                let dx = nodes[j].x - nodes[i].x;
                let dy = nodes[j].y - nodes[i].y;
                let dz = nodes[j].z - nodes[i].z;

                let dist_sq = (dx * dx + dy * dy + dz * dz).max(1.0);
                let dist = dist_sq.sqrt();

                // F = k * q1 * q2 / r^2
                let force = self.strength * ctx.alpha / dist_sq;

                let fx = force * dx / dist;
                let fy = force * dy / dist;
                let fz = force * dz / dist;

                nodes[i].vx += fx;
                nodes[i].vy += fy;
                nodes[i].vz += fz;
                nodes[j].vx -= fx;
                nodes[j].vy -= fy;
                nodes[j].vz -= fz;
            }
        }
    }
}

/// Spring force between linked nodes (Hooke's law)
pub struct LinkForce {
    /// Rest length
    pub distance: f32,
    pub strength: f32,
}

impl Force for LinkForce {
    fn apply(&mut self, ctx: &TickContext, nodes: &mut [SimNode], links: &[SimLink]) {
        for link in links {
            let Some((source, target)) = link.endpoints() else {
                continue;
            };
            if source == target || source >= nodes.len() || target >= nodes.len() {
                continue;
            }

            let dx = nodes[target].x - nodes[source].x;
            let dy = nodes[target].y - nodes[source].y;
            let dz = nodes[target].z - nodes[source].z;

            let dist = (dx * dx + dy * dy + dz * dz).sqrt().max(1.0);

            // F = k * (x - x0), split evenly between both ends
            let stretch = dist - self.distance;
            let force = 0.5 * self.strength * ctx.alpha * stretch / dist;

            let fx = force * dx;
            let fy = force * dy;
            let fz = force * dz;

            nodes[source].vx += fx;
            nodes[source].vy += fy;
            nodes[source].vz += fz;
            nodes[target].vx -= fx;
            nodes[target].vy -= fy;
            nodes[target].vz -= fz;
        }
    }
}

/// Gravity toward the origin
pub struct CenterForce {
    pub strength: f32,
}

impl Force for CenterForce {
    fn apply(&mut self, ctx: &TickContext, nodes: &mut [SimNode], _links: &[SimLink]) {
        let k = self.strength * ctx.alpha;
        for node in nodes {
            node.vx -= node.x * k;
            node.vy -= node.y * k;
            node.vz -= node.z * k;
        }
    }
}
