//! The ecosystem view: simulation, scene and adaptive quality wired together
//!
//! A view owns a frame scheduler with two loops while mounted: the
//! animation loop (physics tick, link and particle update, camera easing)
//! and the performance monitor. FPS reports are queued by the monitor and
//! applied after each frame, so a tier change never rebuilds the scene
//! while the animation loop is holding it.

use std::cell::RefCell;
use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, info};

use crate::camera::Camera3D;
use crate::config::ViewConfig;
use crate::error::{EcoError, EcoResult};
use crate::model::{EcosystemGraph, NodeKind};
use crate::orbital::{OrbitalForceHandle, setup_orbital_physics};
use crate::performance::PerformanceMonitor;
use crate::quality::{QualityController, QualityTier};
use crate::resources::ResourcePool;
use crate::scene::{ParticleOptions, ParticleTotals, Scene, update_link_objects};
use crate::scheduler::{FrameScheduler, LoopControl, LoopHandle};
use crate::simulation::Simulation;

/// Position of one token in a snapshot
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub kind: NodeKind,
    pub position: [f32; 3],
}

/// Serializable state of a view after some number of frames
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    /// Animation frames rendered
    pub frames: u64,
    /// Simulation ticks run
    pub ticks: u64,
    /// Elapsed simulation time in seconds
    pub simulation_time: f32,
    pub alpha: f32,
    pub fps: u32,
    pub tier: QualityTier,
    pub orbital_strength: f32,
    pub focal_point: Option<String>,
    pub particles: ParticleTotals,
    pub nodes: Vec<NodeSnapshot>,
}

struct ViewState {
    simulation: Simulation,
    scene: Scene,
    camera: Camera3D,
    pool: ResourcePool,
    rng: StdRng,
    options: ParticleOptions,
    frames: u64,
}

impl ViewState {
    /// One animation frame
    fn advance(&mut self, focal_point: Option<String>) {
        let Self {
            simulation,
            scene,
            camera,
            ..
        } = self;

        simulation.tick();
        update_link_objects(scene, &simulation.nodes);
        scene.sync_nodes(&simulation.nodes);
        if let Some(node) = focal_point.as_deref().and_then(|id| simulation.node(id)) {
            camera.follow(node.position());
        }
        camera.update_animation();
        self.frames += 1;
    }

    /// Re-initialize the pool for `tier` and rebuild the scene if it changed
    fn apply_tier(&mut self, tier: QualityTier) -> EcoResult<bool> {
        if !self.pool.init(tier) {
            return Ok(false);
        }
        self.scene = Scene::build(&self.simulation, &self.pool, self.options, &mut self.rng)?;
        Ok(true)
    }
}

/// An ecosystem graph rendered with orbital physics and adaptive quality
pub struct EcosystemView {
    config: ViewConfig,
    scheduler: FrameScheduler,
    state: Rc<RefCell<ViewState>>,
    orbital: OrbitalForceHandle,
    monitor: PerformanceMonitor,
    quality: QualityController,
    fps_reports: Rc<RefCell<Vec<u32>>>,
    animation: Option<LoopHandle>,
    mounted: bool,
    visible: bool,
}

impl EcosystemView {
    /// Validate the graph and build the simulation, orbital force and scene
    pub fn new(graph: &EcosystemGraph, config: ViewConfig) -> EcoResult<Self> {
        Self::with_monitor(graph, config, PerformanceMonitor::new())
    }

    /// Like [`EcosystemView::new`] with a caller-supplied monitor
    pub fn with_monitor(
        graph: &EcosystemGraph,
        config: ViewConfig,
        monitor: PerformanceMonitor,
    ) -> EcoResult<Self> {
        config.validate()?;
        graph.validate()?;

        let mut simulation = Simulation::from_graph(graph, config.simulation.clone());
        let orbital = setup_orbital_physics(Some(&mut simulation), config.orbital_strength)?;

        let mut pool = ResourcePool::new(config.base_particle_size);
        pool.init(config.initial_tier);

        let mut rng = StdRng::seed_from_u64(config.seed);
        let options = ParticleOptions {
            enabled: config.particles_enabled,
            speed: config.particle_speed,
        };
        let scene = Scene::build(&simulation, &pool, options, &mut rng)?;

        let quality = if config.adaptive_quality {
            QualityController::new(config.initial_tier)
        } else {
            QualityController::fixed(config.initial_tier)
        };

        debug!(
            nodes = simulation.nodes.len(),
            links = simulation.links.len(),
            tier = %config.initial_tier,
            "ecosystem view created"
        );

        Ok(Self {
            config,
            scheduler: FrameScheduler::new(),
            state: Rc::new(RefCell::new(ViewState {
                simulation,
                scene,
                camera: Camera3D::new(),
                pool,
                rng,
                options,
                frames: 0,
            })),
            orbital,
            monitor,
            quality,
            fps_reports: Rc::new(RefCell::new(Vec::new())),
            animation: None,
            mounted: false,
            visible: true,
        })
    }

    /// Start the animation loop and performance monitoring
    ///
    /// Mounting again after [`EcosystemView::unmount`] re-initializes the
    /// resource pool at the current tier.
    pub fn mount(&mut self) -> EcoResult<()> {
        if self.mounted {
            return Ok(());
        }

        {
            let mut state = self.state.borrow_mut();
            if !state.pool.is_initialized() {
                state.apply_tier(self.quality.current())?;
            }
        }

        self.mounted = true;
        if self.visible {
            self.start_loops();
        }
        info!(tier = %self.quality.current(), "ecosystem view mounted");
        Ok(())
    }

    /// Cancel every loop and release rendering resources
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.stop_loops();
        self.fps_reports.borrow_mut().clear();

        let mut state = self.state.borrow_mut();
        state.pool.dispose();
        state.scene = Scene::default();
        self.mounted = false;
        info!("ecosystem view unmounted");
    }

    /// Pause everything while hidden and resume when shown again
    pub fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;

        if visible {
            self.state.borrow_mut().simulation.resume();
            if self.mounted {
                self.start_loops();
            }
        } else {
            self.stop_loops();
            self.state.borrow_mut().simulation.pause();
        }
        debug!(visible, "visibility changed");
    }

    fn start_loops(&mut self) {
        let state = Rc::clone(&self.state);
        let orbital = self.orbital.clone();
        self.animation = Some(self.scheduler.schedule("animation", move |_| {
            state.borrow_mut().advance(orbital.focal_point());
            LoopControl::Continue
        }));

        let reports = Rc::clone(&self.fps_reports);
        self.monitor.start_monitoring(
            &mut self.scheduler,
            move |fps| reports.borrow_mut().push(fps),
            self.config.monitor_interval_ms,
        );
    }

    fn stop_loops(&mut self) {
        if let Some(handle) = self.animation.take() {
            self.scheduler.cancel(handle);
        }
        self.monitor.stop_monitoring(&mut self.scheduler);
    }

    /// Run one scheduler turn, then apply queued FPS reports
    pub fn frame(&mut self, now_ms: f64) -> EcoResult<()> {
        self.scheduler.run_frame(now_ms);

        let reports: Vec<u32> = self.fps_reports.borrow_mut().drain(..).collect();
        for fps in reports {
            if let Some(tier) = self.quality.on_fps(fps) {
                let rebuilt = self.state.borrow_mut().apply_tier(tier)?;
                if rebuilt {
                    debug!(%tier, "scene rebuilt for new quality tier");
                }
            }
        }
        Ok(())
    }

    /// Run `frames` frames spaced `frame_ms` apart, continuing from the last one
    pub fn run_frames(&mut self, frames: usize, frame_ms: f64) -> EcoResult<()> {
        let mut now = self.scheduler.now();
        for _ in 0..frames {
            now += frame_ms;
            self.frame(now)?;
        }
        Ok(())
    }

    /// Center the camera on a token and let it follow
    pub fn set_focal_point(&mut self, id: &str) -> EcoResult<()> {
        let mut state = self.state.borrow_mut();
        let node = state
            .simulation
            .node(id)
            .ok_or_else(|| EcoError::Validation(format!("unknown token '{id}'")))?;
        let (position, size) = (node.position(), node.size);

        state.camera.focus_on(position, size);
        self.orbital.set_focal_point(id);
        Ok(())
    }

    pub fn clear_focal_point(&mut self) {
        self.orbital.clear_focal_point();
        self.state.borrow_mut().camera.reset_view();
    }

    pub fn orbital(&self) -> &OrbitalForceHandle {
        &self.orbital
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn tier(&self) -> QualityTier {
        self.quality.current()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether rendering resources are currently held
    pub fn has_resources(&self) -> bool {
        self.state.borrow().pool.is_initialized()
    }

    /// Number of resource pool rebuilds so far
    pub fn pool_generation(&self) -> u64 {
        self.state.borrow().pool.generation()
    }

    /// Current render size of particles, if resources are held
    pub fn particle_size(&self) -> Option<f32> {
        self.state.borrow().pool.particle_material().ok().map(|m| m.size)
    }

    /// Largest particle batch in the scene
    pub fn max_particles_per_link(&self) -> usize {
        let state = self.state.borrow();
        state
            .scene
            .links
            .iter()
            .filter_map(|l| l.particles.as_ref())
            .map(|p| p.len())
            .max()
            .unwrap_or(0)
    }

    pub fn camera_target(&self) -> [f32; 3] {
        self.state.borrow().camera.target
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let state = self.state.borrow();
        let simulation = &state.simulation;
        ViewSnapshot {
            frames: state.frames,
            ticks: simulation.tick_count(),
            simulation_time: simulation.time(),
            alpha: simulation.config.alpha,
            fps: self.monitor.fps(),
            tier: self.quality.current(),
            orbital_strength: self.orbital.strength(),
            focal_point: self.orbital.focal_point(),
            particles: state.scene.particle_totals(),
            nodes: simulation
                .nodes
                .iter()
                .map(|n| NodeSnapshot {
                    id: n.id.clone(),
                    kind: n.kind,
                    position: n.position(),
                })
                .collect(),
        }
    }
}
