//! ecosphere - orbital physics, particle flow and adaptive quality for 3D
//! token ecosystem graphs.
//!
//! A token ecosystem is a three-level hierarchy (roots, branches, leaves)
//! joined by value-carrying links. This crate lays it out with a force
//! simulation in which non-root tokens orbit their parents, streams
//! particles along links in proportion to their value, and adapts geometry
//! and particle budgets to the measured frame rate.

pub mod camera;
pub mod config;
pub mod error;
pub mod geometry;
pub mod model;
pub mod orbital;
pub mod particles;
pub mod performance;
pub mod quality;
pub mod resources;
pub mod scene;
pub mod scheduler;
pub mod simulation;
pub mod vector;
pub mod view;

pub use config::ViewConfig;
pub use error::{EcoError, EcoResult};
pub use model::{EcosystemGraph, NodeKind, Token, TokenLink};
pub use orbital::{OrbitalForceHandle, setup_orbital_physics};
pub use particles::{create_particle_system, update_particles};
pub use performance::PerformanceMonitor;
pub use quality::{QualitySettings, QualityTier};
pub use scene::update_link_objects;
pub use view::{EcosystemView, ViewSnapshot};
