//! Orbit camera with focus transitions
//!
//! Orbits around a target point and eases every movement over several
//! frames. The view points it at the focal token and keeps it following the
//! token while the layout moves.

use crate::vector::{lerp, lerp3};

/// Distance from the target in the default view
pub const DEFAULT_DISTANCE: f32 = 300.0;

const MIN_DISTANCE: f32 = 50.0;
const MAX_DISTANCE: f32 = 1000.0;

/// Focus distance in multiples of the focused object's radius
const FOCUS_DISTANCE_FACTOR: f32 = 6.0;

/// 3D camera for orbit-style navigation
#[derive(Debug, Clone)]
pub struct Camera3D {
    /// Camera position in world space
    pub position: [f32; 3],
    /// Point the camera looks at
    pub target: [f32; 3],

    /// Distance from target
    pub distance: f32,
    /// Horizontal angle (azimuth) in radians
    pub theta: f32,
    /// Vertical angle (elevation) in radians
    pub phi: f32,

    // Animation targets
    target_distance: f32,
    target_theta: f32,
    target_phi: f32,
    target_target: [f32; 3],

    /// Whether a transition is in progress
    pub is_animating: bool,
}

impl Default for Camera3D {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera3D {
    pub fn new() -> Self {
        let phi = std::f32::consts::FRAC_PI_4;
        let mut cam = Self {
            position: [0.0, 0.0, DEFAULT_DISTANCE],
            target: [0.0; 3],
            distance: DEFAULT_DISTANCE,
            theta: 0.0,
            phi,
            target_distance: DEFAULT_DISTANCE,
            target_theta: 0.0,
            target_phi: phi,
            target_target: [0.0; 3],
            is_animating: false,
        };
        cam.update_position();
        cam
    }

    /// Ease toward an object at `position` with bounding radius `radius`
    pub fn focus_on(&mut self, position: [f32; 3], radius: f32) {
        self.target_target = position;
        self.target_distance = (radius * FOCUS_DISTANCE_FACTOR).clamp(MIN_DISTANCE, MAX_DISTANCE);
        self.is_animating = true;
    }

    /// Move the look-at goal without changing the zoom
    pub fn follow(&mut self, position: [f32; 3]) {
        if self.target_target != position {
            self.target_target = position;
            self.is_animating = true;
        }
    }

    /// Reset to the default view
    pub fn reset_view(&mut self) {
        self.target_distance = DEFAULT_DISTANCE;
        self.target_theta = 0.0;
        self.target_phi = std::f32::consts::FRAC_PI_4;
        self.target_target = [0.0; 3];
        self.is_animating = true;
    }

    /// Advance the transition one frame
    ///
    /// Returns true while still animating.
    pub fn update_animation(&mut self) -> bool {
        const LERP_FACTOR: f32 = 0.12;
        const EPSILON: f32 = 0.001;

        let mut still_animating = false;
        for (current, goal) in [
            (&mut self.distance, self.target_distance),
            (&mut self.theta, self.target_theta),
            (&mut self.phi, self.target_phi),
        ] {
            if (*current - goal).abs() > EPSILON {
                *current = lerp(*current, goal, LERP_FACTOR);
                still_animating = true;
            } else {
                *current = goal;
            }
        }

        let eased = lerp3(self.target, self.target_target, LERP_FACTOR);
        if (0..3).any(|i| (self.target[i] - self.target_target[i]).abs() > EPSILON) {
            self.target = eased;
            still_animating = true;
        } else {
            self.target = self.target_target;
        }

        self.is_animating = still_animating;
        self.update_position();
        still_animating
    }

    /// Recompute the position from spherical coordinates
    fn update_position(&mut self) {
        let (sin_phi, cos_phi) = self.phi.sin_cos();
        let (sin_theta, cos_theta) = self.theta.sin_cos();

        self.position = [
            self.target[0] + self.distance * sin_phi * sin_theta,
            self.target[1] + self.distance * cos_phi,
            self.target[2] + self.distance * sin_phi * cos_theta,
        ];
    }
}
