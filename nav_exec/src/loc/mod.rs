//! # Localisation module
//!
//! This module defines the interface to the localisation service, which
//! provides the pose and velocity of the rover on request.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The current pose (position and heading in the map frame) of the rover.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// The position in the map frame
    pub position_m: Point2<f64>,

    /// Heading of the rover, anticlockwise from the map +X axis.
    pub heading_rad: f64,
}

/// Current velocity of the rover in the body frame.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    /// Forward speed
    pub linear_ms: f64,

    /// Yaw rate, positive anticlockwise
    pub angular_rads: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Failures of the localisation service. These are fatal to the caller,
/// there is no stale or default data to fall back on.
#[derive(Debug, Error)]
pub enum LocError {
    #[error("Pose query failed: {0}")]
    PoseUnavailable(String),

    #[error("Velocity query failed: {0}")]
    VelocityUnavailable(String),
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A source of pose and velocity. Both queries are synchronous.
pub trait LocSource {
    fn get_pose(&mut self) -> Result<Pose, LocError>;

    fn get_velocity(&mut self) -> Result<Velocity, LocError>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            position_m: Point2::new(x_m, y_m),
            heading_rad,
        }
    }

    /// Bearing from the rover's position to the given point.
    pub fn bearing_to(&self, point: &Point2<f64>) -> f64 {
        let d = point - self.position_m;
        d.y.atan2(d.x)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}
