//! Local navigation parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::outline::OutlineThresholds;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the local planner.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalNavParams {
    /// Physical radius of the rover. Detours keep half of this clear of
    /// obstacles.
    pub robot_radius_m: f64,

    /// Maximum useful range of the obstacle sensor. Collisions closer than
    /// half of this trigger an obstacle interrupt.
    pub max_sensor_dist_m: f64,

    /// Largest angle swept either side of the direct bearing when looking for
    /// an obstacle's extreme points.
    pub sweep_max_deg: u32,

    /// Period of the collision check while the rover is moving
    pub check_period_s: f64,

    /// Concave hull digging ratio
    pub concavity: f64,

    /// Concave hull edges shorter than this are not dug into
    pub length_threshold_m: f64,

    /// Cluster sizes at which each outline strategy is used
    pub outline_thresholds: OutlineThresholds,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LocalNavParams {
    /// Standoff kept from an obstacle's extreme point when planning a detour.
    pub fn clearance_m(&self) -> f64 {
        0.5 * self.robot_radius_m
    }

    /// Collisions nearer than this distance interrupt the rover.
    pub fn trigger_dist_m(&self) -> f64 {
        0.5 * self.max_sensor_dist_m
    }
}

impl Default for LocalNavParams {
    fn default() -> Self {
        Self {
            robot_radius_m: 0.3,
            max_sensor_dist_m: 4.0,
            sweep_max_deg: 180,
            check_period_s: 1.0,
            concavity: 2.0,
            length_threshold_m: 0.05,
            outline_thresholds: OutlineThresholds::default(),
        }
    }
}
