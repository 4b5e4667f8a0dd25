//! # Navigation telemetry

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::nav::{NavState, Waypoint};
use serde::Serialize;

use super::MovementState;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Snapshot of the navigation state machine.
#[derive(Debug, Clone, Serialize)]
pub struct NavTm {
    pub state: NavState,
    pub movement_state: MovementState,

    /// Number of waypoints still queued, including the current target
    pub path_len: usize,

    pub target: Option<Waypoint>,
    pub end_orientation_rad: Option<f64>,
}
