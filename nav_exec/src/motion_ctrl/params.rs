//! Motion control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the navigation state machine and movement profile.
#[derive(Debug, Clone, Deserialize)]
pub struct MotionCtrlParams {
    /// Cruise speed, also the limit applied to all linear commands
    pub motion_velocity_ms: f64,

    /// Point turn rate for the coarse alignment. The fine alignment uses half
    /// of this.
    pub turn_velocity_rads: f64,

    /// Coarse alignment stops within this heading error
    pub angle_error_first_rad: f64,

    /// Fine alignment stops within this heading error
    pub angle_error_allowed_rad: f64,

    /// A waypoint is reached within this distance
    pub distance_error_allowed_m: f64,

    /// Residual speed, as a fraction of the cruise speed, below which no
    /// ramp down is needed before stopping
    pub min_braking_speed_frac: f64,

    /// Number of speed steps in an acceleration or deceleration ramp. Each
    /// step doubles (or halves) the speed.
    pub ramp_steps: u32,

    /// Time each ramp step is held for
    pub ramp_period_s: f64,

    /// Period of the movement polling loop
    pub inner_period_s: f64,

    /// Period of the top level loop
    pub cycle_period_s: f64,

    /// A single leg is abandoned as unreachable after this many polling
    /// cycles
    pub max_leg_cycles: u64,

    /// Time to wait for the sensors to settle before checking for a detour
    pub sensor_settle_time_s: f64,

    /// If true the rover's position is checked against the waypoint once a
    /// leg completes, and the leg retried if it is out of tolerance
    pub strict_waypoint_accuracy: bool,

    /// Number of retries of a missed waypoint before it is declared
    /// unreachable
    pub max_waypoint_retries: u32,

    /// If true a new path received while one is executing is appended to it,
    /// otherwise the rover stops and the new path replaces the old
    pub consecutive_paths: bool,

    /// If true the rover turns to the last waypoint's heading at the end of a
    /// path
    pub align_end_orientation: bool,

    /// Frame published targets are tagged with
    pub frame_id: String,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotionCtrlParams {
    /// Distance covered ramping down from `speed_ms` to a stop.
    pub fn braking_distance_m(&self, speed_ms: f64) -> f64 {
        self.decel_ramp(speed_ms)
            .iter()
            .map(|v| v.abs() * self.ramp_period_s)
            .sum()
    }

    /// Speeds commanded when accelerating to the cruise speed, lowest first.
    pub fn accel_ramp(&self) -> Vec<f64> {
        let mut ramp = self.decel_ramp(self.motion_velocity_ms);
        ramp.reverse();
        ramp
    }

    /// Speeds commanded when ramping down from `speed_ms`, highest first.
    pub fn decel_ramp(&self, speed_ms: f64) -> Vec<f64> {
        (0..self.ramp_steps)
            .map(|i| speed_ms / 2f64.powi(i as i32))
            .collect()
    }

    /// Speed below which no ramp down is needed.
    pub fn min_braking_speed_ms(&self) -> f64 {
        self.min_braking_speed_frac * self.motion_velocity_ms
    }
}

impl Default for MotionCtrlParams {
    fn default() -> Self {
        Self {
            motion_velocity_ms: 0.2,
            turn_velocity_rads: 0.3,
            angle_error_first_rad: 20f64.to_radians(),
            angle_error_allowed_rad: 1f64.to_radians(),
            distance_error_allowed_m: 0.1,
            min_braking_speed_frac: 0.25,
            ramp_steps: 5,
            ramp_period_s: 0.2,
            inner_period_s: 0.001,
            cycle_period_s: 0.1,
            max_leg_cycles: 300_000,
            sensor_settle_time_s: 1.0,
            strict_waypoint_accuracy: true,
            max_waypoint_retries: 3,
            consecutive_paths: true,
            align_end_orientation: false,
            frame_id: String::from("map"),
        }
    }
}
