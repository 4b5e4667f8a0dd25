//! # Motion control module
//!
//! Motion control turns a queue of waypoints into velocity commands. It is
//! made of two nested state machines:
//!
//! - [`NavCtrl`] - the top level navigation state machine, which owns the
//!   path, reacts to external commands and handles obstacle interrupts.
//! - [`MovementCtrl`] - the movement profile for a single leg: turn to face
//!   the target, ramp up, cruise, ramp down.
//!
//! All interaction with the rover goes through the [`Platform`] trait, which
//! also provides the clock. This allows the whole module to be driven against
//! the simulated rover in tests with no wall clock involved.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod movement;
pub mod params;
pub mod state;
pub mod tm;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{
    local_nav::{WaypointCheckRep, WaypointCheckReq},
    nav::{NavCmd, NavState, VelocityCmd, Waypoint},
};
use log::{error, trace};
use std::sync::mpsc::Sender;
use util::maths::clamp;

use crate::loc::LocSource;

pub use movement::{Leg, MovementCtrl, MovementState};
pub use params::MotionCtrlParams;
pub use state::{NavCtrl, NavError};
pub use tm::NavTm;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// The rover as seen by motion control: a localisation source which accepts
/// velocity commands, plus the clock control runs against.
pub trait Platform: LocSource {
    /// Send a velocity command. Delivery is fire-and-forget.
    fn send_cmd_vel(&mut self, cmd: VelocityCmd);

    /// Block for the given duration.
    fn sleep(&mut self, dur_s: f64);

    /// Seconds elapsed on the platform clock.
    fn elapsed_s(&self) -> f64;
}

/// The waypoint check service used while avoiding obstacles.
pub trait PathChecker {
    fn check_waypoint(&mut self, req: &WaypointCheckReq) -> Result<WaypointCheckRep, PathCheckError>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Cloneable sender of commands into a [`NavCtrl`].
///
/// All methods return `false` if the controller no longer exists.
#[derive(Debug, Clone)]
pub struct NavHandle {
    tx: Sender<NavCmd>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PathCheckError {
    #[error("Waypoint check service unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl NavHandle {
    pub(crate) fn new(tx: Sender<NavCmd>) -> Self {
        Self { tx }
    }

    pub fn send(&self, cmd: NavCmd) -> bool {
        self.tx.send(cmd).is_ok()
    }

    pub fn send_path(&self, path: Vec<Waypoint>) -> bool {
        self.send(NavCmd::Path(path))
    }

    pub fn override_state(&self, state: NavState) -> bool {
        self.override_code(state.code())
    }

    /// Send a raw override code, which the controller will validate.
    pub fn override_code(&self, code: u8) -> bool {
        self.send(NavCmd::StateOverride(code))
    }

    pub fn emergency_stop(&self) -> bool {
        self.send(NavCmd::EmergencyStop)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Send a velocity command to the platform, limiting the linear speed to the
/// cruise speed.
pub(crate) fn send_cmd_vel<P: Platform + ?Sized>(
    platform: &mut P,
    mut cmd: VelocityCmd,
    params: &MotionCtrlParams,
) {
    let limit = params.motion_velocity_ms;

    if cmd.linear_ms.abs() > limit {
        error!(
            "Linear velocity demand of {:.3} m/s exceeds the {:.3} m/s limit, clamping",
            cmd.linear_ms, limit
        );
        cmd.linear_ms = clamp(&cmd.linear_ms, &-limit, &limit);
    }

    trace!("cmd_vel: {:?}", cmd);

    platform.send_cmd_vel(cmd);
}
