//! # Navigation state machine
//!
//! [`NavCtrl`] owns the waypoint queue and walks it one leg at a time. Each
//! call to [`NavCtrl::step`] executes the current state once, with the
//! exception of `Moving`, which blocks in a tight polling loop until the leg
//! completes or the state is changed by an incoming command.
//!
//! Commands arrive through a [`NavHandle`] and are dispatched at the start of
//! every step, once per tick of the `Moving` loop, and between the steps of a
//! ramp down. Every change of state is published to subscribers.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{
    local_nav::{WaypointCheckRep, WaypointCheckReq},
    nav::{NavCmd, NavState, VelocityCmd, Waypoint},
    pubsub::Publisher,
};
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::convert::TryFrom;
use std::sync::mpsc::{channel, Receiver, Sender};
use util::params;

use super::*;
use crate::local_nav::geometry::distance;
use crate::loc::LocError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct NavCtrl {
    params: MotionCtrlParams,

    state: NavState,

    /// Waypoints still to visit, front is the current target
    path: VecDeque<Waypoint>,

    /// Heading of the last waypoint of the most recent path
    end_orientation_rad: Option<f64>,

    /// Consecutive misses of the current target
    waypoint_retries: u32,

    movement: MovementCtrl,

    cmd_rx: Receiver<NavCmd>,
    cmd_tx: Sender<NavCmd>,

    state_pub: Publisher<NavState>,
    target_pub: Publisher<Waypoint>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which stop the navigation loop.
#[derive(Debug, thiserror::Error)]
pub enum NavError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(params::LoadError),

    #[error("Localisation failed while in {0}: {1}")]
    LocFailure(NavState, LocError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl NavCtrl {
    /// Create a new controller and a handle for sending it commands.
    pub fn new(params: MotionCtrlParams) -> (Self, NavHandle) {
        let (cmd_tx, cmd_rx) = channel();

        let nav = Self {
            params,
            state: NavState::Ready,
            path: VecDeque::new(),
            end_orientation_rad: None,
            waypoint_retries: 0,
            movement: MovementCtrl::new(),
            cmd_rx,
            cmd_tx: cmd_tx.clone(),
            state_pub: Publisher::new("nav_state"),
            target_pub: Publisher::new("nav_target"),
        };

        (nav, NavHandle::new(cmd_tx))
    }

    /// Initialise the controller from a parameter file.
    pub fn init(params_path: &str) -> Result<Self, NavError> {
        let params = params::load(params_path).map_err(NavError::ParamLoadError)?;

        Ok(Self::new(params).0)
    }

    pub fn handle(&self) -> NavHandle {
        NavHandle::new(self.cmd_tx.clone())
    }

    /// Receive every state change from now on.
    pub fn subscribe_state(&self) -> Receiver<NavState> {
        self.state_pub.subscribe()
    }

    /// Receive every target the controller starts moving towards.
    pub fn subscribe_target(&self) -> Receiver<Waypoint> {
        self.target_pub.subscribe()
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn params(&self) -> &MotionCtrlParams {
        &self.params
    }

    pub fn path(&self) -> &VecDeque<Waypoint> {
        &self.path
    }

    /// True if there is nothing to do until a new path arrives.
    pub fn is_idle(&self) -> bool {
        self.state == NavState::Ready && self.path.is_empty()
    }

    pub fn get_tm(&self) -> NavTm {
        NavTm {
            state: self.state,
            movement_state: self.movement.state(),
            path_len: self.path.len(),
            target: self.path.front().cloned(),
            end_orientation_rad: self.end_orientation_rad,
        }
    }

    /// Execute one cycle of the state machine.
    ///
    /// A localisation failure is fatal: a stop command is sent and the error
    /// returned, the caller must not keep stepping.
    pub fn step<P, C>(&mut self, platform: &mut P, checker: &mut C) -> Result<NavState, NavError>
    where
        P: Platform,
        C: PathChecker,
    {
        self.dispatch(platform);

        let state = self.state;

        let result = match state {
            NavState::Ready => {
                self.state_ready(platform.elapsed_s());
                Ok(())
            }
            NavState::Moving => self.state_moving(platform),
            NavState::PoseReached => self.state_pose_reached(platform),
            NavState::ObstacleDetected => self.state_obstacle_detected(platform),
            NavState::Avoiding => self.state_avoiding(platform, checker),
            NavState::Error | NavState::Unreachable => {
                self.clear_path();
                self.set_state(NavState::Stop);
                Ok(())
            }
            NavState::Stop => self.state_stop(platform),
        };

        match result {
            Ok(()) => Ok(self.state),
            Err(e) => {
                error!("Localisation failed in {}, halting: {}", state, e);
                platform.send_cmd_vel(VelocityCmd::stop());
                Err(NavError::LocFailure(state, e))
            }
        }
    }

    // -----------------------------------------------------------------------
    // STATES
    // -----------------------------------------------------------------------

    fn state_ready(&mut self, time_s: f64) {
        let target = match self.begin_leg(time_s) {
            Some(t) => t,
            None => return,
        };

        info!(
            "New target ({:.3}, {:.3}), {} waypoint(s) queued",
            target.position_m.x,
            target.position_m.y,
            self.path.len()
        );

        self.set_state(NavState::Moving);
    }

    fn state_moving<P: Platform>(&mut self, platform: &mut P) -> Result<(), LocError> {
        if self.movement.leg().is_none() {
            match self.begin_leg(platform.elapsed_s()) {
                Some(target) => info!(
                    "Resuming towards ({:.3}, {:.3})",
                    target.position_m.x, target.position_m.y
                ),
                None => {
                    warn!("Moving with no target, returning to {}", NavState::Ready);
                    self.set_state(NavState::Ready);
                    return Ok(());
                }
            }
        }

        let mut cycles: u64 = 0;

        while self.state == NavState::Moving {
            if self.movement.step(platform, &self.params)? == MovementState::Reached {
                match self.movement.leg() {
                    Some(Leg::Orientation(_)) => {
                        info!("End orientation reached");
                        self.end_orientation_rad = None;
                        self.set_state(NavState::Stop);
                    }
                    _ => self.set_state(NavState::PoseReached),
                }
                break;
            }

            cycles += 1;
            if cycles >= self.params.max_leg_cycles {
                error!(
                    "Leg not completed within {} cycles (stuck in {:?}), target is unreachable",
                    cycles,
                    self.movement.state()
                );
                send_cmd_vel(platform, VelocityCmd::stop(), &self.params);
                self.set_state(NavState::Unreachable);
                break;
            }

            self.dispatch(platform);

            if self.state == NavState::Moving {
                platform.sleep(self.params.inner_period_s);
            }
        }

        Ok(())
    }

    fn state_pose_reached<P: Platform>(&mut self, platform: &mut P) -> Result<(), LocError> {
        let target = match self.path.front() {
            Some(wp) => wp.position_m,
            None => {
                warn!("Pose reached with an empty path");
                self.set_state(NavState::Ready);
                return Ok(());
            }
        };

        if self.params.strict_waypoint_accuracy {
            let pose = platform.get_pose()?;
            let error_m = distance(&pose.position_m, &target);

            if error_m > self.params.distance_error_allowed_m {
                self.waypoint_retries += 1;

                if self.waypoint_retries >= self.params.max_waypoint_retries {
                    warn!(
                        "Missed ({:.3}, {:.3}) by {:.3} m {} times, giving up",
                        target.x, target.y, error_m, self.waypoint_retries
                    );
                    self.set_state(NavState::Unreachable);
                } else {
                    warn!(
                        "Missed ({:.3}, {:.3}) by {:.3} m, retrying",
                        target.x, target.y, error_m
                    );
                    self.set_state(NavState::Ready);
                }

                return Ok(());
            }
        }

        self.waypoint_retries = 0;
        self.path.pop_front();

        info!(
            "Waypoint ({:.3}, {:.3}) reached, {} remaining",
            target.x,
            target.y,
            self.path.len()
        );

        if !self.path.is_empty() {
            self.set_state(NavState::Ready);
            return Ok(());
        }

        match self.end_orientation_rad {
            Some(heading_rad) if self.params.align_end_orientation => {
                info!("Aligning to end orientation {:.3} rad", heading_rad);
                self.movement.reset(Leg::Orientation(heading_rad));
                self.set_state(NavState::Moving);
            }
            _ => self.set_state(NavState::Stop),
        }

        Ok(())
    }

    fn state_obstacle_detected<P: Platform>(&mut self, platform: &mut P) -> Result<(), LocError> {
        self.ramp_down(platform)?;

        if self.state == NavState::ObstacleDetected {
            self.set_state(NavState::Avoiding);
        }

        Ok(())
    }

    fn state_avoiding<P, C>(&mut self, platform: &mut P, checker: &mut C) -> Result<(), LocError>
    where
        P: Platform,
        C: PathChecker,
    {
        // Let the obstacle data catch up with the stopped rover
        platform.sleep(self.params.sensor_settle_time_s);
        self.dispatch(platform);

        if self.state != NavState::Avoiding {
            return Ok(());
        }

        let pose = platform.get_pose()?;

        let target = match self.path.front() {
            Some(wp) => wp.position_m,
            None => {
                warn!("Avoiding with an empty path");
                self.set_state(NavState::Ready);
                return Ok(());
            }
        };

        let req = WaypointCheckReq {
            current_m: pose.position_m,
            target_m: target,
        };

        match checker.check_waypoint(&req) {
            Ok(WaypointCheckRep::Clear) => {
                info!("False alarm, path to ({:.3}, {:.3}) is clear", target.x, target.y);
                self.set_state(NavState::Ready);
            }
            Ok(WaypointCheckRep::Detour(p)) => {
                info!("Detouring via ({:.3}, {:.3})", p.x, p.y);
                self.path
                    .push_front(Waypoint::new(p.x, p.y, pose.bearing_to(&p)));
                self.waypoint_retries = 0;
                self.set_state(NavState::Ready);
            }
            Ok(WaypointCheckRep::NoDetour) => {
                warn!("No detour around the obstacle to ({:.3}, {:.3})", target.x, target.y);
                self.set_state(NavState::Unreachable);
            }
            Err(e) => {
                error!("Waypoint check failed in {}: {}", self.state, e);
                self.set_state(NavState::Ready);
            }
        }

        Ok(())
    }

    fn state_stop<P: Platform>(&mut self, platform: &mut P) -> Result<(), LocError> {
        self.ramp_down(platform)?;

        if self.state == NavState::Stop {
            self.movement = MovementCtrl::new();
            self.set_state(NavState::Ready);
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // HELPERS
    // -----------------------------------------------------------------------

    /// Bring the rover to a stop, ramping down if it is moving quickly.
    ///
    /// The ramp is abandoned if a command changes the state part way through.
    fn ramp_down<P: Platform>(&mut self, platform: &mut P) -> Result<(), LocError> {
        let state = self.state;
        let speed_ms = platform.get_velocity()?.linear_ms;

        if speed_ms.abs() > self.params.min_braking_speed_ms() {
            debug!("Ramping down from {:.3} m/s", speed_ms);

            for v in self.params.decel_ramp(speed_ms) {
                send_cmd_vel(platform, VelocityCmd::linear(v), &self.params);
                platform.sleep(self.params.ramp_period_s);

                self.dispatch(platform);
                if self.state != state {
                    debug!("Ramp down interrupted by {}", self.state);
                    return Ok(());
                }
            }
        }

        send_cmd_vel(platform, VelocityCmd::stop(), &self.params);

        Ok(())
    }

    /// Start a leg to the front of the path and publish it as the target.
    fn begin_leg(&mut self, time_s: f64) -> Option<Waypoint> {
        let target = self.path.front()?.stamped(&self.params.frame_id, time_s);

        self.movement.reset(Leg::Waypoint(target.position_m));
        self.target_pub.publish(target.clone());

        Some(target)
    }

    /// Handle every command waiting in the inbox.
    fn dispatch<P: Platform>(&mut self, platform: &mut P) {
        let cmds: Vec<NavCmd> = self.cmd_rx.try_iter().collect();

        for cmd in cmds {
            match cmd {
                NavCmd::Path(path) => self.load_path(path),
                NavCmd::StateOverride(code) => self.override_state(code),
                NavCmd::EmergencyStop => {
                    warn!("Emergency stop");
                    send_cmd_vel(platform, VelocityCmd::stop(), &self.params);
                    self.clear_path();
                    self.movement = MovementCtrl::new();
                    self.set_state(NavState::Ready);
                }
            }
        }
    }

    fn load_path(&mut self, path: Vec<Waypoint>) {
        if path.is_empty() {
            warn!("Ignoring empty path");
            return;
        }

        if !self.path.is_empty() {
            if self.params.consecutive_paths {
                info!("Appending {} waypoint(s) to the current path", path.len());
            } else {
                info!("Replacing the current path, stopping first");
                self.clear_path();
                self.set_state(NavState::Stop);
            }
        } else {
            info!("New path of {} waypoint(s)", path.len());
        }

        self.end_orientation_rad = path.last().map(|wp| wp.heading_rad);
        self.path.extend(path);
    }

    fn override_state(&mut self, code: u8) {
        match NavState::try_from(code) {
            Ok(state) => {
                info!("State override to {}", state);

                // Resume from the queue rather than a stale leg
                if state == NavState::Moving {
                    self.movement = MovementCtrl::new();
                }

                self.set_state(state);
            }
            Err(e) => error!("Ignoring state override: {}, remaining in {}", e, self.state),
        }
    }

    fn clear_path(&mut self) {
        if !self.path.is_empty() {
            info!("Clearing {} waypoint(s)", self.path.len());
        }

        self.path.clear();
        self.end_orientation_rad = None;
        self.waypoint_retries = 0;
    }

    fn set_state(&mut self, state: NavState) {
        if state == self.state {
            return;
        }

        info!("Nav state {} -> {}", self.state, state);
        self.state = state;
        self.state_pub.publish(state);
    }
}
