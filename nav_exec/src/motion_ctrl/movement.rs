//! # Movement profile controller
//!
//! Executes one leg of a path: turn on the spot to face the target, ramp up
//! to cruise speed, cruise until the braking distance is reached, then ramp
//! down and stop.
//!
//! The controller never blocks. Each call to [`MovementCtrl::step`] samples
//! the platform once and issues at most one command, timing ramp steps and
//! settle pauses against the platform clock. The caller polls it at a high
//! rate and is free to abandon the leg between any two steps.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::nav::VelocityCmd;
use log::{debug, trace};
use nalgebra::Point2;
use serde::Serialize;

use super::{send_cmd_vel, MotionCtrlParams, Platform};
use crate::local_nav::geometry::{distance, shortest_turn};
use crate::loc::{LocError, Pose};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct MovementCtrl {
    state: MovementState,

    leg: Option<Leg>,

    /// Pose at the start of the leg
    origin: Option<Pose>,

    /// Heading the turn aligns to
    bearing_rad: f64,

    /// Distance from the start of the acceleration to the target
    leg_dist_m: f64,

    turn: TurnStage,

    ramp: Option<Ramp>,
}

/// A sequence of speeds each held for one ramp period.
#[derive(Debug, Clone)]
struct Ramp {
    speeds_ms: Vec<f64>,
    next_idx: usize,
    next_step_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Sub state of a single leg.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum MovementState {
    Ready,
    Turn,
    Accel,
    Steady,
    Decel,
    Reached,
}

/// What a leg has to achieve.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Leg {
    /// Drive to a position
    Waypoint(Point2<f64>),

    /// Turn on the spot to a heading
    Orientation(f64),
}

/// Progress through the two stage alignment turn.
#[derive(Debug, Copy, Clone, PartialEq)]
enum TurnStage {
    Start,
    Coarse,
    CoarseSettle { until_s: f64 },
    Fine { dir: f64 },
    FineSettle { until_s: f64 },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Ramp {
    fn new(speeds_ms: Vec<f64>, now_s: f64) -> Self {
        Self {
            speeds_ms,
            next_idx: 0,
            next_step_s: now_s,
        }
    }

    /// Issue the next speed if it is due. Returns true once the last speed has
    /// been held for a full period.
    fn step<P: Platform>(&mut self, platform: &mut P, params: &MotionCtrlParams) -> bool {
        let now_s = platform.elapsed_s();

        if now_s < self.next_step_s {
            return false;
        }

        match self.speeds_ms.get(self.next_idx) {
            Some(&v) => {
                send_cmd_vel(platform, VelocityCmd::linear(v), params);
                self.next_idx += 1;
                self.next_step_s = now_s + params.ramp_period_s;
                false
            }
            None => true,
        }
    }

    /// Speed the ramp will issue next, if a step is due now
    fn due_ms(&self, now_s: f64) -> Option<f64> {
        if now_s < self.next_step_s {
            return None;
        }
        self.speeds_ms.get(self.next_idx).copied()
    }

    /// Speed most recently commanded
    fn current_ms(&self) -> f64 {
        match self.next_idx {
            0 => 0.0,
            i => self.speeds_ms.get(i - 1).copied().unwrap_or(0.0),
        }
    }
}

impl Default for MovementCtrl {
    fn default() -> Self {
        Self::new()
    }
}

impl MovementCtrl {
    pub fn new() -> Self {
        Self {
            state: MovementState::Ready,
            leg: None,
            origin: None,
            bearing_rad: 0.0,
            leg_dist_m: 0.0,
            turn: TurnStage::Start,
            ramp: None,
        }
    }

    /// Start a new leg. Nothing is carried over from the previous one.
    pub fn reset(&mut self, leg: Leg) {
        *self = Self::new();
        self.leg = Some(leg);
    }

    pub fn state(&self) -> MovementState {
        self.state
    }

    pub fn leg(&self) -> Option<Leg> {
        self.leg
    }

    /// Advance the leg by one polling cycle.
    pub fn step<P: Platform>(
        &mut self,
        platform: &mut P,
        params: &MotionCtrlParams,
    ) -> Result<MovementState, LocError> {
        let leg = match self.leg {
            Some(l) => l,
            None => {
                self.set_state(MovementState::Reached);
                return Ok(self.state);
            }
        };

        let pose = platform.get_pose()?;

        match self.state {
            MovementState::Ready => self.state_ready(&leg, &pose, params),
            MovementState::Turn => self.state_turn(&leg, &pose, platform, params),
            MovementState::Accel => self.state_accel(&leg, &pose, platform, params)?,
            MovementState::Steady => self.state_steady(&pose, platform, params)?,
            MovementState::Decel => self.state_decel(platform, params),
            MovementState::Reached => (),
        }

        Ok(self.state)
    }

    fn state_ready(&mut self, leg: &Leg, pose: &Pose, params: &MotionCtrlParams) {
        self.origin = Some(*pose);

        match leg {
            Leg::Waypoint(target) => {
                let dist_m = distance(&pose.position_m, target);

                if dist_m <= params.distance_error_allowed_m {
                    debug!("Already within {:.3} m of the target", dist_m);
                    self.set_state(MovementState::Reached);
                    return;
                }

                self.bearing_rad = pose.bearing_to(target);
            }
            Leg::Orientation(heading_rad) => self.bearing_rad = *heading_rad,
        }

        self.turn = TurnStage::Start;
        self.set_state(MovementState::Turn);
    }

    fn state_turn<P: Platform>(
        &mut self,
        leg: &Leg,
        pose: &Pose,
        platform: &mut P,
        params: &MotionCtrlParams,
    ) {
        let err_rad = shortest_turn(self.bearing_rad, pose.heading_rad);
        let now_s = platform.elapsed_s();
        let fine_rate = 0.5 * params.turn_velocity_rads;

        trace!("Turn {:?}, heading error {:.4} rad", self.turn, err_rad);

        match self.turn {
            TurnStage::Start => {
                if err_rad.abs() <= params.angle_error_allowed_rad {
                    self.turn_complete(leg);
                } else if err_rad.abs() <= params.angle_error_first_rad {
                    let dir = err_rad.signum();
                    send_cmd_vel(platform, VelocityCmd::point_turn(dir * fine_rate), params);
                    self.turn = TurnStage::Fine { dir };
                } else {
                    send_cmd_vel(
                        platform,
                        VelocityCmd::point_turn(err_rad.signum() * params.turn_velocity_rads),
                        params,
                    );
                    self.turn = TurnStage::Coarse;
                }
            }
            TurnStage::Coarse => {
                if err_rad.abs() <= params.angle_error_first_rad {
                    send_cmd_vel(platform, VelocityCmd::stop(), params);
                    self.turn = TurnStage::CoarseSettle {
                        until_s: now_s + params.ramp_period_s,
                    };
                }
            }
            TurnStage::CoarseSettle { until_s } => {
                if now_s < until_s {
                    return;
                }

                if err_rad.abs() <= params.angle_error_allowed_rad {
                    self.turn_complete(leg);
                } else {
                    let dir = err_rad.signum();
                    send_cmd_vel(platform, VelocityCmd::point_turn(dir * fine_rate), params);
                    self.turn = TurnStage::Fine { dir };
                }
            }
            TurnStage::Fine { dir } => {
                if err_rad.abs() <= params.angle_error_allowed_rad {
                    send_cmd_vel(platform, VelocityCmd::stop(), params);
                    self.turn = TurnStage::FineSettle {
                        until_s: now_s + params.ramp_period_s,
                    };
                } else if err_rad.signum() != dir {
                    // Overshot, come back
                    let dir = err_rad.signum();
                    send_cmd_vel(platform, VelocityCmd::point_turn(dir * fine_rate), params);
                    self.turn = TurnStage::Fine { dir };
                }
            }
            TurnStage::FineSettle { until_s } => {
                if now_s >= until_s {
                    self.turn_complete(leg);
                }
            }
        }
    }

    fn turn_complete(&mut self, leg: &Leg) {
        match leg {
            Leg::Waypoint(_) => self.set_state(MovementState::Accel),
            Leg::Orientation(_) => self.set_state(MovementState::Reached),
        }
    }

    fn state_accel<P: Platform>(
        &mut self,
        leg: &Leg,
        pose: &Pose,
        platform: &mut P,
        params: &MotionCtrlParams,
    ) -> Result<(), LocError> {
        let target = match leg {
            Leg::Waypoint(t) => t,
            Leg::Orientation(_) => {
                self.set_state(MovementState::Reached);
                return Ok(());
            }
        };

        // Entering the ramp
        if self.ramp.is_none() {
            let remaining_m = distance(&pose.position_m, target);

            if remaining_m <= params.distance_error_allowed_m {
                self.set_state(MovementState::Reached);
                return Ok(());
            }

            self.leg_dist_m = remaining_m;
            self.ramp = Some(Ramp::new(params.accel_ramp(), platform.elapsed_s()));
        }

        // Short legs must not speed up past what they can stop from
        if let Some(ref ramp) = self.ramp {
            let remaining_m = self.remaining_m(pose);
            let speed_ms = ramp.current_ms();
            let brake_now = speed_ms > 0.0 && remaining_m <= params.braking_distance_m(speed_ms);
            let brake_next = speed_ms > 0.0
                && ramp
                    .due_ms(platform.elapsed_s())
                    .map(|v| remaining_m <= params.braking_distance_m(v))
                    .unwrap_or(false);

            if brake_now || brake_next {
                debug!("Short leg, braking from {:.3} m/s", speed_ms);
                self.begin_decel(speed_ms, platform, params);
                return Ok(());
            }
        }

        let finished = match self.ramp {
            Some(ref mut r) => r.step(platform, params),
            None => true,
        };

        if finished {
            self.ramp = None;
            self.set_state(MovementState::Steady);
        }

        Ok(())
    }

    fn state_steady<P: Platform>(
        &mut self,
        pose: &Pose,
        platform: &mut P,
        params: &MotionCtrlParams,
    ) -> Result<(), LocError> {
        let speed_ms = platform.get_velocity()?.linear_ms;
        let remaining_m = self.remaining_m(pose);

        if remaining_m <= params.braking_distance_m(speed_ms) {
            debug!(
                "Braking at {:.3} m/s with {:.3} m remaining",
                speed_ms, remaining_m
            );
            self.begin_decel(speed_ms, platform, params);
        }

        Ok(())
    }

    fn state_decel<P: Platform>(&mut self, platform: &mut P, params: &MotionCtrlParams) {
        let finished = match self.ramp {
            Some(ref mut r) => r.step(platform, params),
            None => true,
        };

        if finished {
            self.ramp = None;
            send_cmd_vel(platform, VelocityCmd::stop(), params);
            self.set_state(MovementState::Reached);
        }
    }

    fn begin_decel<P: Platform>(&mut self, speed_ms: f64, platform: &mut P, params: &MotionCtrlParams) {
        let mut ramp = Ramp::new(params.decel_ramp(speed_ms), platform.elapsed_s());
        ramp.step(platform, params);

        self.ramp = Some(ramp);
        self.set_state(MovementState::Decel);
    }

    /// Distance left to cover, measured as the leg length less the distance
    /// travelled from the origin.
    fn remaining_m(&self, pose: &Pose) -> f64 {
        match self.origin {
            Some(ref o) => self.leg_dist_m - distance(&pose.position_m, &o.position_m),
            None => self.leg_dist_m,
        }
    }

    fn set_state(&mut self, state: MovementState) {
        if state != self.state {
            debug!("Movement {:?} -> {:?}", self.state, state);
        }
        self.state = state;
    }
}
