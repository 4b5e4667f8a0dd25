//! # Simulated platform
//!
//! A kinematic unicycle rover standing in for the real platform and
//! localisation service. Time only advances when the rover is told to sleep,
//! so control code driven against it is fully deterministic. With
//! `real_time` set each sleep is also paced against the wall clock, which is
//! what the executable uses so other threads see the rover move at a
//! realistic rate.
//!
//! The simulated sensor returns the points of the static world obstacles
//! within range of the rover, one cluster per obstacle.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    local_nav::{Cluster, ObstacleClusters},
    nav::VelocityCmd,
};
use log::trace;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use util::{maths::shortest_turn, params, time::seconds_to_std};

use crate::local_nav::geometry::distance;
use crate::loc::{LocError, LocSource, Pose, Velocity};
use crate::motion_ctrl::Platform;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SimParams {
    /// Starting pose as `[x_m, y_m, heading_rad]`
    pub initial_pose: [f64; 3],

    /// Pace sleeps against the wall clock
    pub real_time: bool,

    /// Longest single integration step
    pub max_step_s: f64,

    pub sensor_range_m: f64,

    /// Interval between recorded trajectory samples
    pub trajectory_period_s: f64,

    /// Static world obstacles, each a list of `[x_m, y_m]` points
    #[serde(default)]
    pub obstacles: Vec<Vec<[f64; 2]>>,
}

/// Pose of the rover at a point in simulated time.
#[derive(Debug, Copy, Clone, Serialize)]
pub struct TrajectorySample {
    pub time_s: f64,
    pub pose: Pose,
}

pub struct SimRover {
    params: SimParams,

    pose: Pose,

    /// Velocity currently being executed
    cmd: VelocityCmd,

    time_s: f64,

    next_sample_s: f64,

    cmd_history: Vec<(f64, VelocityCmd)>,

    trajectory: Vec<TrajectorySample>,
}

/// A [`SimRover`] shared between threads.
#[derive(Clone)]
pub struct SharedSim(Arc<Mutex<SimRover>>);

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(params::LoadError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            initial_pose: [0.0, 0.0, 0.0],
            real_time: false,
            max_step_s: 0.01,
            sensor_range_m: 4.0,
            trajectory_period_s: 0.1,
            obstacles: Vec::new(),
        }
    }
}

impl SimRover {
    pub fn new(params: SimParams) -> Self {
        let [x_m, y_m, heading_rad] = params.initial_pose;
        let pose = Pose::new(x_m, y_m, heading_rad);

        Self {
            pose,
            cmd: VelocityCmd::stop(),
            time_s: 0.0,
            next_sample_s: params.trajectory_period_s,
            cmd_history: Vec::new(),
            trajectory: vec![TrajectorySample { time_s: 0.0, pose }],
            params,
        }
    }

    pub fn init(params_path: &str) -> Result<Self, SimError> {
        let params = params::load(params_path).map_err(SimError::ParamLoadError)?;

        Ok(Self::new(params))
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Most recent command, a stop if none has been sent.
    pub fn last_cmd(&self) -> VelocityCmd {
        self.cmd
    }

    /// Every command received with the time it arrived.
    pub fn cmd_history(&self) -> &[(f64, VelocityCmd)] {
        &self.cmd_history
    }

    pub fn trajectory(&self) -> &[TrajectorySample] {
        &self.trajectory
    }

    /// Points of each world obstacle within sensor range of the rover.
    pub fn sense_obstacles(&self) -> ObstacleClusters {
        let range_m = self.params.sensor_range_m;
        let here = self.pose.position_m;

        let clusters: Vec<Cluster> = self
            .params
            .obstacles
            .iter()
            .map(|obstacle| {
                obstacle
                    .iter()
                    .map(|p| Point2::new(p[0], p[1]))
                    .filter(|p| distance(p, &here) <= range_m)
                    .collect::<Cluster>()
            })
            .filter(|c| !c.is_empty())
            .collect();

        trace!("Sensed {} obstacle cluster(s)", clusters.len());

        ObstacleClusters::new(clusters)
    }

    /// Advance simulated time without any wall clock pacing.
    pub fn advance(&mut self, dur_s: f64) {
        if !dur_s.is_finite() || dur_s <= 0.0 {
            return;
        }

        let mut remaining_s = dur_s;

        while remaining_s > 0.0 {
            let dt = remaining_s.min(self.params.max_step_s);
            self.integrate(dt);
            remaining_s -= dt;
        }
    }

    fn integrate(&mut self, dt: f64) {
        let heading = self.pose.heading_rad;

        self.pose.position_m.x += self.cmd.linear_ms * heading.cos() * dt;
        self.pose.position_m.y += self.cmd.linear_ms * heading.sin() * dt;
        self.pose.heading_rad = shortest_turn(heading + self.cmd.angular_rads * dt, 0.0);

        self.time_s += dt;

        if self.time_s >= self.next_sample_s {
            self.trajectory.push(TrajectorySample {
                time_s: self.time_s,
                pose: self.pose,
            });
            self.next_sample_s += self.params.trajectory_period_s;
        }
    }
}

impl LocSource for SimRover {
    fn get_pose(&mut self) -> Result<Pose, LocError> {
        Ok(self.pose)
    }

    fn get_velocity(&mut self) -> Result<Velocity, LocError> {
        Ok(Velocity {
            linear_ms: self.cmd.linear_ms,
            angular_rads: self.cmd.angular_rads,
        })
    }
}

impl Platform for SimRover {
    fn send_cmd_vel(&mut self, cmd: VelocityCmd) {
        self.cmd_history.push((self.time_s, cmd));
        self.cmd = cmd;
    }

    fn sleep(&mut self, dur_s: f64) {
        self.advance(dur_s);

        if self.params.real_time {
            thread::sleep(seconds_to_std(dur_s));
        }
    }

    fn elapsed_s(&self) -> f64 {
        self.time_s
    }
}

impl SharedSim {
    pub fn new(rover: SimRover) -> Self {
        Self(Arc::new(Mutex::new(rover)))
    }

    /// Lock the rover. A panic in another holder leaves the rover usable.
    pub fn lock(&self) -> MutexGuard<SimRover> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sense_obstacles(&self) -> ObstacleClusters {
        self.lock().sense_obstacles()
    }

    pub fn trajectory(&self) -> Vec<TrajectorySample> {
        self.lock().trajectory().to_vec()
    }
}

impl LocSource for SharedSim {
    fn get_pose(&mut self) -> Result<Pose, LocError> {
        self.lock().get_pose()
    }

    fn get_velocity(&mut self) -> Result<Velocity, LocError> {
        self.lock().get_velocity()
    }
}

impl Platform for SharedSim {
    fn send_cmd_vel(&mut self, cmd: VelocityCmd) {
        self.lock().send_cmd_vel(cmd)
    }

    /// Pacing happens with the lock released so other threads can read the
    /// rover in the meantime.
    fn sleep(&mut self, dur_s: f64) {
        let real_time = {
            let mut rover = self.lock();
            rover.advance(dur_s);
            rover.params.real_time
        };

        if real_time {
            thread::sleep(seconds_to_std(dur_s));
        }
    }

    fn elapsed_s(&self) -> f64 {
        self.lock().elapsed_s()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_straight_line() {
        let mut rover = SimRover::new(SimParams::default());

        rover.send_cmd_vel(VelocityCmd::linear(0.2));
        rover.sleep(5.0);

        let pose = rover.get_pose().unwrap();
        assert_relative_eq!(pose.position_m.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(pose.position_m.y, 0.0);
        assert_relative_eq!(rover.elapsed_s(), 5.0, epsilon = 1e-9);
        assert_relative_eq!(rover.get_velocity().unwrap().linear_ms, 0.2);
    }

    #[test]
    fn test_point_turn_wraps() {
        let mut rover = SimRover::new(SimParams {
            initial_pose: [1.0, 2.0, FRAC_PI_2],
            ..SimParams::default()
        });

        rover.send_cmd_vel(VelocityCmd::point_turn(0.5));
        rover.sleep(2.0 * PI);

        // Quarter turn plus half a turn lands at -pi/2
        let pose = rover.get_pose().unwrap();
        assert_relative_eq!(pose.heading_rad, -FRAC_PI_2, epsilon = 1e-9);
        assert_relative_eq!(pose.position_m.x, 1.0);
        assert_relative_eq!(pose.position_m.y, 2.0);
    }

    #[test]
    fn test_history_and_trajectory() {
        let mut rover = SimRover::new(SimParams::default());

        rover.sleep(0.5);
        rover.send_cmd_vel(VelocityCmd::linear(0.1));
        rover.sleep(0.5);
        rover.send_cmd_vel(VelocityCmd::stop());

        let history = rover.cmd_history();
        assert_eq!(history.len(), 2);
        assert_relative_eq!(history[0].0, 0.5, epsilon = 1e-9);
        assert!(history[1].1.is_stop());

        // Initial sample plus one every 0.1 s
        let n = rover.trajectory().len();
        assert!(n >= 10 && n <= 11, "{} samples", n);
    }

    #[test]
    fn test_sensor_range() {
        let mut rover = SimRover::new(SimParams {
            sensor_range_m: 2.0,
            obstacles: vec![
                vec![[1.0, 0.0], [1.0, 1.0], [3.0, 0.0]],
                vec![[10.0, 10.0]],
            ],
            ..SimParams::default()
        });

        let batch = rover.sense_obstacles();
        assert_eq!(batch.clusters, vec![vec![Point2::new(1.0, 0.0), Point2::new(1.0, 1.0)]]);
        assert!(batch.stamp.is_some());

        rover.send_cmd_vel(VelocityCmd::linear(0.2));
        rover.sleep(7.5);
        assert_eq!(rover.sense_obstacles().clusters[0].len(), 3);
    }

    #[test]
    fn test_shared_sim() {
        let sim = SharedSim::new(SimRover::new(SimParams::default()));
        let mut a = sim.clone();
        let mut b = sim.clone();

        a.send_cmd_vel(VelocityCmd::linear(0.2));
        a.sleep(1.0);

        assert_relative_eq!(b.get_pose().unwrap().position_m.x, 0.2, epsilon = 1e-9);
        assert_relative_eq!(b.elapsed_s(), 1.0, epsilon = 1e-9);
        assert!(!sim.trajectory().is_empty());
    }

    #[test]
    fn test_params_file() {
        let params: SimParams = toml::from_str(include_str!("../../../params/sim.toml")).unwrap();

        assert!(params.real_time);
        assert!(!params.obstacles.is_empty());
    }
}
