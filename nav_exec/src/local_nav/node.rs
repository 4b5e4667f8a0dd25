//! # Local navigation node
//!
//! Periodic collision check run alongside the navigation state machine. While
//! the rover is moving the segment from its pose to the current target is
//! checked against the obstacles, and if a collision is close enough the
//! state machine is interrupted with an `ObstacleDetected` override.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{
    nav::{NavState, Waypoint},
    pubsub::latest,
};
use log::{info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::thread;
use util::time::seconds_to_std;

use super::LocalPlanner;
use crate::loc::{LocError, LocSource};
use crate::motion_ctrl::{NavCtrl, NavHandle};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct LocalNavNode {
    planner: LocalPlanner,

    nav: NavHandle,

    state_rx: Receiver<NavState>,
    target_rx: Receiver<Waypoint>,

    /// Last known navigation state
    nav_state: NavState,

    /// Last known navigation target
    target: Option<Waypoint>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LocalNavNode {
    /// Create a node watching the given controller.
    pub fn new(planner: LocalPlanner, nav: &NavCtrl) -> Self {
        Self {
            planner,
            nav: nav.handle(),
            state_rx: nav.subscribe_state(),
            target_rx: nav.subscribe_target(),
            nav_state: nav.state(),
            target: nav.path().front().cloned(),
        }
    }

    pub fn planner(&self) -> &LocalPlanner {
        &self.planner
    }

    /// Run one check. Returns true if the rover was interrupted.
    pub fn spin_once<L: LocSource>(&mut self, loc: &mut L) -> Result<bool, LocError> {
        if let Some(state) = latest(&self.state_rx) {
            self.nav_state = state;
        }
        if let Some(target) = latest(&self.target_rx) {
            self.target = Some(target);
        }

        if self.nav_state != NavState::Moving {
            return Ok(false);
        }

        let target = match self.target {
            Some(ref t) => t.position_m,
            None => return Ok(false),
        };

        let pose = loc.get_pose()?;

        match self.planner.collision_check(&pose.position_m, &target) {
            Some(collision) => {
                info!(
                    "Obstacle {:.3} m ahead at ({:.3}, {:.3}), interrupting",
                    collision.distance_m, collision.point_m.x, collision.point_m.y
                );

                self.nav.override_state(NavState::ObstacleDetected);

                // Wait for the controller to report back before checking again
                self.nav_state = NavState::ObstacleDetected;

                Ok(true)
            }
            None => {
                trace!("Path to ({:.3}, {:.3}) is clear", target.x, target.y);
                Ok(false)
            }
        }
    }

    /// Check every `period_s` until `stop` is set.
    pub fn run<L: LocSource>(
        mut self,
        loc: &mut L,
        period_s: f64,
        stop: &AtomicBool,
    ) -> Result<(), LocError> {
        while !stop.load(Ordering::Relaxed) {
            self.spin_once(loc)?;
            thread::sleep(seconds_to_std(period_s));
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::local_nav::geometry::distance;
    use crate::local_nav::LocalNavParams;
    use crate::motion_ctrl::{MotionCtrlParams, Platform};
    use crate::sim::{testing::HookedRover, SimParams, SimRover};
    use nalgebra::Point2;

    fn wall_params(x_m: f64) -> SimParams {
        SimParams {
            obstacles: vec![(0..=20).map(|i| [x_m, -1.0 + 0.1 * i as f64]).collect()],
            ..SimParams::default()
        }
    }

    #[test]
    fn test_only_checks_while_moving() {
        let (mut nav, handle) = NavCtrl::new(MotionCtrlParams::default());
        let planner = LocalPlanner::new(LocalNavParams::default());
        let mut rover = SimRover::new(wall_params(1.0));
        planner.update_obstacles(rover.sense_obstacles());

        let mut checker = planner.clone();
        let mut node = LocalNavNode::new(planner, &nav);

        // Idle, nothing to check against
        assert!(!node.spin_once(&mut rover).unwrap());

        handle.send_path(vec![Waypoint::new(4.0, 0.0, 0.0)]);
        nav.step(&mut rover, &mut checker).unwrap();
        assert_eq!(nav.state(), NavState::Moving);

        assert!(node.spin_once(&mut rover).unwrap());

        // Not repeated until the controller reports moving again
        assert!(!node.spin_once(&mut rover).unwrap());

        let states = nav.subscribe_state();
        nav.step(&mut rover, &mut checker).unwrap();
        assert_eq!(states.try_iter().next(), Some(NavState::ObstacleDetected));
        assert_eq!(nav.state(), NavState::Avoiding);
    }

    #[test]
    fn test_avoids_wall() {
        let (mut nav, handle) = NavCtrl::new(MotionCtrlParams::default());
        let states = nav.subscribe_state();
        let targets = nav.subscribe_target();

        let planner = LocalPlanner::new(LocalNavParams::default());
        let mut checker = planner.clone();
        let check_period_s = planner.params().check_period_s;

        let mut node = LocalNavNode::new(planner.clone(), &nav);
        let mut next_check_s = 0.0;

        // Sensor and local planner run against simulated time
        let mut rover = HookedRover::new(SimRover::new(wall_params(2.0)), move |r: &mut SimRover| {
            if r.elapsed_s() >= next_check_s {
                planner.update_obstacles(r.sense_obstacles());
                node.spin_once(r).unwrap();
                next_check_s += check_period_s;
            }
        });

        handle.send_path(vec![Waypoint::new(4.0, 0.0, 0.0)]);

        let mut idle = false;
        for _ in 0..1000 {
            nav.step(&mut rover, &mut checker).unwrap();
            if nav.is_idle() {
                idle = true;
                break;
            }
            rover.sleep(nav.params().cycle_period_s);
        }
        assert!(idle);

        let states: Vec<NavState> = states.try_iter().collect();
        assert!(states.contains(&NavState::ObstacleDetected));
        assert!(states.contains(&NavState::Avoiding));
        assert!(!states.contains(&NavState::Unreachable));

        // Went round the end of the wall
        let detour = targets
            .try_iter()
            .find(|t| t.position_m != Point2::new(4.0, 0.0))
            .unwrap();
        assert!((detour.position_m.x - 2.0).abs() < 0.1);
        assert!(detour.position_m.y.abs() > 1.0);

        let pose = rover.rover.get_pose().unwrap();
        assert!(distance(&pose.position_m, &Point2::new(4.0, 0.0)) <= 0.1);

        // Never passed through the wall
        assert!(rover
            .rover
            .trajectory()
            .iter()
            .all(|s| (s.pose.position_m.x - 2.0).abs() > 0.05 || s.pose.position_m.y.abs() > 1.0));

        // Sensor batches reached the shared cache
        assert_eq!(checker.obstacles().num_clusters(), 1);
    }
}
