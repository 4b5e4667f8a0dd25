//! Platform wrappers used by tests.

use comms_if::nav::VelocityCmd;

use super::SimRover;
use crate::loc::{LocError, LocSource, Pose, Velocity};
use crate::motion_ctrl::Platform;

/// A [`SimRover`] which calls a hook after every sleep, allowing tests to
/// inject commands or run other nodes against simulated time.
pub struct HookedRover<F: FnMut(&mut SimRover)> {
    pub rover: SimRover,
    hook: F,
}

impl<F: FnMut(&mut SimRover)> HookedRover<F> {
    pub fn new(rover: SimRover, hook: F) -> Self {
        Self { rover, hook }
    }
}

impl<F: FnMut(&mut SimRover)> LocSource for HookedRover<F> {
    fn get_pose(&mut self) -> Result<Pose, LocError> {
        self.rover.get_pose()
    }

    fn get_velocity(&mut self) -> Result<Velocity, LocError> {
        self.rover.get_velocity()
    }
}

impl<F: FnMut(&mut SimRover)> Platform for HookedRover<F> {
    fn send_cmd_vel(&mut self, cmd: VelocityCmd) {
        self.rover.send_cmd_vel(cmd)
    }

    fn sleep(&mut self, dur_s: f64) {
        self.rover.sleep(dur_s);
        (self.hook)(&mut self.rover);
    }

    fn elapsed_s(&self) -> f64 {
        self.rover.elapsed_s()
    }
}
