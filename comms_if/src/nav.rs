//! # Navigation messages
//!
//! Messages consumed and produced by the navigation state machine.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A target position and heading the rover should visit.
///
/// The heading is a yaw angle about the vertical axis, no other rotation is
/// represented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Position of the waypoint in the map frame
    pub position_m: Point2<f64>,

    /// Heading to hold once the waypoint is reached, anticlockwise from +X
    pub heading_rad: f64,

    /// Time on the navigation clock at which the waypoint became the target
    #[serde(default)]
    pub stamp_s: Option<f64>,

    /// Frame the position is expressed in
    #[serde(default)]
    pub frame_id: Option<String>,
}

/// Velocity demand sent to the platform.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCmd {
    /// Forward speed
    pub linear_ms: f64,

    /// Yaw rate, positive anticlockwise
    pub angular_rads: f64,
}

/// Error raised when converting an unknown byte into a [`NavState`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognised navigation state code {0}")]
pub struct NavStateCodeError(pub u8);

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Top level navigation state.
///
/// On the wire each state is a single byte, see [`NavState::code`]. Code 7 was
/// used by a checking state which no longer exists and is rejected.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavState {
    Ready,
    Moving,
    Avoiding,
    PoseReached,
    Error,
    Unreachable,
    ObstacleDetected,
    Stop,
}

/// Commands accepted by the navigation state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NavCmd {
    /// A new path to follow, front first
    Path(Vec<Waypoint>),

    /// Force the state machine into the state with the given byte code
    StateOverride(u8),

    /// Stop immediately and drop the path
    EmergencyStop,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Waypoint {
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            position_m: Point2::new(x_m, y_m),
            heading_rad,
            stamp_s: None,
            frame_id: None,
        }
    }

    /// Return a copy of this waypoint stamped with the given navigation clock
    /// time and frame.
    pub fn stamped(&self, frame_id: &str, time_s: f64) -> Self {
        Self {
            stamp_s: Some(time_s),
            frame_id: Some(frame_id.to_string()),
            ..self.clone()
        }
    }
}

impl VelocityCmd {
    /// Zero velocity command.
    pub fn stop() -> Self {
        Self::default()
    }

    /// Pure forward motion.
    pub fn linear(linear_ms: f64) -> Self {
        Self {
            linear_ms,
            angular_rads: 0.0,
        }
    }

    /// Turn on the spot.
    pub fn point_turn(angular_rads: f64) -> Self {
        Self {
            linear_ms: 0.0,
            angular_rads,
        }
    }

    pub fn is_stop(&self) -> bool {
        self.linear_ms == 0.0 && self.angular_rads == 0.0
    }
}

impl NavState {
    /// Single byte code used on the wire.
    pub fn code(&self) -> u8 {
        match self {
            NavState::Ready => 0,
            NavState::Moving => 1,
            NavState::Avoiding => 2,
            NavState::PoseReached => 3,
            NavState::Error => 4,
            NavState::Unreachable => 5,
            NavState::ObstacleDetected => 6,
            NavState::Stop => 8,
        }
    }
}

impl From<NavState> for u8 {
    fn from(state: NavState) -> Self {
        state.code()
    }
}

impl TryFrom<u8> for NavState {
    type Error = NavStateCodeError;

    fn try_from(code: u8) -> Result<Self, NavStateCodeError> {
        match code {
            0 => Ok(NavState::Ready),
            1 => Ok(NavState::Moving),
            2 => Ok(NavState::Avoiding),
            3 => Ok(NavState::PoseReached),
            4 => Ok(NavState::Error),
            5 => Ok(NavState::Unreachable),
            6 => Ok(NavState::ObstacleDetected),
            8 => Ok(NavState::Stop),
            c => Err(NavStateCodeError(c)),
        }
    }
}

impl fmt::Display for NavState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NavState::Ready => "READY",
            NavState::Moving => "MOVING",
            NavState::Avoiding => "AVOIDING",
            NavState::PoseReached => "POSE_REACHED",
            NavState::Error => "ERROR",
            NavState::Unreachable => "UNREACHABLE",
            NavState::ObstacleDetected => "OBSTACLE_DETECTED",
            NavState::Stop => "STOP",
        };

        write!(f, "{}", name)
    }
}

impl NavCmd {
    /// Parse a command from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_nav_state_codes() {
        for code in 0u8..=255 {
            match NavState::try_from(code) {
                Ok(state) => assert_eq!(u8::from(state), code),
                Err(e) => {
                    assert!(code == 7 || code > 8);
                    assert_eq!(e, NavStateCodeError(code));
                }
            }
        }
    }

    #[test]
    fn test_nav_cmd_json() {
        let cmd = NavCmd::from_json(
            r#"{"Path": [{"position_m": [1.0, 2.0], "heading_rad": 0.5}]}"#,
        )
        .unwrap();

        assert_eq!(cmd, NavCmd::Path(vec![Waypoint::new(1.0, 2.0, 0.5)]));

        assert_eq!(
            NavCmd::from_json(r#"{"StateOverride": 6}"#).unwrap(),
            NavCmd::StateOverride(6)
        );
        assert_eq!(
            NavCmd::from_json(r#""EmergencyStop""#).unwrap(),
            NavCmd::EmergencyStop
        );
        assert!(NavCmd::from_json(r#"{"Teleport": 1}"#).is_err());
    }

    #[test]
    fn test_stamped_waypoint() {
        let wp = Waypoint::new(1.0, 0.0, 0.0);
        let stamped = wp.stamped("map", 12.5);

        assert_eq!(stamped.position_m, wp.position_m);
        assert_eq!(stamped.stamp_s, Some(12.5));
        assert_eq!(stamped.frame_id.as_deref(), Some("map"));
        assert!(wp.stamp_s.is_none());
    }
}
