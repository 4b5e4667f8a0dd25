//! # Navigation library
//!
//! Local navigation core of the rover: turns a queue of waypoints into
//! velocity commands and routes around obstacles sensed as point clusters.
//!
//! - [`motion_ctrl`] holds the navigation state machine and the per-waypoint
//!   movement profile.
//! - [`local_nav`] holds the obstacle outline cache, collision detector and
//!   recursive bug detour planner.
//! - [`loc`] defines the localisation interface the above depend on.
//! - [`sim`] provides a simulated platform used by the executable and tests.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod local_nav;
pub mod loc;
pub mod motion_ctrl;
pub mod sim;
