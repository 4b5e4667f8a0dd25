//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the navigation
//! software: the messages exchanged between nodes and the in-process
//! publish/subscribe mechanism used to carry them.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Navigation commands, states, waypoints and velocity commands
pub mod nav;

/// Local navigation messages (obstacle clusters, outlines, waypoint checks)
pub mod local_nav;

/// Topic style fan-out over channels
pub mod pubsub;
