//! # Local navigation messages
//!
//! Obstacle data flowing into the local planner and the waypoint check
//! service it provides to the navigation state machine.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// The points belonging to one sensed object.
pub type Cluster = Vec<Point2<f64>>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A batch of obstacle clusters from one sensor sweep. Each batch replaces
/// the previous one entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObstacleClusters {
    pub clusters: Vec<Cluster>,

    #[serde(default)]
    pub stamp: Option<DateTime<Utc>>,
}

/// Boundary of an obstacle.
///
/// Edges join consecutive points. Polygons are stored as closed rings, i.e.
/// the first point is repeated at the end, while sparse clusters are kept as
/// open chains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub points: Vec<Point2<f64>>,
}

/// Request to check the straight segment between two positions.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointCheckReq {
    pub current_m: Point2<f64>,
    pub target_m: Point2<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Response of the waypoint check service.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum WaypointCheckRep {
    /// Nothing obstructs the segment
    Clear,

    /// The segment is obstructed, go via this point first
    Detour(Point2<f64>),

    /// The segment is obstructed and no way round was found
    NoDetour,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ObstacleClusters {
    pub fn new(clusters: Vec<Cluster>) -> Self {
        Self {
            clusters,
            stamp: Some(Utc::now()),
        }
    }
}

impl Outline {
    pub fn new(points: Vec<Point2<f64>>) -> Self {
        Self { points }
    }

    /// Iterate over the edges of the outline as pairs of points.
    pub fn edges(&self) -> impl Iterator<Item = (&Point2<f64>, &Point2<f64>)> {
        self.points.windows(2).map(|w| (&w[0], &w[1]))
    }

    pub fn num_edges(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl WaypointCheckRep {
    /// True if the check found the segment obstructed.
    pub fn changed(&self) -> bool {
        !matches!(self, WaypointCheckRep::Clear)
    }
}
