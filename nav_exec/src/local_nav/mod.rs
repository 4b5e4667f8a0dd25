//! # Local navigation module
//!
//! Local navigation watches the segment between the rover and its current
//! target for obstacles, and plans detours round them.
//!
//! Obstacles arrive as clusters of points which are held in an
//! [`ObstacleCache`]. Whenever a check is made the clusters are turned into
//! outlines (hulls, or the raw points for small clusters), the segment is
//! tested against every outline edge, and if a detour is wanted the
//! [`RecursiveBug`] planner is run against the outline that was hit.
//!
//! The [`LocalPlanner`] bundles these together and serves both the periodic
//! collision check run by the [`LocalNavNode`] and the waypoint check used by
//! the navigation state machine while avoiding.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod collision;
pub mod geometry;
pub mod hull;
pub mod node;
pub mod outline;
pub mod params;
pub mod recursive_bug;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{
    local_nav::{ObstacleClusters, Outline, WaypointCheckRep, WaypointCheckReq},
    pubsub::Publisher,
};
use log::{debug, info, warn};
use nalgebra::Point2;
use std::sync::{mpsc::Receiver, Arc};
use util::params as util_params;

use crate::motion_ctrl::{PathCheckError, PathChecker};

pub use collision::{check_path, Collision};
pub use hull::{DefaultHullBuilder, HullBuilder};
pub use node::LocalNavNode;
pub use outline::{ObstacleCache, OutlineStrategy, OutlineThresholds};
pub use params::LocalNavParams;
pub use recursive_bug::{DetourError, RecursiveBug, Side};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Collision checking and detour planning against the cached obstacles.
///
/// Clones share the same obstacle cache and outline publisher, so one clone
/// can be fed by the sensor while others check paths.
#[derive(Clone)]
pub struct LocalPlanner {
    params: LocalNavParams,

    obstacles: Arc<ObstacleCache>,

    hull: Arc<dyn HullBuilder>,

    bug: RecursiveBug,

    outline_pub: Arc<Publisher<Vec<Outline>>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LocalNavError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(util_params::LoadError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LocalPlanner {
    pub fn new(params: LocalNavParams) -> Self {
        let hull = DefaultHullBuilder::new(params.concavity, params.length_threshold_m);

        Self::with_hull_builder(params, Arc::new(hull))
    }

    /// Create a planner using a different hull implementation.
    pub fn with_hull_builder(params: LocalNavParams, hull: Arc<dyn HullBuilder>) -> Self {
        Self {
            bug: RecursiveBug::new(params.clearance_m(), params.sweep_max_deg),
            params,
            obstacles: Arc::new(ObstacleCache::new()),
            hull,
            outline_pub: Arc::new(Publisher::new("obstacle_outlines")),
        }
    }

    /// Initialise the planner from a parameter file.
    pub fn init(params_path: &str) -> Result<Self, LocalNavError> {
        let params = util_params::load(params_path).map_err(LocalNavError::ParamLoadError)?;

        Ok(Self::new(params))
    }

    pub fn params(&self) -> &LocalNavParams {
        &self.params
    }

    pub fn obstacles(&self) -> &Arc<ObstacleCache> {
        &self.obstacles
    }

    /// Replace the cached obstacles with a new sensor batch.
    pub fn update_obstacles(&self, batch: ObstacleClusters) {
        self.obstacles.update(batch);
    }

    /// Receive the outlines built by every check from now on.
    pub fn subscribe_outlines(&self) -> Receiver<Vec<Outline>> {
        self.outline_pub.subscribe()
    }

    /// Build outlines from the current obstacles and publish them.
    pub fn refresh_outlines(&self) -> Vec<Outline> {
        let outlines = self
            .obstacles
            .outlines(self.hull.as_ref(), &self.params.outline_thresholds);

        self.outline_pub.publish(outlines.clone());

        outlines
    }

    /// Look for a collision between the rover and the target close enough to
    /// warrant stopping.
    pub fn collision_check(&self, current: &Point2<f64>, target: &Point2<f64>) -> Option<Collision> {
        let outlines = self.refresh_outlines();

        let collision = check_path(current, target, &outlines)?;

        if collision.distance_m <= self.params.trigger_dist_m() {
            Some(collision)
        } else {
            debug!(
                "Collision at ({:.3}, {:.3}) is {:.3} m away, not yet in range",
                collision.point_m.x, collision.point_m.y, collision.distance_m
            );
            None
        }
    }

    /// Check the whole segment of the request, planning a detour if it is
    /// obstructed.
    pub fn waypoint_check(&self, req: &WaypointCheckReq) -> WaypointCheckRep {
        let outlines = self.refresh_outlines();

        let collision = match check_path(&req.current_m, &req.target_m, &outlines) {
            Some(c) => c,
            None => return WaypointCheckRep::Clear,
        };

        info!(
            "Path to ({:.3}, {:.3}) blocked at ({:.3}, {:.3})",
            req.target_m.x, req.target_m.y, collision.point_m.x, collision.point_m.y
        );

        let outline = &outlines[collision.outline_index];

        match self
            .bug
            .plan(&req.current_m, &req.target_m, &collision.point_m, outline)
        {
            Ok(p) => WaypointCheckRep::Detour(p),
            Err(e) => {
                warn!("Could not plan a detour: {}", e);
                WaypointCheckRep::NoDetour
            }
        }
    }
}

impl PathChecker for LocalPlanner {
    fn check_waypoint(&mut self, req: &WaypointCheckReq) -> Result<WaypointCheckRep, PathCheckError> {
        Ok(self.waypoint_check(req))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::local_nav::Cluster;

    fn p(x: f64, y: f64) -> Point2<f64> {
        Point2::new(x, y)
    }

    /// Wall along x = `x_m` from y = -1 to 1, sampled every 0.1 m.
    fn wall(x_m: f64) -> Cluster {
        (0..=20).map(|i| p(x_m, -1.0 + 0.1 * i as f64)).collect()
    }

    fn req(target: Point2<f64>) -> WaypointCheckReq {
        WaypointCheckReq {
            current_m: p(0.0, 0.0),
            target_m: target,
        }
    }

    #[test]
    fn test_no_obstacles_is_clear() {
        let planner = LocalPlanner::new(LocalNavParams::default());

        assert_eq!(planner.waypoint_check(&req(p(4.0, 0.0))), WaypointCheckRep::Clear);
        assert!(planner.collision_check(&p(0.0, 0.0), &p(4.0, 0.0)).is_none());
    }

    #[test]
    fn test_wall_gives_detour() {
        let planner = LocalPlanner::new(LocalNavParams::default());
        planner.update_obstacles(ObstacleClusters::new(vec![wall(2.0)]));

        let collision = planner.collision_check(&p(0.0, 0.0), &p(4.0, 0.0)).unwrap();
        assert!((collision.point_m.x - 2.0).abs() < 1e-9);
        assert!(collision.point_m.y.abs() < 1e-9);

        match planner.waypoint_check(&req(p(4.0, 0.0))) {
            WaypointCheckRep::Detour(d) => {
                assert!((d.x - 2.0).abs() < 0.01);
                assert!(d.y.abs() > 1.0 + planner.params().clearance_m() - 0.05);
            }
            r => panic!("Expected a detour, got {:?}", r),
        }

        // Target short of the wall
        assert_eq!(planner.waypoint_check(&req(p(1.5, 0.0))), WaypointCheckRep::Clear);
    }

    #[test]
    fn test_distant_collision_does_not_trigger() {
        let planner = LocalPlanner::new(LocalNavParams::default());
        planner.update_obstacles(ObstacleClusters::new(vec![wall(3.0)]));

        // 3 m away, trigger is at 2 m
        assert!(planner.collision_check(&p(0.0, 0.0), &p(4.0, 0.0)).is_none());
        assert!(planner.collision_check(&p(1.5, 0.0), &p(4.0, 0.0)).is_some());

        // The full check still sees it
        assert!(planner.waypoint_check(&req(p(4.0, 0.0))).changed());
    }

    #[test]
    fn test_narrow_obstacle_has_no_detour() {
        let planner = LocalPlanner::new(LocalNavParams::default());

        // Too narrow for a one degree step to see its ends
        planner.update_obstacles(ObstacleClusters::new(vec![vec![p(2.0, -0.01), p(2.0, 0.01)]]));

        assert_eq!(planner.waypoint_check(&req(p(4.0, 0.0))), WaypointCheckRep::NoDetour);
    }

    #[test]
    fn test_outlines_published() {
        let planner = LocalPlanner::new(LocalNavParams::default());
        let outlines = planner.subscribe_outlines();

        planner.update_obstacles(ObstacleClusters::new(vec![wall(2.0), vec![p(5.0, 5.0)]]));
        planner.clone().waypoint_check(&req(p(4.0, 0.0)));

        // Single points are dropped, the collinear wall reduces to its ends
        let published = outlines.try_recv().unwrap();
        assert_eq!(published, vec![Outline::new(vec![p(2.0, -1.0), p(2.0, 1.0)])]);
    }

    #[test]
    fn test_path_checker_impl() {
        let mut planner = LocalPlanner::new(LocalNavParams::default());

        let rep = planner.check_waypoint(&req(p(4.0, 0.0))).unwrap();
        assert_eq!(rep, WaypointCheckRep::Clear);
    }
}
