//! # Recursive bug detour planner
//!
//! Routes round a single obstacle by finding where sight lines from the rover
//! stop touching it (the extreme, or tangent, points), then offsetting the
//! better extreme away from the obstacle by a clearance radius.
//!
//! The result is local to one obstacle. It is not checked against any other
//! obstacle, the caller is expected to check the new leg again.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::local_nav::Outline;
use log::{debug, trace};
use nalgebra::{Point2, Vector2};
use thiserror::Error;
use util::maths::{clamp, truncate_mm};

use super::geometry::{distance, segments_intersect};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// An extreme closer than this to the collision point is the collision point
/// itself, reached by the first ray of the sweep.
const DEGENERATE_EXTREME_M: f64 = 1e-6;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a detour could not be planned.
#[derive(Debug, Error, PartialEq)]
pub enum DetourError {
    #[error("The obstacle outline has no edges")]
    EmptyOutline,

    #[error("No extreme point found either side of the collision")]
    NoExtremes,

    #[error("Detour geometry is degenerate, result ({0}, {1}) is not finite")]
    NonFinite(f64, f64),
}

/// Which way round the obstacle the detour goes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Side {
    /// Anticlockwise sweep
    Left,
    /// Clockwise sweep
    Right,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Planner configuration.
#[derive(Debug, Copy, Clone)]
pub struct RecursiveBug {
    /// Standoff kept from the obstacle's extreme point
    pub clearance_m: f64,

    /// Largest angle swept either side of the direct bearing
    pub sweep_max_deg: u32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Side {
    fn sign(&self) -> f64 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }
}

impl RecursiveBug {
    pub fn new(clearance_m: f64, sweep_max_deg: u32) -> Self {
        Self {
            clearance_m,
            sweep_max_deg,
        }
    }

    /// Plan a detour waypoint from `current` towards `target` round the
    /// obstacle `outline`, which the direct segment hits at `collision`.
    ///
    /// The returned point is truncated to millimetre precision.
    pub fn plan(
        &self,
        current: &Point2<f64>,
        target: &Point2<f64>,
        collision: &Point2<f64>,
        outline: &Outline,
    ) -> Result<Point2<f64>, DetourError> {
        if outline.num_edges() == 0 {
            return Err(DetourError::EmptyOutline);
        }

        let is_real = |e: &Point2<f64>| distance(e, collision) > DEGENERATE_EXTREME_M;

        let left = self.sweep(current, target, outline, Side::Left).filter(is_real);
        let right = self.sweep(current, target, outline, Side::Right).filter(is_real);

        trace!("Extremes: left {:?}, right {:?}", left, right);

        // Pick the side giving the shorter path, right wins a tie
        let path_len = |e: &Point2<f64>| distance(e, current) + distance(e, target);
        let (extreme, side) = match (left, right) {
            (Some(l), Some(r)) => {
                if path_len(&l) < path_len(&r) {
                    (l, Side::Left)
                } else {
                    (r, Side::Right)
                }
            }
            (Some(l), None) => (l, Side::Left),
            (None, Some(r)) => (r, Side::Right),
            (None, None) => return Err(DetourError::NoExtremes),
        };

        let new_point = self.offset_extreme(current, collision, &extreme, side);

        if !new_point.x.is_finite() || !new_point.y.is_finite() {
            return Err(DetourError::NonFinite(new_point.x, new_point.y));
        }

        let new_point = Point2::new(truncate_mm(new_point.x), truncate_mm(new_point.y));

        debug!(
            "Detour round {:?} extreme ({:.3}, {:.3}) via ({:.3}, {:.3})",
            side, extreme.x, extreme.y, new_point.x, new_point.y
        );

        Ok(new_point)
    }

    /// Sweep rays of the direct segment's length out from `current` in one
    /// direction, one degree at a time. The hit of the last ray to touch the
    /// outline is the extreme on that side.
    pub fn sweep(
        &self,
        current: &Point2<f64>,
        target: &Point2<f64>,
        outline: &Outline,
        side: Side,
    ) -> Option<Point2<f64>> {
        let bearing = (target.y - current.y).atan2(target.x - current.x);
        let range = distance(current, target);

        let mut extreme = None;

        for i in 0..=self.sweep_max_deg {
            let angle = bearing + side.sign() * (i as f64).to_radians();
            let end = current + Vector2::new(angle.cos(), angle.sin()) * range;

            let hit = outline
                .edges()
                .find_map(|(e0, e1)| segments_intersect(current, &end, e0, e1));

            match hit {
                Some(h) => extreme = Some(h),
                None => break,
            }
        }

        extreme
    }

    /// Move the extreme point away from the collision point, along the line
    /// joining them, by the clearance radius, and return the result as seen
    /// from `current`.
    ///
    /// This solves the triangles (current, collision, extreme) and
    /// (current, extreme, new point) with the law of cosines, producing a
    /// non-finite result when either triangle is degenerate.
    fn offset_extreme(
        &self,
        current: &Point2<f64>,
        collision: &Point2<f64>,
        extreme: &Point2<f64>,
        side: Side,
    ) -> Point2<f64> {
        let d_col = distance(current, collision);
        let d_ext = distance(current, extreme);
        let d_ext_col = distance(extreme, collision);
        let d_new_col = d_ext_col + self.clearance_m;

        // Angle at the collision point between the extreme and the rover
        let angle_col = acos(
            (d_ext_col.powi(2) + d_col.powi(2) - d_ext.powi(2)) / (2.0 * d_ext_col * d_col),
        );

        let d_new = (d_new_col.powi(2) + d_col.powi(2)
            - 2.0 * d_new_col * d_col * angle_col.cos())
        .sqrt();

        // Angle at the rover between the extreme and the new point
        let angle_ext_new = acos(
            (d_ext.powi(2) + d_new.powi(2) - self.clearance_m.powi(2)) / (2.0 * d_ext * d_new),
        ) * side.sign();

        let angle_ext = (extreme.y - current.y).atan2(extreme.x - current.x);
        let angle_new = angle_ext + angle_ext_new;

        current + Vector2::new(angle_new.cos(), angle_new.sin()) * d_new
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Arc cosine tolerant of rounding just outside [-1, 1]. Non-finite input,
/// from a zero length side, gives NaN.
fn acos(x: f64) -> f64 {
    if !x.is_finite() {
        return std::f64::NAN;
    }
    clamp(&x, &-1.0, &1.0).acos()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::local_nav::geometry::distance_to_segment;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64) -> Point2<f64> {
        Point2::new(x, y)
    }

    /// Error from sweeping in whole degrees at 2 m range
    const SWEEP_TOL_M: f64 = 0.05;

    /// Bearings of the direct line, stepping round the full circle without
    /// landing on an axis
    fn bearings() -> impl Iterator<Item = f64> {
        (0..22).map(|k| 0.3 + 0.29 * k as f64)
    }

    /// Point given in a frame whose x axis lies along `bearing`.
    fn rotated(bearing: f64, x: f64, y: f64) -> Point2<f64> {
        let (s, c) = bearing.sin_cos();
        Point2::new(x * c - y * s, x * s + y * c)
    }

    /// Sideways offset of `q` from the line along `bearing`, positive left.
    fn lateral(bearing: f64, q: &Point2<f64>) -> f64 {
        let (s, c) = bearing.sin_cos();
        -q.x * s + q.y * c
    }

    fn distance_to_outline(q: &Point2<f64>, outline: &Outline) -> f64 {
        outline
            .edges()
            .map(|(a, b)| distance_to_segment(q, a, b))
            .fold(std::f64::INFINITY, f64::min)
    }

    #[test]
    fn test_sweep_finds_segment_ends() {
        let planner = RecursiveBug::new(0.15, 180);
        let wall = Outline::new(vec![p(2.0, -1.0), p(2.0, 1.0)]);

        let left = planner
            .sweep(&p(0.0, 0.0), &p(4.0, 0.0), &wall, Side::Left)
            .unwrap();
        let right = planner
            .sweep(&p(0.0, 0.0), &p(4.0, 0.0), &wall, Side::Right)
            .unwrap();

        // 26 degrees is the last ray to hit a 1 m half wall 2 m away
        assert_relative_eq!(left.x, 2.0, epsilon = 1e-9);
        assert_relative_eq!(left.y, 2.0 * 26f64.to_radians().tan(), epsilon = 1e-9);
        assert_relative_eq!(right.y, -left.y, epsilon = 1e-9);
    }

    #[test]
    fn test_detour_round_perpendicular_wall() {
        let clearance_m = 0.15;
        let planner = RecursiveBug::new(clearance_m, 180);
        let wall = Outline::new(vec![p(2.0, -1.0), p(2.0, 1.0)]);

        let detour = planner
            .plan(&p(0.0, 0.0), &p(4.0, 0.0), &p(2.0, 0.0), &wall)
            .unwrap();

        // Offset sideways past the end of the wall, by at least the clearance
        assert_relative_eq!(detour.x, 2.0, epsilon = 0.002);
        assert!(detour.y.abs() >= 1.0 + clearance_m - SWEEP_TOL_M);
        assert!(
            distance_to_segment(&detour, &p(2.0, -1.0), &p(2.0, 1.0))
                >= clearance_m - SWEEP_TOL_M
        );

        // And truncated to the millimetre
        assert_relative_eq!(detour.x * 1000.0, (detour.x * 1000.0).round(), epsilon = 1e-6);
        assert_relative_eq!(detour.y * 1000.0, (detour.y * 1000.0).round(), epsilon = 1e-6);
    }

    #[test]
    fn test_detour_prefers_shorter_side() {
        let planner = RecursiveBug::new(0.15, 180);

        // Wall sticks out much further on the left
        let wall = Outline::new(vec![p(2.0, -0.5), p(2.0, 1.5)]);

        let detour = planner
            .plan(&p(0.0, 0.0), &p(4.0, 0.0), &p(2.0, 0.0), &wall)
            .unwrap();

        assert!(detour.y < -0.5);
    }

    #[test]
    fn test_clearance_increases_distance_from_extreme() {
        let wall = Outline::new(vec![p(2.0, -1.0), p(2.0, 1.0)]);

        let near = RecursiveBug::new(0.1, 180)
            .plan(&p(0.0, 0.0), &p(4.0, 0.0), &p(2.0, 0.0), &wall)
            .unwrap();
        let far = RecursiveBug::new(0.4, 180)
            .plan(&p(0.0, 0.0), &p(4.0, 0.0), &p(2.0, 0.0), &wall)
            .unwrap();

        assert_relative_eq!(far.y.abs() - near.y.abs(), 0.3, epsilon = 0.002);
    }

    #[test]
    fn test_planning_failures() {
        let planner = RecursiveBug::new(0.15, 180);

        assert_eq!(
            planner.plan(&p(0.0, 0.0), &p(4.0, 0.0), &p(2.0, 0.0), &Outline::default()),
            Err(DetourError::EmptyOutline)
        );

        // Outline nowhere near the direct line, so the first ray misses both
        // ways
        let far_wall = Outline::new(vec![p(10.0, 5.0), p(10.0, 6.0)]);
        assert_eq!(
            planner.plan(&p(0.0, 0.0), &p(4.0, 0.0), &p(2.0, 0.0), &far_wall),
            Err(DetourError::NoExtremes)
        );

        // Rover sitting on the collision point
        let wall = Outline::new(vec![p(2.0, -1.0), p(2.0, 1.0)]);
        assert!(matches!(
            planner.plan(&p(2.0, 0.0), &p(4.0, 0.0), &p(2.0, 0.0), &wall),
            Err(DetourError::NonFinite(_, _)) | Err(DetourError::NoExtremes)
        ));
    }

    #[test]
    fn test_narrow_obstacle_has_no_extremes_at_any_bearing() {
        let planner = RecursiveBug::new(0.15, 180);

        for b in bearings() {
            let post = Outline::new(vec![rotated(b, 2.0, -0.01), rotated(b, 2.0, 0.01)]);

            assert_eq!(
                planner.plan(&p(0.0, 0.0), &rotated(b, 4.0, 0.0), &rotated(b, 2.0, 0.0), &post),
                Err(DetourError::NoExtremes),
                "bearing {}",
                b
            );
        }
    }

    #[test]
    fn test_detour_takes_the_real_side_at_any_bearing() {
        let clearance_m = 0.15;
        let planner = RecursiveBug::new(clearance_m, 180);

        for b in bearings() {
            // Barely any wall on the left, 1 m of it on the right
            let wall = Outline::new(vec![rotated(b, 2.0, -1.0), rotated(b, 2.0, 0.01)]);

            let detour = planner
                .plan(&p(0.0, 0.0), &rotated(b, 4.0, 0.0), &rotated(b, 2.0, 0.0), &wall)
                .unwrap();

            assert!(lateral(b, &detour) < -1.0, "bearing {}: {:?}", b, detour);
            assert!(
                distance_to_outline(&detour, &wall) >= clearance_m - SWEEP_TOL_M,
                "bearing {}: {:?}",
                b,
                detour
            );
        }
    }

    #[test]
    fn test_detour_clears_closed_box_at_any_bearing() {
        let clearance_m = 0.15;
        let planner = RecursiveBug::new(clearance_m, 180);

        for b in bearings() {
            let corners = [(2.0, -1.0), (3.0, -1.0), (3.0, 1.0), (2.0, 1.0), (2.0, -1.0)];
            let crate_outline = Outline::new(
                corners.iter().map(|&(x, y)| rotated(b, x, y)).collect(),
            );

            let detour = planner
                .plan(&p(0.0, 0.0), &rotated(b, 4.0, 0.0), &rotated(b, 2.0, 0.0), &crate_outline)
                .unwrap();

            // Out past one of the box's sides, not pulled back onto the line
            assert!(lateral(b, &detour).abs() > 1.0, "bearing {}: {:?}", b, detour);
            assert!(
                distance_to_outline(&detour, &crate_outline) >= clearance_m - SWEEP_TOL_M,
                "bearing {}: {:?}",
                b,
                detour
            );
        }
    }
}
