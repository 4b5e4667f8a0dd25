//! # Collision detector
//!
//! Tests a straight path segment against every edge of every outline.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::local_nav::Outline;
use nalgebra::Point2;

use super::geometry::{distance, segments_intersect};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The collision nearest the start of a checked segment.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Collision {
    /// Where the segment meets the outline
    pub point_m: Point2<f64>,

    /// Index of the outline that was hit
    pub outline_index: usize,

    /// Distance from the start of the segment to `point_m`
    pub distance_m: f64,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Find the collision between segment `(p1, p2)` and the outlines which lies
/// nearest to `p1`.
///
/// Ties are won by the outline (and edge) found first.
pub fn check_path(p1: &Point2<f64>, p2: &Point2<f64>, outlines: &[Outline]) -> Option<Collision> {
    let mut nearest: Option<Collision> = None;

    for (outline_index, outline) in outlines.iter().enumerate() {
        for (e0, e1) in outline.edges() {
            let point_m = match segments_intersect(p1, p2, e0, e1) {
                Some(x) => x,
                None => continue,
            };

            let distance_m = distance(p1, &point_m);

            let closer = match nearest {
                Some(ref n) => distance_m < n.distance_m,
                None => true,
            };

            if closer {
                nearest = Some(Collision {
                    point_m,
                    outline_index,
                    distance_m,
                });
            }
        }
    }

    nearest
}

#[cfg(test)]
mod test {
    use super::*;

    fn p(x: f64, y: f64) -> Point2<f64> {
        Point2::new(x, y)
    }

    fn wall(x: f64) -> Outline {
        Outline::new(vec![p(x, -1.0), p(x, 1.0)])
    }

    #[test]
    fn test_single_segment() {
        let outlines = vec![wall(2.0)];

        let c = check_path(&p(0.0, 0.0), &p(4.0, 0.0), &outlines).unwrap();
        assert_eq!(c.point_m, p(2.0, 0.0));
        assert_eq!(c.outline_index, 0);
        assert_eq!(c.distance_m, 2.0);
    }

    #[test]
    fn test_nearest_to_start() {
        let outlines = vec![wall(3.0), wall(2.0)];

        let c = check_path(&p(0.0, 0.0), &p(4.0, 0.0), &outlines).unwrap();
        assert_eq!(c.point_m, p(2.0, 0.0));
        assert_eq!(c.outline_index, 1);

        // Measured from the start, so reversing the segment changes the answer
        let c = check_path(&p(4.0, 0.0), &p(0.0, 0.0), &outlines).unwrap();
        assert_eq!(c.point_m, p(3.0, 0.0));
        assert_eq!(c.outline_index, 0);
    }

    #[test]
    fn test_ties_go_to_first_outline() {
        let outlines = vec![wall(2.0), wall(2.0)];

        let c = check_path(&p(0.0, 0.0), &p(4.0, 0.0), &outlines).unwrap();
        assert_eq!(c.outline_index, 0);
    }

    #[test]
    fn test_closed_polygon_edges() {
        // Square whose only crossed edge is the closing one
        let square = Outline::new(vec![
            p(2.0, 1.0),
            p(3.0, 1.0),
            p(3.0, -1.0),
            p(2.0, -1.0),
            p(2.0, 1.0),
        ]);

        let c = check_path(&p(0.0, 0.0), &p(2.5, 0.0), &[square]).unwrap();
        assert_eq!(c.point_m, p(2.0, 0.0));
    }

    #[test]
    fn test_no_collision() {
        assert_eq!(check_path(&p(0.0, 0.0), &p(4.0, 0.0), &[]), None);
        assert_eq!(check_path(&p(0.0, 0.0), &p(1.0, 0.0), &[wall(2.0)]), None);
        assert_eq!(
            check_path(&p(0.0, 0.0), &p(4.0, 0.0), &[Outline::new(vec![p(2.0, 0.0)])]),
            None
        );
    }

    #[test]
    fn test_idempotent() {
        let outlines = vec![wall(3.0), wall(2.0), wall(2.5)];
        let first = check_path(&p(0.0, 0.1), &p(4.0, -0.2), &outlines);

        for _ in 0..10 {
            assert_eq!(check_path(&p(0.0, 0.1), &p(4.0, -0.2), &outlines), first);
        }
    }
}
