//! # Geometry primitives
//!
//! Line intersection and distance helpers shared by the hull builders, the
//! collision detector and the detour planner.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Point2;

pub use util::maths::shortest_turn;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A line through two points in general form, `a*x + b*y = c`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Line {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Line {
    pub fn through(p1: &Point2<f64>, p2: &Point2<f64>) -> Self {
        let a = p2.y - p1.y;
        let b = p1.x - p2.x;

        Self {
            a,
            b,
            c: a * p1.x + b * p1.y,
        }
    }

    /// Point where two lines cross, or `None` if they are parallel.
    pub fn intersection(&self, other: &Line) -> Option<Point2<f64>> {
        let det = self.a * other.b - other.a * self.b;

        if det == 0.0 {
            return None;
        }

        Some(Point2::new(
            (other.b * self.c - self.b * other.c) / det,
            (self.a * other.c - other.a * self.c) / det,
        ))
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Euclidean distance between two points.
pub fn distance(a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    nalgebra::distance(a, b)
}

/// Intersection point of segments `(p1, p2)` and `(q1, q2)`.
///
/// The point where the two infinite lines cross is accepted only if it lies
/// within the bounding boxes of both segments. Boundary points count.
/// Parallel segments never intersect.
pub fn segments_intersect(
    p1: &Point2<f64>,
    p2: &Point2<f64>,
    q1: &Point2<f64>,
    q2: &Point2<f64>,
) -> Option<Point2<f64>> {
    let x = Line::through(p1, p2).intersection(&Line::through(q1, q2))?;

    if in_bounding_box(&x, p1, p2) && in_bounding_box(&x, q1, q2) {
        Some(x)
    } else {
        None
    }
}

/// True if `p` lies within the axis aligned box spanned by `a` and `b`,
/// inclusive.
pub fn in_bounding_box(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Shortest distance from `p` to the segment `(a, b)`.
pub fn distance_to_segment(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();

    if len_sq == 0.0 {
        return distance(p, a);
    }

    let t = ((p - a).dot(&ab) / len_sq).max(0.0).min(1.0);

    distance(p, &(a + ab * t))
}

/// Z component of the cross product of `(a - o)` and `(b - o)`. Positive if
/// `o, a, b` turn anticlockwise.
pub fn cross(o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64) -> Point2<f64> {
        Point2::new(x, y)
    }

    #[test]
    fn test_crossing_segments() {
        let x = segments_intersect(&p(0.0, 0.0), &p(4.0, 0.0), &p(2.0, -1.0), &p(2.0, 1.0));
        assert_eq!(x, Some(p(2.0, 0.0)));

        let x = segments_intersect(&p(0.0, 0.0), &p(2.0, 2.0), &p(0.0, 2.0), &p(2.0, 0.0));
        assert_eq!(x, Some(p(1.0, 1.0)));
    }

    #[test]
    fn test_symmetry() {
        let (p1, p2, q1, q2) = (p(0.0, 0.0), p(4.0, 0.0), p(2.0, -1.0), p(2.0, 1.0));
        let expected = Some(p(2.0, 0.0));

        assert_eq!(segments_intersect(&p2, &p1, &q1, &q2), expected);
        assert_eq!(segments_intersect(&p1, &p2, &q2, &q1), expected);
        assert_eq!(segments_intersect(&q1, &q2, &p1, &p2), expected);
        assert_eq!(segments_intersect(&q2, &q1, &p2, &p1), expected);
    }

    #[test]
    fn test_no_intersection() {
        // Parallel
        assert_eq!(
            segments_intersect(&p(0.0, 0.0), &p(4.0, 0.0), &p(0.0, 1.0), &p(4.0, 1.0)),
            None
        );

        // Collinear overlapping segments are parallel too
        assert_eq!(
            segments_intersect(&p(0.0, 0.0), &p(4.0, 0.0), &p(1.0, 0.0), &p(5.0, 0.0)),
            None
        );

        // Lines cross but outside the first segment
        assert_eq!(
            segments_intersect(&p(0.0, 0.0), &p(1.0, 0.0), &p(2.0, -1.0), &p(2.0, 1.0)),
            None
        );

        // Segment would touch at its end point if it were longer
        assert_eq!(
            segments_intersect(&p(0.0, 0.0), &p(4.0, 0.0), &p(2.0, 0.5), &p(2.0, 1.0)),
            None
        );
    }

    #[test]
    fn test_boundary_counts() {
        // Touching exactly at an end point
        assert_eq!(
            segments_intersect(&p(0.0, 0.0), &p(4.0, 0.0), &p(2.0, 0.0), &p(2.0, 1.0)),
            Some(p(2.0, 0.0))
        );
        assert_eq!(
            segments_intersect(&p(0.0, 0.0), &p(2.0, 0.0), &p(2.0, -1.0), &p(2.0, 1.0)),
            Some(p(2.0, 0.0))
        );
    }

    #[test]
    fn test_distance_to_segment() {
        assert_relative_eq!(distance_to_segment(&p(1.0, 1.0), &p(0.0, 0.0), &p(2.0, 0.0)), 1.0);
        assert_relative_eq!(distance_to_segment(&p(3.0, 0.0), &p(0.0, 0.0), &p(2.0, 0.0)), 1.0);
        assert_relative_eq!(distance_to_segment(&p(0.0, 2.0), &p(0.0, 0.0), &p(0.0, 0.0)), 2.0);
    }

    #[test]
    fn test_cross() {
        assert!(cross(&p(0.0, 0.0), &p(1.0, 0.0), &p(0.0, 1.0)) > 0.0);
        assert!(cross(&p(0.0, 0.0), &p(0.0, 1.0), &p(1.0, 0.0)) < 0.0);
        assert_eq!(cross(&p(0.0, 0.0), &p(1.0, 1.0), &p(2.0, 2.0)), 0.0);
    }
}
