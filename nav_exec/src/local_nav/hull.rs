//! # Hull builders
//!
//! Convex and concave hull computation used to turn obstacle clusters into
//! outlines. The planner only sees these through the [`HullBuilder`] trait so
//! alternative implementations can be swapped in.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Point2;
use std::cmp::Ordering;

use super::geometry::{cross, distance, distance_to_segment, segments_intersect};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Capability to build hulls around a set of points.
///
/// Polygons are returned as closed rings (first point repeated last). Inputs
/// too small or too degenerate to enclose an area may be returned as an open
/// chain.
pub trait HullBuilder: Send + Sync {
    fn convex_hull(&self, points: &[Point2<f64>]) -> Vec<Point2<f64>>;

    fn concave_hull(&self, points: &[Point2<f64>]) -> Vec<Point2<f64>>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Monotone chain convex hull, with edge digging for the concave hull.
#[derive(Debug, Copy, Clone)]
pub struct DefaultHullBuilder {
    /// An edge is dug into when its length divided by the distance from the
    /// candidate point to its nearest end exceeds this ratio. Larger values
    /// give a hull closer to convex.
    pub concavity: f64,

    /// Edges shorter than this are never dug into.
    pub length_threshold_m: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DefaultHullBuilder {
    pub fn new(concavity: f64, length_threshold_m: f64) -> Self {
        Self {
            concavity,
            length_threshold_m,
        }
    }
}

impl HullBuilder for DefaultHullBuilder {
    fn convex_hull(&self, points: &[Point2<f64>]) -> Vec<Point2<f64>> {
        close_ring(convex_ring(points))
    }

    fn concave_hull(&self, points: &[Point2<f64>]) -> Vec<Point2<f64>> {
        let mut ring = convex_ring(points);

        if ring.len() < 3 {
            return close_ring(ring);
        }

        // Everything not already on the ring is a candidate to dig towards
        let mut inner: Vec<Point2<f64>> = sorted_unique(points)
            .into_iter()
            .filter(|p| !ring.contains(p))
            .collect();

        // Each pass inserts at most one point per edge, and every insertion
        // consumes a candidate, so this terminates.
        loop {
            let mut dug = false;
            let mut i = 0;

            while i < ring.len() && !inner.is_empty() {
                let a = ring[i];
                let b = ring[(i + 1) % ring.len()];

                if let Some(idx) = self.dig_candidate(&ring, i, &a, &b, &inner) {
                    let p = inner.swap_remove(idx);
                    ring.insert(i + 1, p);
                    dug = true;
                }

                i += 1;
            }

            if !dug || inner.is_empty() {
                break;
            }
        }

        close_ring(ring)
    }
}

impl DefaultHullBuilder {
    /// Find the candidate to insert between ring points `i` and `i + 1`.
    fn dig_candidate(
        &self,
        ring: &[Point2<f64>],
        i: usize,
        a: &Point2<f64>,
        b: &Point2<f64>,
        inner: &[Point2<f64>],
    ) -> Option<usize> {
        let edge_len = distance(a, b);

        if edge_len <= self.length_threshold_m {
            return None;
        }

        // Nearest inner point to this edge
        let (idx, p) = inner
            .iter()
            .enumerate()
            .min_by(|(_, p), (_, q)| {
                distance_to_segment(p, a, b)
                    .partial_cmp(&distance_to_segment(q, a, b))
                    .unwrap_or(Ordering::Equal)
            })?;

        // Only dig towards points for which this is the nearest edge
        let edge_dist = distance_to_segment(p, a, b);
        let n = ring.len();
        let nearer_edge = (0..n)
            .filter(|&j| j != i)
            .any(|j| distance_to_segment(p, &ring[j], &ring[(j + 1) % n]) < edge_dist);

        if nearer_edge {
            return None;
        }

        let near_end = distance(p, a).min(distance(p, b));

        if near_end <= 0.0 || edge_len / near_end <= self.concavity {
            return None;
        }

        // The new edges must not cross any other edge of the ring
        for j in 0..n {
            if j == i {
                continue;
            }

            let e0 = &ring[j];
            let e1 = &ring[(j + 1) % n];

            for (s0, s1) in [(a, p), (p, b)].iter() {
                let shares_end = e0 == *s0 || e0 == *s1 || e1 == *s0 || e1 == *s1;
                if !shares_end && segments_intersect(s0, s1, e0, e1).is_some() {
                    return None;
                }
            }
        }

        // No remaining point may be cut off by carving the triangle out
        let cuts_off = inner
            .iter()
            .enumerate()
            .any(|(k, q)| k != idx && strictly_inside_triangle(q, a, p, b));

        if cuts_off {
            None
        } else {
            Some(idx)
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Convex hull as an open anticlockwise ring, collinear points excluded.
fn convex_ring(points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let pts = sorted_unique(points);

    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point2<f64>> = Vec::with_capacity(pts.len());
    for p in pts.iter() {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0
        {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point2<f64>> = Vec::with_capacity(pts.len());
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0
        {
            upper.pop();
        }
        upper.push(*p);
    }

    // Last point of each chain is the first of the other
    lower.pop();
    upper.pop();
    lower.extend(upper);

    lower
}

/// Finite points sorted by x then y, duplicates removed.
fn sorted_unique(points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut pts: Vec<Point2<f64>> = points
        .iter()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .cloned()
        .collect();

    pts.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
    });
    pts.dedup();

    pts
}

/// Repeat the first point at the end if the ring encloses an area.
fn close_ring(mut ring: Vec<Point2<f64>>) -> Vec<Point2<f64>> {
    if ring.len() >= 3 {
        ring.push(ring[0]);
    }
    ring
}

fn strictly_inside_triangle(
    q: &Point2<f64>,
    a: &Point2<f64>,
    b: &Point2<f64>,
    c: &Point2<f64>,
) -> bool {
    let d1 = cross(a, b, q);
    let d2 = cross(b, c, q);
    let d3 = cross(c, a, q);

    (d1 > 0.0 && d2 > 0.0 && d3 > 0.0) || (d1 < 0.0 && d2 < 0.0 && d3 < 0.0)
}

#[cfg(test)]
mod test {
    use super::*;

    fn p(x: f64, y: f64) -> Point2<f64> {
        Point2::new(x, y)
    }

    /// Shoelace area of a closed ring
    fn area(ring: &[Point2<f64>]) -> f64 {
        ring.windows(2)
            .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
            .sum::<f64>()
            .abs()
            / 2.0
    }

    #[test]
    fn test_convex_hull() {
        let builder = DefaultHullBuilder::new(2.0, 0.0);

        let pts = vec![
            p(0.0, 0.0),
            p(2.0, 0.0),
            p(2.0, 2.0),
            p(0.0, 2.0),
            p(1.0, 1.0),
            p(0.5, 1.5),
            p(1.0, 0.0),
        ];

        let hull = builder.convex_hull(&pts);

        assert_eq!(hull.len(), 5);
        assert_eq!(hull.first(), hull.last());
        for corner in [p(0.0, 0.0), p(2.0, 0.0), p(2.0, 2.0), p(0.0, 2.0)].iter() {
            assert!(hull.contains(corner));
        }
        assert!((area(&hull) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_hulls() {
        let builder = DefaultHullBuilder::new(2.0, 0.0);

        // Too few points, or all collinear, give an open chain
        assert_eq!(builder.convex_hull(&[p(0.0, 0.0), p(1.0, 0.0)]).len(), 2);
        assert_eq!(
            builder.convex_hull(&[p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0)]),
            vec![p(0.0, 0.0), p(2.0, 0.0)]
        );
        assert!(builder.concave_hull(&[]).is_empty());
        assert_eq!(builder.convex_hull(&[p(f64::NAN, 0.0), p(1.0, 1.0)]), vec![p(1.0, 1.0)]);
    }

    #[test]
    fn test_concave_hull_digs_notch() {
        let builder = DefaultHullBuilder::new(1.5, 0.1);

        let pts = vec![p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0), p(0.0, 4.0), p(2.0, 3.5)];

        let convex = builder.convex_hull(&pts);
        let concave = builder.concave_hull(&pts);

        assert_eq!(
            concave,
            vec![p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0), p(2.0, 3.5), p(0.0, 4.0), p(0.0, 0.0)]
        );
        assert!((area(&convex) - 16.0).abs() < 1e-12);
        assert!((area(&concave) - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_concave_hull_keeps_shallow_points() {
        // The inner point is too far from the top edge to be worth digging to
        let builder = DefaultHullBuilder::new(2.0, 0.1);

        let pts = vec![p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0), p(0.0, 4.0), p(2.0, 3.5)];

        assert_eq!(builder.concave_hull(&pts), builder.convex_hull(&pts));
    }
}
