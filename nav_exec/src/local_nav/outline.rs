//! # Obstacle outline cache
//!
//! Holds the latest batch of obstacle clusters and turns them into outlines
//! on request. Sensor updates and outline refreshes go through a single lock
//! so a refresh always sees one complete batch.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::local_nav::{Cluster, ObstacleClusters, Outline};
use log::{debug, trace};
use serde::Deserialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::hull::HullBuilder;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Cluster sizes at which each outline strategy applies.
#[derive(Debug, Copy, Clone, Deserialize)]
pub struct OutlineThresholds {
    /// Clusters with at least this many points get a concave hull
    pub concave_min_points: usize,

    /// Clusters with at least this many points (and fewer than
    /// `concave_min_points`) get a convex hull
    pub convex_min_points: usize,

    /// Smaller clusters with at least this many points are used as they are,
    /// anything smaller is dropped
    pub min_points: usize,
}

/// The most recent obstacle clusters.
#[derive(Debug, Default)]
pub struct ObstacleCache {
    clusters: Mutex<Vec<Cluster>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How a cluster is converted into an outline.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutlineStrategy {
    Concave,
    Convex,
    Passthrough,
    Drop,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for OutlineThresholds {
    fn default() -> Self {
        Self {
            concave_min_points: 11,
            convex_min_points: 6,
            min_points: 2,
        }
    }
}

impl OutlineStrategy {
    /// Select the strategy for a cluster of `num_points` points.
    pub fn for_cluster_size(num_points: usize, thresholds: &OutlineThresholds) -> Self {
        if num_points >= thresholds.concave_min_points {
            OutlineStrategy::Concave
        } else if num_points >= thresholds.convex_min_points {
            OutlineStrategy::Convex
        } else if num_points >= thresholds.min_points {
            OutlineStrategy::Passthrough
        } else {
            OutlineStrategy::Drop
        }
    }

    /// Apply the strategy to a cluster.
    pub fn apply(&self, cluster: &[nalgebra::Point2<f64>], hull: &dyn HullBuilder) -> Option<Outline> {
        match self {
            OutlineStrategy::Concave => Some(Outline::new(hull.concave_hull(cluster))),
            OutlineStrategy::Convex => Some(Outline::new(hull.convex_hull(cluster))),
            OutlineStrategy::Passthrough => Some(Outline::new(cluster.to_vec())),
            OutlineStrategy::Drop => None,
        }
    }
}

impl ObstacleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached clusters with a new batch.
    pub fn update(&self, batch: ObstacleClusters) {
        let num = batch.clusters.len();
        *self.lock() = batch.clusters;
        trace!("Obstacle cache updated with {} clusters", num);
    }

    /// Remove all cached clusters.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn num_clusters(&self) -> usize {
        self.lock().len()
    }

    /// Build outlines from the current clusters.
    ///
    /// The lock is held for the whole computation so a concurrent update
    /// cannot be seen half applied.
    pub fn outlines(&self, hull: &dyn HullBuilder, thresholds: &OutlineThresholds) -> Vec<Outline> {
        let clusters = self.lock();

        let outlines: Vec<Outline> = clusters
            .iter()
            .filter_map(|c| OutlineStrategy::for_cluster_size(c.len(), thresholds).apply(c, hull))
            .filter(|o| !o.is_empty())
            .collect();

        debug!(
            "Built {} outlines from {} clusters",
            outlines.len(),
            clusters.len()
        );

        outlines
    }

    /// Poisoning only means a writer panicked mid update, the data is a
    /// whole batch either way.
    fn lock(&self) -> MutexGuard<'_, Vec<Cluster>> {
        self.clusters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
