//! Seed-based proximity clustering of landmark points.
//!
//! Points are scanned once in input order. Each point joins the first
//! existing cluster whose *seed* (first member) lies strictly closer than the
//! threshold; otherwise it seeds a new cluster. Distances are never measured
//! against non-seed members, so a chain of points each just under the
//! threshold from its predecessor still splits once it drifts away from the
//! seed. The partition is greedy and depends on input order.

use crate::point::{distance_sq, mean_point, Point3};

/// Default seed proximity threshold (spatial units, typically mm).
pub const DEFAULT_CLUSTER_THRESHOLD: f64 = 40.0;

/// Clustering parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// A point joins a cluster when its distance to the seed is strictly
    /// below this value.
    pub threshold: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CLUSTER_THRESHOLD,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(format!(
                "cluster threshold must be finite and > 0 (got {})",
                self.threshold
            ));
        }
        Ok(())
    }
}

/// A non-empty group of point indices; `members[0]` is the seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    members: Vec<usize>,
}

impl Cluster {
    fn seeded(index: usize) -> Self {
        Self {
            members: vec![index],
        }
    }

    /// Index of the point that opened this cluster.
    pub fn seed(&self) -> usize {
        self.members[0]
    }

    /// Member indices in assignment order.
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false`; clusters are created with their seed.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Partition `points` into seed clusters, returned in discovery order.
///
/// No distance is below a non-positive or NaN threshold, so every point
/// then forms its own cluster.
pub fn cluster_points(points: &[Point3], threshold: f64) -> Vec<Cluster> {
    if !(threshold > 0.0) {
        return (0..points.len()).map(Cluster::seeded).collect();
    }
    let t2 = threshold * threshold;
    let mut clusters: Vec<Cluster> = Vec::new();

    for (index, p) in points.iter().enumerate() {
        let hit = clusters
            .iter()
            .position(|c| distance_sq(&points[c.seed()], p) < t2);
        match hit {
            Some(ci) => clusters[ci].members.push(index),
            None => clusters.push(Cluster::seeded(index)),
        }
    }

    clusters
}

/// Centroid of one cluster together with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClusterCentroid {
    /// Component-wise mean of the member points.
    pub center: Point3,
    /// Number of member points in the originating cluster.
    pub size: usize,
    /// Position of the originating cluster in discovery order.
    pub discovery: usize,
}

/// Ordered centroids, one per cluster.
///
/// The order is the correspondence contract: entry `i` of one list is paired
/// with entry `i` of another.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CentroidList {
    pub entries: Vec<ClusterCentroid>,
}

impl CentroidList {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn points(&self) -> Vec<Point3> {
        self.entries.iter().map(|e| e.center).collect()
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.size).collect()
    }

    /// Stable reorder by ascending cluster size; equal sizes keep their
    /// current relative order.
    pub fn sorted_by_size(&self) -> Self {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|e| e.size);
        Self { entries }
    }
}

/// Mean of each cluster's member points, in cluster order.
pub fn centroids_of(points: &[Point3], clusters: &[Cluster]) -> CentroidList {
    let entries = clusters
        .iter()
        .enumerate()
        .filter_map(|(discovery, c)| {
            let center = mean_point(c.members.iter().map(|&i| &points[i]))?;
            Some(ClusterCentroid {
                center,
                size: c.len(),
                discovery,
            })
        })
        .collect();
    CentroidList { entries }
}

/// Cluster and reduce to centroids in one step.
pub fn cluster_centroids(points: &[Point3], threshold: f64) -> CentroidList {
    let clusters = cluster_points(points, threshold);
    centroids_of(points, &clusters)
}
