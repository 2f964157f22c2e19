//! Index-based correspondence between two independently clustered sets.
//!
//! Both clusterings are reduced to [`CentroidList`]s and re-ordered so that
//! entry `i` of the reference list is assumed to match entry `i` of the
//! detected list. The default rule sorts each list by ascending cluster size,
//! which only holds when both sets come from the same physical landmark
//! arrangement at comparable clustering granularity.

use std::cmp::Ordering;

use crate::cluster::CentroidList;
use crate::point::{distance_sq, mean_point, Point3};

/// Clustered cardinalities differ between reference and detected sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrespondenceMismatch {
    pub reference: usize,
    pub detected: usize,
}

impl std::fmt::Display for CorrespondenceMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cluster count mismatch: {} reference vs {} detected",
            self.reference, self.detected
        )
    }
}

impl std::error::Error for CorrespondenceMismatch {}

/// Re-orders two centroid lists into positional correspondence.
///
/// Implementations may reorder each list but must not drop or duplicate
/// entries; cardinality validation is left to [`LandmarkPairs::from_ordered`].
pub trait CorrespondenceStrategy: Send + Sync {
    fn order(
        &self,
        reference: &CentroidList,
        detected: &CentroidList,
    ) -> (CentroidList, CentroidList);
}

/// Sort each list independently by ascending cluster size (stable).
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeOrder;

impl CorrespondenceStrategy for SizeOrder {
    fn order(
        &self,
        reference: &CentroidList,
        detected: &CentroidList,
    ) -> (CentroidList, CentroidList) {
        correspond(reference, detected, true)
    }
}

/// Keep both lists in discovery order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryOrder;

impl CorrespondenceStrategy for DiscoveryOrder {
    fn order(
        &self,
        reference: &CentroidList,
        detected: &CentroidList,
    ) -> (CentroidList, CentroidList) {
        correspond(reference, detected, false)
    }
}

/// Greedy nearest assignment after centring each list on its own mean.
///
/// The reference list keeps its discovery order; detected entries are
/// permuted to follow it. Only translation between the two frames is
/// compensated, so large rotations defeat this strategy. Lists of different
/// length are returned untouched so the mismatch still surfaces downstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestCentroid;

impl CorrespondenceStrategy for NearestCentroid {
    fn order(
        &self,
        reference: &CentroidList,
        detected: &CentroidList,
    ) -> (CentroidList, CentroidList) {
        if reference.len() != detected.len() || reference.is_empty() {
            return (reference.clone(), detected.clone());
        }

        let ref_pts = centred(&reference.points());
        let det_pts = centred(&detected.points());

        let n = ref_pts.len();
        let mut candidates: Vec<(f64, usize, usize)> = Vec::with_capacity(n * n);
        for (i, r) in ref_pts.iter().enumerate() {
            for (j, d) in det_pts.iter().enumerate() {
                candidates.push((distance_sq(r, d), i, j));
            }
        }
        candidates.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
        });

        let mut det_for_ref: Vec<Option<usize>> = vec![None; n];
        let mut det_taken = vec![false; n];
        for (_, i, j) in candidates {
            if det_for_ref[i].is_none() && !det_taken[j] {
                det_for_ref[i] = Some(j);
                det_taken[j] = true;
            }
        }

        let entries = det_for_ref
            .iter()
            .filter_map(|j| j.map(|j| detected.entries[j]))
            .collect();
        (reference.clone(), CentroidList { entries })
    }
}

fn centred(points: &[Point3]) -> Vec<Point3> {
    let Some(m) = mean_point(points.iter()) else {
        return Vec::new();
    };
    points
        .iter()
        .map(|p| [p[0] - m[0], p[1] - m[1], p[2] - m[2]])
        .collect()
}

/// Serializable selector over the built-in strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrespondenceMethod {
    /// k-th smallest reference cluster pairs with k-th smallest detected cluster.
    #[default]
    SizeOrder,
    /// Pair clusters in the order they were discovered.
    DiscoveryOrder,
    /// Greedy nearest pairing of mean-centred centroids.
    NearestCentroid,
}

impl CorrespondenceStrategy for CorrespondenceMethod {
    fn order(
        &self,
        reference: &CentroidList,
        detected: &CentroidList,
    ) -> (CentroidList, CentroidList) {
        match self {
            Self::SizeOrder => SizeOrder.order(reference, detected),
            Self::DiscoveryOrder => DiscoveryOrder.order(reference, detected),
            Self::NearestCentroid => NearestCentroid.order(reference, detected),
        }
    }
}

/// Order both centroid lists, optionally by ascending cluster size.
///
/// Output lengths equal input lengths; they match each other only when the
/// input cardinalities match.
pub fn correspond(
    reference: &CentroidList,
    detected: &CentroidList,
    sort_by_size: bool,
) -> (CentroidList, CentroidList) {
    if sort_by_size {
        (reference.sorted_by_size(), detected.sorted_by_size())
    } else {
        (reference.clone(), detected.clone())
    }
}

/// Validated landmark pairs for the rigid solver.
///
/// `fixed[i]` corresponds to `moving[i]`; both have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkPairs {
    pub fixed: Vec<Point3>,
    pub moving: Vec<Point3>,
}

impl LandmarkPairs {
    /// Pair ordered detected (fixed) and reference (moving) centroids.
    ///
    /// Fails instead of truncating or padding when the lists differ in length.
    pub fn from_ordered(
        detected: &CentroidList,
        reference: &CentroidList,
    ) -> Result<Self, CorrespondenceMismatch> {
        if detected.len() != reference.len() {
            return Err(CorrespondenceMismatch {
                reference: reference.len(),
                detected: detected.len(),
            });
        }
        Ok(Self {
            fixed: detected.points(),
            moving: reference.points(),
        })
    }

    pub fn len(&self) -> usize {
        self.fixed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterCentroid;

    fn list(items: &[(Point3, usize)]) -> CentroidList {
        CentroidList {
            entries: items
                .iter()
                .enumerate()
                .map(|(discovery, &(center, size))| ClusterCentroid {
                    center,
                    size,
                    discovery,
                })
                .collect(),
        }
    }

    #[test]
    fn size_sort_orders_non_decreasing_and_keeps_ties() {
        let a = list(&[([0.0; 3], 2), ([1.0; 3], 1), ([2.0; 3], 2), ([3.0; 3], 1)]);
        let b = list(&[([5.0; 3], 1), ([6.0; 3], 2), ([7.0; 3], 1), ([8.0; 3], 2)]);
        let (oa, ob) = correspond(&a, &b, true);

        for w in oa.sizes().windows(2) {
            assert!(w[0] <= w[1]);
        }
        let disc_a: Vec<usize> = oa.entries.iter().map(|e| e.discovery).collect();
        let disc_b: Vec<usize> = ob.entries.iter().map(|e| e.discovery).collect();
        assert_eq!(disc_a, vec![1, 3, 0, 2]);
        assert_eq!(disc_b, vec![0, 2, 1, 3]);
    }

    #[test]
    fn unsorted_correspond_keeps_discovery_order() {
        let a = list(&[([0.0; 3], 3), ([1.0; 3], 1)]);
        let (oa, _) = correspond(&a, &a, false);
        assert_eq!(oa, a);
    }

    #[test]
    fn mismatched_cardinality_is_rejected() {
        let a = list(&[([0.0; 3], 1), ([1.0; 3], 1)]);
        let b = list(&[([0.0; 3], 1), ([1.0; 3], 1), ([2.0; 3], 1)]);
        let (oa, ob) = SizeOrder.order(&a, &b);
        assert_ne!(oa.len(), ob.len());
        let err = LandmarkPairs::from_ordered(&ob, &oa).unwrap_err();
        assert_eq!(
            err,
            CorrespondenceMismatch {
                reference: 2,
                detected: 3
            }
        );
    }

    #[test]
    fn pairs_follow_positional_order() {
        let reference = list(&[([0.0, 0.0, 0.0], 1), ([10.0, 0.0, 0.0], 2)]);
        let detected = list(&[([5.0, 5.0, 5.0], 1), ([15.0, 5.0, 5.0], 2)]);
        let pairs = LandmarkPairs::from_ordered(&detected, &reference).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs.fixed[1], [15.0, 5.0, 5.0]);
        assert_eq!(pairs.moving[1], [10.0, 0.0, 0.0]);
    }

    #[test]
    fn nearest_centroid_recovers_shuffled_translation() {
        let reference = list(&[
            ([0.0, 0.0, 0.0], 1),
            ([100.0, 0.0, 0.0], 1),
            ([0.0, 80.0, 0.0], 1),
            ([0.0, 0.0, 60.0], 1),
        ]);
        let shift = [7.0, -3.0, 12.0];
        let shifted = |p: Point3| [p[0] + shift[0], p[1] + shift[1], p[2] + shift[2]];
        let detected = list(&[
            (shifted([0.0, 0.0, 60.0]), 1),
            (shifted([100.0, 0.0, 0.0]), 1),
            (shifted([0.0, 0.0, 0.0]), 1),
            (shifted([0.0, 80.0, 0.0]), 1),
        ]);

        let (oref, odet) = NearestCentroid.order(&reference, &detected);
        assert_eq!(oref, reference);
        for (r, d) in oref.entries.iter().zip(&odet.entries) {
            assert_eq!(shifted(r.center), d.center);
        }
    }

    #[test]
    fn nearest_centroid_leaves_mismatch_untouched() {
        let a = list(&[([0.0; 3], 1)]);
        let b = list(&[([0.0; 3], 1), ([1.0; 3], 1)]);
        let (oa, ob) = NearestCentroid.order(&a, &b);
        assert_eq!((oa.len(), ob.len()), (1, 2));
    }

    #[test]
    fn method_defaults_to_size_order() {
        assert_eq!(CorrespondenceMethod::default(), CorrespondenceMethod::SizeOrder);
        let json = serde_json::to_string(&CorrespondenceMethod::NearestCentroid).unwrap();
        assert_eq!(json, "\"nearest_centroid\"");
    }
}
