//! Endpoint snapping: merge near-coincident endpoints into clusters.
//!
//! All endpoints are bulk-loaded into an R\*-tree. Each endpoint queries
//! the tree for every other endpoint within the tolerance, and each pair
//! found is merged with union-find. Clusters are therefore the connected
//! components of the "within tolerance" relation, not cliques: a chain of
//! endpoints, each within tolerance of the next, collapses into a single
//! cluster even when its two ends are further apart than the tolerance.
//!
//! Each cluster's canonical point is the arithmetic mean of its members.
//!
//! Cost is `O(n log n)` for the bulk load plus one range query per
//! endpoint, so inputs with many thousands of endpoints stay fast.

use std::collections::HashSet;

use petgraph::unionfind::UnionFind;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::types::{CanonicalSegment, ClusterId, Point, Segment};

/// Endpoints that moved less than this are not counted as snapping events.
pub const SNAP_EVENT_THRESHOLD: f64 = 1e-9;

/// An endpoint tagged with its index in the input slice.
type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Immutable result of clustering: the canonical point of every cluster and
/// the cluster of every input endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapMap {
    canonical: Vec<Point>,
    assignment: Vec<ClusterId>,
}

impl SnapMap {
    /// Number of clusters.
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.canonical.len()
    }

    /// Number of endpoints that were clustered.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.assignment.len()
    }

    /// Cluster of the endpoint at `index` in the snapped slice.
    ///
    /// Returns `None` if `index` is out of range.
    #[must_use]
    pub fn cluster_of(&self, index: usize) -> Option<ClusterId> {
        self.assignment.get(index).copied()
    }

    /// Canonical point of a cluster.
    #[must_use]
    pub fn canonical(&self, id: ClusterId) -> Option<Point> {
        self.canonical.get(id.index()).copied()
    }

    /// Canonical points, indexed by [`ClusterId::index`].
    #[must_use]
    pub fn canonical_points(&self) -> &[Point] {
        &self.canonical
    }

    /// Cluster of every endpoint, in endpoint order.
    #[must_use]
    pub fn assignments(&self) -> &[ClusterId] {
        &self.assignment
    }

    /// Consume the map, keeping only the canonical points.
    #[must_use]
    pub fn into_canonical_points(self) -> Vec<Point> {
        self.canonical
    }
}

/// Cluster `points` so that any two within `tolerance` share a cluster.
///
/// Cluster ids follow the order in which each cluster's first member
/// appears in `points`.
#[must_use]
pub fn snap_points(points: &[Point], tolerance: f64) -> SnapMap {
    let n = points.len();
    let mut uf = UnionFind::<usize>::new(n);

    let tree = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(i, p)| IndexedPoint::new([p.x, p.y], i))
            .collect(),
    );

    let tolerance_squared = tolerance * tolerance;
    for (i, p) in points.iter().enumerate() {
        for neighbor in tree.locate_within_distance([p.x, p.y], tolerance_squared) {
            let j = neighbor.data;
            // Each pair is reported from both sides; merge it once.
            if j > i {
                uf.union(i, j);
            }
        }
    }

    // Label roots densely in order of first appearance.
    let mut label_of_root: Vec<Option<ClusterId>> = vec![None; n];
    let mut sums: Vec<(f64, f64, usize)> = Vec::new();
    let mut assignment = Vec::with_capacity(n);
    for (i, p) in points.iter().enumerate() {
        let root = uf.find_mut(i);
        let id = *label_of_root[root].get_or_insert_with(|| {
            sums.push((0.0, 0.0, 0));
            ClusterId(sums.len() - 1)
        });
        let sum = &mut sums[id.index()];
        sum.0 += p.x;
        sum.1 += p.y;
        sum.2 += 1;
        assignment.push(id);
    }

    #[allow(clippy::cast_precision_loss)]
    let canonical = sums
        .into_iter()
        .map(|(sx, sy, count)| Point::new(sx / count as f64, sy / count as f64))
        .collect();

    SnapMap {
        canonical,
        assignment,
    }
}

/// Endpoints of `segments` in snapping order: `2i` is segment `i`'s first
/// endpoint and `2i + 1` its second.
#[must_use]
pub fn endpoints(segments: &[Segment]) -> Vec<Point> {
    segments.iter().flat_map(|s| [s.a, s.b]).collect()
}

/// Snap the endpoints of `segments` and rewrite every segment in terms of
/// cluster ids.
///
/// The returned canonical segments are parallel to `segments`; self-loops
/// are kept here and removed by deduplication.
#[must_use]
pub fn snap_segments(segments: &[Segment], tolerance: f64) -> (SnapMap, Vec<CanonicalSegment>) {
    let map = snap_points(&endpoints(segments), tolerance);
    let canonical = map
        .assignment
        .chunks_exact(2)
        .map(|pair| CanonicalSegment::new(pair[0], pair[1]))
        .collect();
    (map, canonical)
}

/// Distinct original endpoint positions that moved by more than
/// [`SNAP_EVENT_THRESHOLD`] when replaced by their canonical point.
///
/// `points` must be the slice `map` was built from.
#[must_use]
pub fn snapping_events(points: &[Point], map: &SnapMap) -> Vec<Point> {
    let mut seen = HashSet::new();
    points
        .iter()
        .zip(&map.assignment)
        .filter(|&(p, &id)| p.distance(map.canonical[id.index()]) > SNAP_EVENT_THRESHOLD)
        .filter(|(p, _)| seen.insert((p.x.to_bits(), p.y.to_bits())))
        .map(|(p, _)| *p)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_has_no_clusters() {
        let map = snap_points(&[], 0.1);
        assert_eq!(map.cluster_count(), 0);
        assert_eq!(map.endpoint_count(), 0);
    }

    #[test]
    fn points_within_tolerance_share_a_cluster() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(0.05, 0.0),
            Point::new(5.0, 5.0),
        ];
        let map = snap_points(&points, 0.1);
        assert_eq!(map.cluster_count(), 2);
        assert_eq!(map.cluster_of(0), map.cluster_of(1));
        assert_ne!(map.cluster_of(0), map.cluster_of(2));
    }

    #[test]
    fn canonical_point_is_mean_of_members() {
        let points = [Point::new(0.0, 0.0), Point::new(0.08, 0.04)];
        let map = snap_points(&points, 0.1);
        let c = map.canonical(ClusterId(0)).unwrap();
        assert!((c.x - 0.04).abs() < 1e-12);
        assert!((c.y - 0.02).abs() < 1e-12);
    }

    #[test]
    fn cluster_ids_follow_first_appearance() {
        let points = [
            Point::new(9.0, 9.0),
            Point::new(0.0, 0.0),
            Point::new(9.0, 9.0),
            Point::new(4.0, 4.0),
        ];
        let map = snap_points(&points, 0.01);
        assert_eq!(
            map.assignments(),
            &[ClusterId(0), ClusterId(1), ClusterId(0), ClusterId(2)]
        );
    }

    #[test]
    fn chained_points_merge_transitively() {
        // Each neighbor is 0.08 apart; the ends are 0.24 apart, beyond the
        // 0.1 tolerance, but the chain still forms one cluster.
        let points: Vec<Point> = (0..4)
            .map(|i| Point::new(f64::from(i) * 0.08, 0.0))
            .collect();
        let map = snap_points(&points, 0.1);
        assert_eq!(map.cluster_count(), 1);
    }

    #[test]
    fn boundary_distance_is_inclusive() {
        let points = [Point::new(0.0, 0.0), Point::new(0.5, 0.0)];
        let map = snap_points(&points, 0.5);
        assert_eq!(map.cluster_count(), 1);
    }

    #[test]
    fn zero_tolerance_merges_only_identical_points() {
        let points = [
            Point::new(1.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 1.000_000_1),
        ];
        let map = snap_points(&points, 0.0);
        assert_eq!(map.cluster_count(), 2);
        assert_eq!(map.cluster_of(0), map.cluster_of(1));
    }

    #[test]
    fn resnapping_canonical_points_is_idempotent() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(0.03, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 0.04),
            Point::new(0.0, 0.02),
        ];
        let first = snap_points(&points, 0.1);
        let canonicalized: Vec<Point> = first
            .assignments()
            .iter()
            .map(|&id| first.canonical(id).unwrap())
            .collect();
        let second = snap_points(&canonicalized, 0.1);
        assert_eq!(first.assignments(), second.assignments());
        for (a, b) in first.canonical_points().iter().zip(second.canonical_points()) {
            assert!(a.distance(*b) < 1e-12);
        }
    }

    #[test]
    fn snap_segments_pairs_endpoints() {
        let segments = [
            Segment::new(Point::new(0.0, 0.0), Point::new(1.0, 0.0)),
            Segment::new(Point::new(1.00001, 0.0), Point::new(1.0, 1.0)),
        ];
        let (map, canonical) = snap_segments(&segments, 0.001);
        assert_eq!(map.cluster_count(), 3);
        assert_eq!(canonical[0].b, canonical[1].a);
    }

    #[test]
    fn snapping_events_lists_moved_positions_once() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(0.06, 0.0),
            Point::new(7.0, 7.0),
        ];
        let map = snap_points(&points, 0.1);
        let events = snapping_events(&points, &map);
        assert_eq!(events, vec![Point::new(0.0, 0.0), Point::new(0.06, 0.0)]);
    }

    #[test]
    fn many_points_on_a_grid_stay_separate() {
        let points: Vec<Point> = (0..50)
            .flat_map(|i| (0..50).map(move |j| Point::new(f64::from(i), f64::from(j))))
            .collect();
        let map = snap_points(&points, 0.1);
        assert_eq!(map.cluster_count(), 2500);
    }
}
