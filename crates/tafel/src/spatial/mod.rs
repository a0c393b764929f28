//! Read-only spatial index over the fragments of one page.
//!
//! Two structures back the index:
//!
//! - an R-tree (`rstar`) over fragment boxes for 2-D region, band and nearest-neighbour
//!   queries;
//! - sorted 1-D projections of fragment vertical centres and left edges, answering
//!   point-range queries with a binary search in `O(log n + k)`.
//!
//! The index is built once per page in `O(n log n)` and never mutated afterwards. An
//! empty fragment set yields a valid, empty index whose queries all return nothing.

use crate::types::{BoundingBox, Fragment, FragmentId};
use rstar::{AABB, Envelope, PointDistance, RTree, RTreeObject};

/// Envelope for R-tree spatial indexing
#[derive(Debug, Clone, Copy)]
struct FragmentEnvelope {
    aabb: AABB<[f64; 2]>,
    id: FragmentId,
}

impl RTreeObject for FragmentEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

impl PointDistance for FragmentEnvelope {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.aabb.distance_2(point)
    }
}

#[derive(Debug)]
pub struct SpatialIndex {
    tree: RTree<FragmentEnvelope>,
    extent: Option<BoundingBox>,
    by_y_center: Vec<(f64, FragmentId)>,
    by_left_edge: Vec<(f64, FragmentId)>,
}

impl SpatialIndex {
    pub fn new(fragments: &[Fragment]) -> Self {
        let envelopes: Vec<FragmentEnvelope> = fragments
            .iter()
            .enumerate()
            .map(|(id, fragment)| {
                let bbox = fragment.bbox();
                FragmentEnvelope {
                    aabb: AABB::from_corners([bbox.x, bbox.y], [bbox.right(), bbox.bottom()]),
                    id,
                }
            })
            .collect();

        let extent = fragments.iter().map(|f| *f.bbox()).reduce(|acc, bbox| acc.union(&bbox));

        let mut by_y_center: Vec<(f64, FragmentId)> =
            fragments.iter().enumerate().map(|(id, f)| (f.y_center(), id)).collect();
        by_y_center.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut by_left_edge: Vec<(f64, FragmentId)> =
            fragments.iter().enumerate().map(|(id, f)| (f.left(), id)).collect();
        by_left_edge.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        Self {
            tree: RTree::bulk_load(envelopes),
            extent,
            by_y_center,
            by_left_edge,
        }
    }

    pub fn len(&self) -> usize {
        self.by_y_center.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_y_center.is_empty()
    }

    /// Bounding box of every indexed fragment.
    pub fn extent(&self) -> Option<BoundingBox> {
        self.extent
    }

    /// Fragments in ascending vertical-centre order (ties by id).
    pub fn y_center_order(&self) -> &[(f64, FragmentId)] {
        &self.by_y_center
    }

    /// Fragments whose vertical extent intersects `[y_min, y_max]`, sorted by id.
    pub fn query_vertical(&self, y_min: f64, y_max: f64) -> Vec<FragmentId> {
        let Some(extent) = self.extent else {
            return Vec::new();
        };
        self.query_envelope(AABB::from_corners([extent.x, y_min], [extent.right(), y_max]))
    }

    /// Fragments whose horizontal extent intersects `[x_min, x_max]`, sorted by id.
    pub fn query_horizontal(&self, x_min: f64, x_max: f64) -> Vec<FragmentId> {
        let Some(extent) = self.extent else {
            return Vec::new();
        };
        self.query_envelope(AABB::from_corners([x_min, extent.y], [x_max, extent.bottom()]))
    }

    /// Fragments whose box intersects `region` (touching edges count), sorted by id.
    pub fn query_region(&self, region: &BoundingBox) -> Vec<FragmentId> {
        if self.extent.is_none() {
            return Vec::new();
        }
        self.query_envelope(AABB::from_corners(
            [region.x, region.y],
            [region.right(), region.bottom()],
        ))
    }

    /// Up to `k` fragments nearest to `(x, y)`, closest first, within `max_distance`.
    ///
    /// Distance is measured to the fragment box, so a point inside a box has distance 0.
    pub fn find_nearest(&self, x: f64, y: f64, k: usize, max_distance: f64) -> Vec<FragmentId> {
        let max_distance_2 = max_distance * max_distance;
        self.tree
            .nearest_neighbor_iter_with_distance_2(&[x, y])
            .take_while(|(_, distance_2)| *distance_2 <= max_distance_2)
            .take(k)
            .map(|(envelope, _)| envelope.id)
            .collect()
    }

    /// Fragments whose vertical centre lies in `[lo, hi]`, in vertical-centre order.
    pub fn y_center_range(&self, lo: f64, hi: f64) -> Vec<FragmentId> {
        range_of(&self.by_y_center, lo, hi)
    }

    /// Fragments whose left edge lies in `[lo, hi]`, in left-edge order.
    pub fn left_edge_range(&self, lo: f64, hi: f64) -> Vec<FragmentId> {
        range_of(&self.by_left_edge, lo, hi)
    }

    fn query_envelope(&self, envelope: AABB<[f64; 2]>) -> Vec<FragmentId> {
        let mut ids: Vec<FragmentId> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

fn range_of(sorted: &[(f64, FragmentId)], lo: f64, hi: f64) -> Vec<FragmentId> {
    if lo > hi {
        return Vec::new();
    }
    let start = sorted.partition_point(|(value, _)| *value < lo);
    let end = sorted.partition_point(|(value, _)| *value <= hi);
    sorted[start..end.max(start)].iter().map(|(_, id)| *id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(x: f64, y: f64, w: f64, h: f64) -> Fragment {
        Fragment::new("t", BoundingBox::new(x, y, w, h), 0, None).unwrap()
    }

    fn sample() -> Vec<Fragment> {
        vec![
            fragment(10.0, 10.0, 50.0, 10.0),
            fragment(110.0, 10.0, 50.0, 10.0),
            fragment(10.0, 40.0, 50.0, 10.0),
            fragment(110.0, 40.0, 50.0, 10.0),
            fragment(300.0, 200.0, 20.0, 10.0),
        ]
    }

    #[test]
    fn test_empty_index() {
        let index = SpatialIndex::new(&[]);
        assert!(index.is_empty());
        assert_eq!(index.extent(), None);
        assert!(index.query_vertical(0.0, 100.0).is_empty());
        assert!(index.query_horizontal(0.0, 100.0).is_empty());
        assert!(index.query_region(&BoundingBox::new(0.0, 0.0, 10.0, 10.0)).is_empty());
        assert!(index.find_nearest(0.0, 0.0, 3, 100.0).is_empty());
        assert!(index.y_center_range(0.0, 100.0).is_empty());
    }

    #[test]
    fn test_query_vertical_band() {
        let index = SpatialIndex::new(&sample());
        assert_eq!(index.query_vertical(12.0, 14.0), vec![0, 1]);
        assert_eq!(index.query_vertical(0.0, 45.0), vec![0, 1, 2, 3]);
        assert!(index.query_vertical(60.0, 70.0).is_empty());
    }

    #[test]
    fn test_query_horizontal_band() {
        let index = SpatialIndex::new(&sample());
        assert_eq!(index.query_horizontal(120.0, 130.0), vec![1, 3]);
        assert_eq!(index.query_horizontal(305.0, 306.0), vec![4]);
    }

    #[test]
    fn test_query_region() {
        let index = SpatialIndex::new(&sample());
        let region = BoundingBox::new(100.0, 0.0, 100.0, 30.0);
        assert_eq!(index.query_region(&region), vec![1]);
    }

    #[test]
    fn test_find_nearest_respects_k_and_distance() {
        let index = SpatialIndex::new(&sample());
        assert_eq!(index.find_nearest(35.0, 15.0, 1, 5.0), vec![0]);
        assert_eq!(index.find_nearest(35.0, 15.0, 2, 100.0).len(), 2);
        assert!(index.find_nearest(600.0, 600.0, 3, 10.0).is_empty());
    }

    #[test]
    fn test_y_center_range_inclusive() {
        let index = SpatialIndex::new(&sample());
        assert_eq!(index.y_center_range(15.0, 15.0), vec![0, 1]);
        assert_eq!(index.y_center_range(15.0, 45.0), vec![0, 1, 2, 3]);
        assert!(index.y_center_range(50.0, 40.0).is_empty());
    }

    #[test]
    fn test_left_edge_range() {
        let index = SpatialIndex::new(&sample());
        assert_eq!(index.left_edge_range(100.0, 120.0), vec![1, 3]);
    }

    #[test]
    fn test_y_center_order_sorted() {
        let index = SpatialIndex::new(&sample());
        let order = index.y_center_order();
        assert_eq!(order.len(), 5);
        assert!(order.windows(2).all(|w| w[0].0 <= w[1].0));
    }
}
