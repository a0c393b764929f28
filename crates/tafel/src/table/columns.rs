//! Column boundary detection.
//!
//! Column starts are found by clustering fragment left edges within a table region. A
//! cluster's centre (the mean of its edges) becomes a column start; each column extends
//! to the next start, and the last one to the region's right-most fragment edge.
//!
//! Clusters whose centres sit closer than `min_column_width` are merged: the smaller
//! cluster is dissolved and each of its edges moves to the nearest remaining centre.

use crate::core::config::ReconstructionConfig;
use crate::spatial::SpatialIndex;
use crate::types::{ColumnBoundary, Fragment, FragmentId};
use crate::utils::{mean, median};
use ahash::AHashSet;

/// Column boundaries for one region plus the epsilon used to find them.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    pub columns: Vec<ColumnBoundary>,
    pub epsilon: f64,
}

/// Horizontal distance below which two left edges are considered the same column start.
pub fn column_epsilon(fragments: &[Fragment], ids: &[FragmentId], config: &ReconstructionConfig) -> f64 {
    let widths: Vec<f64> = ids.iter().map(|&id| fragments[id].bbox().width).collect();
    match median(&widths) {
        Some(width) => {
            (width * config.column_epsilon_factor).clamp(config.min_column_epsilon, config.max_column_epsilon)
        }
        None => config.min_column_epsilon,
    }
}

/// Derive ordered, non-overlapping column boundaries for the fragments `ids`.
///
/// Left edges are read in ascending order from the page's left-edge projection, keeping
/// only the members of the region. Returns an empty layout for an empty region.
pub fn align_columns(
    fragments: &[Fragment],
    index: &SpatialIndex,
    ids: &[FragmentId],
    config: &ReconstructionConfig,
) -> ColumnLayout {
    let epsilon = column_epsilon(fragments, ids, config);

    let (lo, hi) = ids
        .iter()
        .map(|&id| fragments[id].left())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| (lo.min(x), hi.max(x)));
    let members: AHashSet<FragmentId> = ids.iter().copied().collect();
    let edges: Vec<f64> = index
        .left_edge_range(lo, hi)
        .into_iter()
        .filter(|id| members.contains(id))
        .map(|id| fragments[id].left())
        .collect();
    if edges.is_empty() {
        return ColumnLayout {
            columns: Vec::new(),
            epsilon,
        };
    }

    let mut clusters: Vec<Vec<f64>> = Vec::new();
    for edge in edges {
        match clusters.last_mut() {
            Some(cluster) if cluster.last().is_some_and(|&last| edge - last <= epsilon) => cluster.push(edge),
            _ => clusters.push(vec![edge]),
        }
    }

    merge_narrow_clusters(&mut clusters, config.min_column_width);

    let starts = cluster_centers(&clusters);
    let right_edge = ids
        .iter()
        .map(|&id| fragments[id].right())
        .fold(f64::NEG_INFINITY, f64::max);

    let columns = starts
        .iter()
        .enumerate()
        .map(|(i, &x_start)| ColumnBoundary {
            x_start,
            x_end: starts.get(i + 1).copied().unwrap_or(right_edge.max(x_start)),
        })
        .collect();

    ColumnLayout { columns, epsilon }
}

fn cluster_centers(clusters: &[Vec<f64>]) -> Vec<f64> {
    clusters
        .iter()
        .map(|cluster| mean(cluster).unwrap_or(0.0))
        .collect()
}

fn merge_narrow_clusters(clusters: &mut Vec<Vec<f64>>, min_column_width: f64) {
    while clusters.len() > 1 {
        let centers = cluster_centers(clusters);
        let Some(i) = centers.windows(2).position(|pair| pair[1] - pair[0] < min_column_width) else {
            break;
        };

        // Fewer members dissolves; on a tie the right-hand cluster goes.
        let dissolve = if clusters[i + 1].len() > clusters[i].len() { i } else { i + 1 };
        let dissolved_center = centers[dissolve];
        let orphans = clusters.remove(dissolve);
        let mut remaining = centers;
        remaining.remove(dissolve);

        tracing::trace!(
            center = dissolved_center,
            edges = orphans.len(),
            "Merging narrow column cluster"
        );

        for edge in orphans {
            if let Some(target) = nearest_boundary(&remaining, edge) {
                clusters[target].push(edge);
            }
        }
        clusters.sort_by(|a, b| mean(a).unwrap_or(0.0).total_cmp(&mean(b).unwrap_or(0.0)));
    }
}

/// Index of the start closest to `x` by absolute distance; ties go to the left-most.
pub fn nearest_boundary(starts: &[f64], x: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &start) in starts.iter().enumerate() {
        let distance = (start - x).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((i, distance)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn fragment(x: f64, y: f64, width: f64) -> Fragment {
        Fragment::new("v", BoundingBox::new(x, y, width, 10.0), 0, None).unwrap()
    }

    fn all_ids(fragments: &[Fragment]) -> Vec<FragmentId> {
        (0..fragments.len()).collect()
    }

    fn align_all(fragments: &[Fragment], config: &ReconstructionConfig) -> ColumnLayout {
        align_columns(fragments, &SpatialIndex::new(fragments), &all_ids(fragments), config)
    }

    #[test]
    fn test_column_epsilon_from_median_width() {
        let config = ReconstructionConfig::default();
        let fragments = vec![fragment(0.0, 0.0, 40.0), fragment(100.0, 0.0, 60.0), fragment(200.0, 0.0, 50.0)];
        assert_eq!(column_epsilon(&fragments, &all_ids(&fragments), &config), 25.0);
        assert_eq!(column_epsilon(&fragments, &[], &config), config.min_column_epsilon);
    }

    #[test]
    fn test_align_columns_three_columns() {
        let config = ReconstructionConfig::default();
        let mut fragments = Vec::new();
        for row in 0..3 {
            for col in 0..3 {
                fragments.push(fragment(10.0 + col as f64 * 100.0, row as f64 * 30.0, 50.0));
            }
        }
        let layout = align_all(&fragments, &config);

        assert_eq!(layout.epsilon, 25.0);
        assert_eq!(
            layout.columns,
            vec![
                ColumnBoundary { x_start: 10.0, x_end: 110.0 },
                ColumnBoundary { x_start: 110.0, x_end: 210.0 },
                ColumnBoundary { x_start: 210.0, x_end: 260.0 },
            ]
        );
    }

    #[test]
    fn test_align_columns_tolerates_edge_jitter() {
        let config = ReconstructionConfig::default();
        let fragments = vec![
            fragment(10.0, 0.0, 50.0),
            fragment(14.0, 30.0, 50.0),
            fragment(112.0, 0.0, 50.0),
            fragment(108.0, 30.0, 50.0),
        ];
        let layout = align_all(&fragments, &config);
        assert_eq!(layout.columns.len(), 2);
        assert_eq!(layout.columns[0].x_start, 12.0);
        assert_eq!(layout.columns[1].x_start, 110.0);
    }

    #[test]
    fn test_align_columns_merges_narrow_clusters() {
        let config = ReconstructionConfig {
            min_column_epsilon: 1.0,
            column_epsilon_factor: 0.01,
            ..Default::default()
        };
        // Starts at 10 (x2), 15 (x1) and 100 (x2): 10 and 15 are closer than
        // min_column_width, so the single-member cluster at 15 dissolves into 10.
        let fragments = vec![
            fragment(10.0, 0.0, 40.0),
            fragment(10.0, 30.0, 40.0),
            fragment(15.0, 60.0, 40.0),
            fragment(100.0, 0.0, 40.0),
            fragment(100.0, 30.0, 40.0),
        ];
        let layout = align_all(&fragments, &config);

        assert_eq!(layout.columns.len(), 2);
        assert!((layout.columns[0].x_start - 35.0 / 3.0).abs() < 1e-9);
        assert_eq!(layout.columns[1].x_start, 100.0);
        assert_eq!(layout.columns[1].x_end, 140.0);
    }

    #[test]
    fn test_align_columns_empty_region() {
        let config = ReconstructionConfig::default();
        let layout = align_columns(&[], &SpatialIndex::new(&[]), &[], &config);
        assert!(layout.columns.is_empty());
    }

    #[test]
    fn test_boundaries_ordered_and_disjoint() {
        let config = ReconstructionConfig::default();
        let fragments: Vec<Fragment> = (0..30)
            .map(|i| fragment(((i * 37) % 400) as f64, (i / 5) as f64 * 20.0, 30.0))
            .collect();
        let layout = align_all(&fragments, &config);

        for pair in layout.columns.windows(2) {
            assert!(pair[0].x_start < pair[1].x_start);
            assert_eq!(pair[0].x_end, pair[1].x_start);
        }
    }

    #[test]
    fn test_align_columns_only_reads_region_members() {
        let config = ReconstructionConfig::default();
        // A stray edge at 60 between the region's two columns belongs to another region.
        let fragments = vec![
            fragment(10.0, 0.0, 50.0),
            fragment(110.0, 0.0, 50.0),
            fragment(60.0, 500.0, 50.0),
            fragment(10.0, 30.0, 50.0),
            fragment(110.0, 30.0, 50.0),
        ];
        let index = SpatialIndex::new(&fragments);
        let layout = align_columns(&fragments, &index, &[0, 1, 3, 4], &config);

        assert_eq!(
            layout.columns,
            vec![
                ColumnBoundary { x_start: 10.0, x_end: 110.0 },
                ColumnBoundary { x_start: 110.0, x_end: 160.0 },
            ]
        );
    }

    #[test]
    fn test_nearest_boundary_tie_goes_left() {
        assert_eq!(nearest_boundary(&[0.0, 10.0], 5.0), Some(0));
        assert_eq!(nearest_boundary(&[0.0, 10.0], 6.0), Some(1));
        assert_eq!(nearest_boundary(&[], 6.0), None);
    }
}
