//! Row clustering and table region segmentation.
//!
//! Rows are single-linkage clusters over fragment vertical centres: two fragments belong
//! to the same row when a chain of neighbours, each no further apart than the row
//! epsilon, connects them. On a sorted 1-D projection that is exactly a walk that starts
//! a new row whenever the gap to the previous centre exceeds epsilon.

use crate::core::config::ReconstructionConfig;
use crate::spatial::SpatialIndex;
use crate::types::{Fragment, FragmentId, Row};
use crate::utils::{mean, median};
use std::ops::Range;

/// Vertical distance below which two fragment centres are considered one row.
///
/// Scales with the page's median font size and is clamped to the configured bounds.
pub fn row_epsilon(fragments: &[Fragment], config: &ReconstructionConfig) -> f64 {
    let sizes: Vec<f64> = fragments.iter().map(Fragment::font_size).collect();
    match median(&sizes) {
        Some(size) => (size * config.row_epsilon_factor).clamp(config.min_row_epsilon, config.max_row_epsilon),
        None => config.min_row_epsilon,
    }
}

/// Group every fragment of the page into exactly one row.
///
/// Rows come out in ascending vertical order; the fragments of a row are ordered left to
/// right (ties by id).
pub fn cluster_rows(fragments: &[Fragment], index: &SpatialIndex, epsilon: f64) -> Vec<Row> {
    let mut groups: Vec<Vec<FragmentId>> = Vec::new();
    let mut previous: Option<f64> = None;

    for &(y_center, id) in index.y_center_order() {
        match (previous, groups.last_mut()) {
            (Some(prev), Some(group)) if y_center - prev <= epsilon => group.push(id),
            _ => groups.push(vec![id]),
        }
        previous = Some(y_center);
    }

    groups.into_iter().map(|ids| build_row(fragments, ids)).collect()
}

fn build_row(fragments: &[Fragment], mut ids: Vec<FragmentId>) -> Row {
    ids.sort_by(|&a, &b| fragments[a].left().total_cmp(&fragments[b].left()).then(a.cmp(&b)));

    // Summed in value order so the mean is the same whatever order the fragments came in.
    let mut centers: Vec<f64> = ids.iter().map(|&id| fragments[id].y_center()).collect();
    centers.sort_by(f64::total_cmp);
    let top = ids.iter().map(|&id| fragments[id].bbox().y).fold(f64::INFINITY, f64::min);
    let bottom = ids
        .iter()
        .map(|&id| fragments[id].bbox().bottom())
        .fold(f64::NEG_INFINITY, f64::max);

    Row {
        y_center: mean(&centers).unwrap_or(0.0),
        y_span: (top, bottom),
        fragments: ids,
    }
}

/// Split consecutive rows into table regions.
///
/// A new region starts before row `i` when the blank band between everything above it
/// (the lowest bottom of `rows[..i]`) and everything from it on (the highest top of
/// `rows[i..]`) exceeds `max_row_gap_ratio` times the mean fragment height of rows `i - 1`
/// and `i`. Returns ranges into `rows`; together they cover every row exactly once, and
/// the vertical spans of different regions never touch.
pub fn segment_regions(rows: &[Row], fragments: &[Fragment], max_row_gap_ratio: f64) -> Vec<Range<usize>> {
    let mut regions = Vec::new();
    if rows.is_empty() {
        return regions;
    }

    let mut lowest_top_from = vec![f64::INFINITY; rows.len() + 1];
    for i in (0..rows.len()).rev() {
        lowest_top_from[i] = lowest_top_from[i + 1].min(rows[i].y_span.0);
    }

    let mut start = 0;
    let mut bottom_so_far = rows[0].y_span.1;
    for i in 1..rows.len() {
        let gap = lowest_top_from[i] - bottom_so_far;
        bottom_so_far = bottom_so_far.max(rows[i].y_span.1);

        let mut heights: Vec<f64> = rows[i - 1]
            .fragments
            .iter()
            .chain(rows[i].fragments.iter())
            .map(|&id| fragments[id].bbox().height)
            .collect();
        heights.sort_by(f64::total_cmp);
        let Some(mean_height) = mean(&heights) else {
            continue;
        };

        if gap > mean_height * max_row_gap_ratio {
            tracing::trace!(row = i, gap, mean_height, "Row gap starts a new table region");
            regions.push(start..i);
            start = i;
        }
    }
    regions.push(start..rows.len());

    regions
}
