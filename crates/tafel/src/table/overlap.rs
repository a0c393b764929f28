//! Resolution of candidates that claim the same fragments.
//!
//! Candidates are ranked by confidence. The highest-ranked candidate keeps all of its
//! fragments; every lower-ranked candidate loses the fragments already claimed above it,
//! is rescored, and is dropped if too little of it survives.

use super::TableCandidate;
use super::confidence::score_table;
use super::grid::{build_cell, empty_cell_bbox};
use crate::core::config::ReconstructionConfig;
use crate::types::{Fragment, FragmentId, Table};
use ahash::AHashSet;

/// Resolve overlapping candidates so every fragment belongs to at most one table.
///
/// Ties in confidence keep the candidates' original order, so the result is deterministic
/// for a given input. Surviving tables are returned top to bottom, then left to right.
pub fn resolve_overlaps(
    candidates: Vec<TableCandidate>,
    fragments: &[Fragment],
    config: &ReconstructionConfig,
) -> Vec<TableCandidate> {
    let mut ranked = candidates;
    ranked.sort_by(|a, b| b.table.confidence.total_cmp(&a.table.confidence));

    let mut claimed: AHashSet<FragmentId> = AHashSet::new();
    let mut kept: Vec<TableCandidate> = Vec::with_capacity(ranked.len());

    for mut candidate in ranked {
        let ids = candidate.table.fragment_ids();
        let contested = ids.iter().filter(|id| claimed.contains(id)).count();

        if contested > 0 {
            strip_fragments(&mut candidate.table, fragments, &claimed);
            let (confidence, metrics) =
                score_table(&candidate.table, fragments, candidate.column_epsilon, &config.scoring);
            candidate.table.confidence = confidence;
            candidate.table.metrics = metrics;

            let remaining = ids.len() - contested;
            if remaining == 0
                || metrics.fill_ratio < config.min_fill_ratio_for_discard
                || confidence < config.min_confidence
            {
                tracing::debug!(
                    page = candidate.table.page_index,
                    contested,
                    remaining,
                    fill_ratio = metrics.fill_ratio,
                    confidence,
                    "Discarding overlapping table candidate"
                );
                continue;
            }
        }

        claimed.extend(candidate.table.fragment_ids());
        kept.push(candidate);
    }

    kept.sort_by(|a, b| {
        a.table
            .bbox
            .y
            .total_cmp(&b.table.bbox.y)
            .then(a.table.bbox.x.total_cmp(&b.table.bbox.x))
    });
    kept
}

/// Remove `claimed` fragments from the table's cells and rows, rebuilding affected cells.
fn strip_fragments(table: &mut Table, fragments: &[Fragment], claimed: &AHashSet<FragmentId>) {
    for (row, cells) in table.rows.iter_mut().zip(table.cells.iter_mut()) {
        row.fragments.retain(|id| !claimed.contains(id));

        for (cell, column) in cells.iter_mut().zip(&table.columns) {
            if !cell.source_fragments.iter().any(|id| claimed.contains(id)) {
                continue;
            }
            let survivors: Vec<FragmentId> = cell
                .source_fragments
                .iter()
                .copied()
                .filter(|id| !claimed.contains(id))
                .collect();
            *cell = build_cell(fragments, survivors, empty_cell_bbox(row, column));
        }
    }
}
