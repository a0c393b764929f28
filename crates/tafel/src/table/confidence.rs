//! Table confidence scoring.
//!
//! Confidence is a weighted mean of four factors in `[0, 1]`:
//!
//! | Factor | Meaning |
//! |--------|---------|
//! | row regularity | `1 - CV` of the spacing between consecutive row centres |
//! | fill ratio | non-empty cells over total cells |
//! | edge consistency | share of fragments whose left edge sits on their column start |
//! | size gate | earned only by grids of at least 2 x 2 |
//!
//! The whole score is multiplied by the size gate, so a single row or a single column
//! always scores 0. The score depends only on the table itself, never on other candidates
//! or on processing order.

use crate::core::config::ScoringWeights;
use crate::types::{ConfidenceBreakdown, Fragment, Table};
use crate::utils::coefficient_of_variation;

/// Score a table, returning the confidence and the factors behind it.
pub fn score_table(
    table: &Table,
    fragments: &[Fragment],
    column_epsilon: f64,
    weights: &ScoringWeights,
) -> (f64, ConfidenceBreakdown) {
    let metrics = ConfidenceBreakdown {
        row_regularity: row_regularity(table),
        fill_ratio: fill_ratio(table),
        edge_consistency: edge_consistency(table, fragments, column_epsilon),
        size_gate: if table.row_count() >= 2 && table.column_count() >= 2 {
            1.0
        } else {
            0.0
        },
    };

    let total = weights.total();
    if total <= 0.0 || metrics.size_gate == 0.0 {
        return (0.0, metrics);
    }

    let weighted = weights.row_regularity * metrics.row_regularity
        + weights.fill_ratio * metrics.fill_ratio
        + weights.edge_consistency * metrics.edge_consistency
        + weights.size_gate * metrics.size_gate;
    let confidence = (metrics.size_gate * weighted / total).clamp(0.0, 1.0);

    (confidence, metrics)
}

fn row_regularity(table: &Table) -> f64 {
    let spacings: Vec<f64> = table
        .rows
        .windows(2)
        .map(|pair| pair[1].y_center - pair[0].y_center)
        .collect();
    if spacings.len() < 2 {
        return 1.0;
    }
    match coefficient_of_variation(&spacings) {
        Some(cv) => (1.0 - cv).clamp(0.0, 1.0),
        None => 0.0,
    }
}

fn fill_ratio(table: &Table) -> f64 {
    let total = table.cell_count();
    if total == 0 {
        return 0.0;
    }
    table.filled_cell_count() as f64 / total as f64
}

fn edge_consistency(table: &Table, fragments: &[Fragment], column_epsilon: f64) -> f64 {
    let mut shares = Vec::with_capacity(table.columns.len());

    for (c, column) in table.columns.iter().enumerate() {
        let mut count = 0usize;
        let mut aligned = 0usize;
        for row in &table.cells {
            let Some(cell) = row.get(c) else { continue };
            for &id in &cell.source_fragments {
                count += 1;
                if (fragments[id].left() - column.x_start).abs() <= column_epsilon {
                    aligned += 1;
                }
            }
        }
        if count > 0 {
            shares.push(aligned as f64 / count as f64);
        }
    }

    if shares.is_empty() {
        return 0.0;
    }
    shares.iter().sum::<f64>() / shares.len() as f64
}
