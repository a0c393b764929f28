//! Table reconstruction stages.
//!
//! Each stage is a pure function over a page's fragment list:
//!
//! 1. [`rows`] groups fragments into rows and splits rows into table regions
//! 2. [`columns`] derives column boundaries for one region
//! 3. [`grid`] assigns fragments to cells
//! 4. [`confidence`] scores a grid
//! 5. [`overlap`] resolves candidates that claim the same fragments
//!
//! [`markdown`] renders a finished table.

pub mod columns;
pub mod confidence;
pub mod grid;
pub mod markdown;
pub mod overlap;
pub mod rows;

pub use columns::{ColumnLayout, align_columns, column_epsilon, nearest_boundary};
pub use confidence::score_table;
pub use grid::build_grid;
pub use markdown::table_to_markdown;
pub use overlap::resolve_overlaps;
pub use rows::{cluster_rows, row_epsilon, segment_regions};

use crate::types::Table;

/// A table under construction together with the column epsilon it was aligned with.
///
/// Scoring needs the epsilon to judge left-edge consistency, and the overlap resolver
/// rescores candidates after stripping fragments, so the two travel together until the
/// page is finished.
#[derive(Debug, Clone, PartialEq)]
pub struct TableCandidate {
    pub table: Table,
    pub column_epsilon: f64,
}
