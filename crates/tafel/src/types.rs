//! Core data model: fragments, rows, column boundaries, cells and tables.
//!
//! Fragments are immutable once built. Everything downstream of ingestion refers to a
//! fragment by its [`FragmentId`], the position of the fragment in its page's fragment
//! list, so clustering never copies or mutates fragment data.

use crate::error::{Result, TafelError};
use serde::{Deserialize, Serialize};

/// Page-local fragment reference: index into the page's validated fragment list.
pub type FragmentId = usize;

/// Axis-aligned rectangle in page coordinates (origin top-left, Y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Build a box from its edges. Inverted edges produce a zero-sized box.
    pub fn from_edges(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            x: left,
            y: top,
            width: (right - left).max(0.0),
            height: (bottom - top).max(0.0),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn x_center(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn y_center(&self) -> f64 {
        self.y + self.height / 2.0
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::from_edges(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Length of the overlap of the two vertical extents (0 when disjoint).
    pub fn vertical_overlap(&self, other: &BoundingBox) -> f64 {
        (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }
}

/// One OCR-recognized text unit.
///
/// Construct with [`Fragment::new`], which enforces the fragment invariants: non-empty
/// text, finite coordinates and a strictly positive width and height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    text: String,
    bbox: BoundingBox,
    page_index: usize,
    font_size: f64,
}

impl Fragment {
    /// Validate and build a fragment.
    ///
    /// The text is trimmed. When `font_size` is missing, non-finite or not positive it is
    /// approximated from the bounding box height.
    ///
    /// # Errors
    ///
    /// Returns `TafelError::InvalidFragment` for whitespace-only text, non-finite
    /// coordinates, or a zero-area bounding box.
    pub fn new(text: impl Into<String>, bbox: BoundingBox, page_index: usize, font_size: Option<f64>) -> Result<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(TafelError::invalid_fragment("fragment text is empty"));
        }
        if !bbox.is_finite() {
            return Err(TafelError::invalid_fragment(format!(
                "non-finite bounding box for '{}': {:?}",
                trimmed, bbox
            )));
        }
        if bbox.width <= 0.0 || bbox.height <= 0.0 {
            return Err(TafelError::invalid_fragment(format!(
                "zero-area bounding box for '{}': {}x{}",
                trimmed, bbox.width, bbox.height
            )));
        }

        let font_size = match font_size {
            Some(size) if size.is_finite() && size > 0.0 => size,
            _ => bbox.height,
        };

        Ok(Self {
            text: if trimmed.len() == text.len() {
                text
            } else {
                trimmed.to_string()
            },
            bbox,
            page_index,
            font_size,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn font_size(&self) -> f64 {
        self.font_size
    }

    pub fn x_center(&self) -> f64 {
        self.bbox.x_center()
    }

    pub fn y_center(&self) -> f64 {
        self.bbox.y_center()
    }

    pub fn left(&self) -> f64 {
        self.bbox.x
    }

    pub fn right(&self) -> f64 {
        self.bbox.right()
    }
}

/// A horizontal band of fragments believed to share one table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Member fragments, left to right by `x`.
    pub fragments: Vec<FragmentId>,
    /// Mean of the member fragments' vertical centres.
    pub y_center: f64,
    /// `(min top, max bottom)` over the member fragments.
    pub y_span: (f64, f64),
}

impl Row {
    pub fn height(&self) -> f64 {
        self.y_span.1 - self.y_span.0
    }
}

/// Half-open horizontal interval `[x_start, x_end)` of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnBoundary {
    pub x_start: f64,
    pub x_end: f64,
}

impl ColumnBoundary {
    pub fn width(&self) -> f64 {
        self.x_end - self.x_start
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.x_start && x < self.x_end
    }
}

/// Intersection of one row and one column.
///
/// An empty `source_fragments` list is a valid, expected state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub content: String,
    pub source_fragments: Vec<FragmentId>,
    pub bbox: BoundingBox,
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        self.source_fragments.is_empty()
    }
}

/// The individual quality factors behind a table's confidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    /// 1 minus the coefficient of variation of inter-row spacing, clamped to [0, 1].
    pub row_regularity: f64,
    /// Non-empty cells over total cells.
    pub fill_ratio: f64,
    /// Mean per-column share of fragments whose left edge sits on the column start.
    pub edge_consistency: f64,
    /// 1.0 when the grid is at least 2 x 2, otherwise 0.0.
    pub size_gate: f64,
}

/// A reconstructed table grid.
///
/// `cells` is indexed `[row][column]` and always holds `rows.len() * columns.len()` cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub page_index: usize,
    pub rows: Vec<Row>,
    pub columns: Vec<ColumnBoundary>,
    pub cells: Vec<Vec<Cell>>,
    pub confidence: f64,
    pub metrics: ConfidenceBreakdown,
    pub bbox: BoundingBox,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.cells.get(row).and_then(|cells| cells.get(column))
    }

    pub fn filled_cell_count(&self) -> usize {
        self.cells.iter().flatten().filter(|cell| !cell.is_empty()).count()
    }

    /// All fragments claimed by this table, sorted ascending.
    pub fn fragment_ids(&self) -> Vec<FragmentId> {
        let mut ids: Vec<FragmentId> = self
            .cells
            .iter()
            .flatten()
            .flat_map(|cell| cell.source_fragments.iter().copied())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Cell contents as a plain `rows x columns` string grid.
    pub fn to_cell_strings(&self) -> Vec<Vec<String>> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|cell| cell.content.clone()).collect())
            .collect()
    }

    /// Render the table as a Markdown pipe table, using the first row as header.
    pub fn to_markdown(&self) -> String {
        crate::table::markdown::table_to_markdown(&self.to_cell_strings())
    }
}
