//! Grid construction: assigning fragments to `(row, column)` cells.

use crate::error::{Result, TafelError};
use crate::types::{BoundingBox, Cell, ColumnBoundary, ConfidenceBreakdown, Fragment, FragmentId, Row, Table};

/// Build an unscored table from rows and column boundaries.
///
/// A fragment's column is the boundary whose interval contains its horizontal centre;
/// centres outside every interval snap to the first or last column. Every row gets a
/// cell for every column, empty or not.
///
/// # Errors
///
/// Returns `TafelError::Pipeline` when rows exist but no columns do, or when the finished
/// grid is not `rows x columns`.
pub fn build_grid(page_index: usize, fragments: &[Fragment], rows: Vec<Row>, columns: Vec<ColumnBoundary>) -> Result<Table> {
    if !rows.is_empty() && columns.is_empty() {
        return Err(TafelError::pipeline(format!(
            "{} rows on page {} but no column boundaries",
            rows.len(),
            page_index
        )));
    }

    let mut cells = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut buckets: Vec<Vec<FragmentId>> = vec![Vec::new(); columns.len()];
        for &id in &row.fragments {
            let column = column_for(&columns, fragments[id].x_center());
            buckets[column].push(id);
        }

        let row_cells: Vec<Cell> = buckets
            .into_iter()
            .zip(&columns)
            .map(|(ids, column)| build_cell(fragments, ids, empty_cell_bbox(row, column)))
            .collect();
        cells.push(row_cells);
    }

    let bbox = cells
        .iter()
        .flatten()
        .map(|cell: &Cell| cell.bbox)
        .reduce(|acc, bbox| acc.union(&bbox))
        .unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0));

    let table = Table {
        page_index,
        rows,
        columns,
        cells,
        confidence: 0.0,
        metrics: ConfidenceBreakdown::default(),
        bbox,
    };
    check_grid_shape(&table)?;

    Ok(table)
}

/// Verify that `table.cells` is exactly `rows x columns`.
pub fn check_grid_shape(table: &Table) -> Result<()> {
    if table.cells.len() != table.rows.len() {
        return Err(TafelError::pipeline(format!(
            "grid has {} cell rows for {} rows",
            table.cells.len(),
            table.rows.len()
        )));
    }
    if let Some((r, row)) = table
        .cells
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != table.columns.len())
    {
        return Err(TafelError::pipeline(format!(
            "grid row {} has {} cells for {} columns",
            r,
            row.len(),
            table.columns.len()
        )));
    }
    Ok(())
}

fn column_for(columns: &[ColumnBoundary], x: f64) -> usize {
    let after = columns.partition_point(|column| column.x_start <= x);
    after.saturating_sub(1).min(columns.len().saturating_sub(1))
}

/// The rectangle an empty cell occupies: its column's interval across its row's span.
pub(crate) fn empty_cell_bbox(row: &Row, column: &ColumnBoundary) -> BoundingBox {
    BoundingBox::new(column.x_start, row.y_span.0, column.width(), row.height())
}

/// Build one cell from the fragments assigned to it.
///
/// Fragments sharing a visual line are joined with a space left to right; separate lines
/// are joined with a newline top to bottom.
pub(crate) fn build_cell(fragments: &[Fragment], mut ids: Vec<FragmentId>, empty_bbox: BoundingBox) -> Cell {
    if ids.is_empty() {
        return Cell {
            content: String::new(),
            source_fragments: ids,
            bbox: empty_bbox,
        };
    }

    ids.sort_by(|&a, &b| {
        fragments[a]
            .y_center()
            .total_cmp(&fragments[b].y_center())
            .then(fragments[a].left().total_cmp(&fragments[b].left()))
            .then(a.cmp(&b))
    });

    let mut lines: Vec<(BoundingBox, Vec<FragmentId>)> = Vec::new();
    for &id in &ids {
        let bbox = *fragments[id].bbox();
        match lines.last_mut() {
            Some((line_bbox, members)) if same_line(line_bbox, &bbox) => {
                *line_bbox = line_bbox.union(&bbox);
                members.push(id);
            }
            _ => lines.push((bbox, vec![id])),
        }
    }

    let content = lines
        .iter_mut()
        .map(|(_, members)| {
            members.sort_by(|&a, &b| fragments[a].left().total_cmp(&fragments[b].left()).then(a.cmp(&b)));
            members
                .iter()
                .map(|&id| fragments[id].text())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n");

    let bbox = lines
        .iter()
        .map(|(bbox, _)| *bbox)
        .reduce(|acc, bbox| acc.union(&bbox))
        .unwrap_or(empty_bbox);

    ids.sort_unstable();
    Cell {
        content,
        source_fragments: ids,
        bbox,
    }
}

fn same_line(line: &BoundingBox, bbox: &BoundingBox) -> bool {
    line.vertical_overlap(bbox) >= 0.5 * line.height.min(bbox.height)
}
