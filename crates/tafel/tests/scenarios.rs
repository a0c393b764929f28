//! End-to-end reconstruction scenarios.
//!
//! Each test feeds a small synthetic page through the full analyzer and checks the
//! reconstructed grid shape, cell contents and confidence.

mod helpers;

use helpers::{cell_text, fragment, grid, grid_at, test_config};
use tafel::{DocumentInput, PageStatus, TableAnalyzer};

/// Test a page with a single fragment.
///
/// A lone fragment is a 1x1 grid: still reported as a table, but with confidence 0
/// because it is below the 2x2 minimum.
#[test]
fn test_single_fragment_is_zero_confidence_table() {
    let analyzer = TableAnalyzer::new(test_config()).unwrap();
    let document = DocumentInput::from_fragments(vec![fragment("Total", 0, 10.0, 10.0)]);

    let result = analyzer.analyze_document(&document).unwrap();
    let page = result.page(0).unwrap();
    assert_eq!(page.status, PageStatus::Done);
    assert_eq!(page.tables.len(), 1);

    let table = &page.tables[0];
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.column_count(), 1);
    assert_eq!(table.cell_count(), 1);
    assert_eq!(table.confidence, 0.0, "1x1 grid must be forced to zero confidence");
    assert_eq!(table.cell(0, 0).unwrap().content, "Total");
}

/// Test a perfectly aligned 3x4 grid.
#[test]
fn test_aligned_grid_high_confidence() {
    let analyzer = TableAnalyzer::new(test_config()).unwrap();
    let result = analyzer
        .analyze_document(&DocumentInput::from_fragments(grid(0, 3, 4)))
        .unwrap();

    let tables = result.tables();
    assert_eq!(tables.len(), 1);
    let table = tables[0];
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.column_count(), 4);
    assert_eq!(table.metrics.fill_ratio, 1.0);
    assert!(table.confidence >= 0.9, "confidence was {}", table.confidence);

    for r in 0..3 {
        for c in 0..4 {
            assert_eq!(table.cell(r, c).unwrap().content, cell_text(r, c));
        }
    }
}

/// Test the aligned grid with one cell's fragment removed.
///
/// The grid keeps its shape, the missing cell is materialized empty, and confidence drops
/// below the full grid's while staying high.
#[test]
fn test_grid_with_missing_cell() {
    let analyzer = TableAnalyzer::new(test_config()).unwrap();

    let full = analyzer
        .analyze_document(&DocumentInput::from_fragments(grid(0, 3, 4)))
        .unwrap();
    let full_confidence = full.tables()[0].confidence;

    let mut fragments = grid(0, 3, 4);
    fragments.retain(|f| f.text() != "r1c2");
    let sparse = analyzer
        .analyze_document(&DocumentInput::from_fragments(fragments))
        .unwrap();

    let table = sparse.tables()[0];
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.column_count(), 4);
    assert!((table.metrics.fill_ratio - 11.0 / 12.0).abs() < 1e-9);
    assert!(table.confidence < full_confidence);
    assert!(table.confidence >= 0.9, "confidence was {}", table.confidence);

    let empty = table.cell(1, 2).unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.content, "");
    assert_eq!(empty.bbox.x, table.columns[2].x_start);
    assert_eq!(empty.bbox.y, table.rows[1].y_span.0);
}

/// Test two fragments at identical coordinates.
///
/// Both land in the same row and column and are merged into one cell.
#[test]
fn test_identical_fragments_merge_into_one_cell() {
    let analyzer = TableAnalyzer::new(test_config()).unwrap();
    let document = DocumentInput::from_fragments(vec![fragment("A", 0, 10.0, 10.0), fragment("B", 0, 10.0, 10.0)]);

    let result = analyzer.analyze_document(&document).unwrap();
    let table = result.tables()[0];
    assert_eq!(table.cell_count(), 1);

    let cell = table.cell(0, 0).unwrap();
    assert_eq!(cell.content, "A B");
    assert_eq!(cell.source_fragments, vec![0, 1]);
}

/// Test a duplicated fragment inside a larger grid.
#[test]
fn test_duplicate_inside_grid_keeps_shape() {
    let analyzer = TableAnalyzer::new(test_config()).unwrap();
    let mut fragments = grid(0, 2, 2);
    fragments.push(fragment("dup", 0, 10.0, 10.0));

    let result = analyzer
        .analyze_document(&DocumentInput::from_fragments(fragments))
        .unwrap();
    let table = result.tables()[0];
    assert_eq!((table.row_count(), table.column_count()), (2, 2));
    assert_eq!(table.cell(0, 0).unwrap().content, "r0c0 dup");
}

/// Test a page with zero fragments.
#[test]
fn test_empty_page_is_done_without_tables() {
    let analyzer = TableAnalyzer::new(test_config()).unwrap();
    let mut document = DocumentInput::new();
    document.ensure_page(0);

    let result = analyzer.analyze_document(&document).unwrap();
    assert_eq!(result.pages.len(), 1);
    assert_eq!(result.pages[0].status, PageStatus::Done);
    assert!(result.pages[0].tables.is_empty());
    assert!(result.failed_pages().is_empty());
}

/// Test an empty document.
#[test]
fn test_empty_document() {
    let analyzer = TableAnalyzer::new(test_config()).unwrap();
    let result = analyzer.analyze_document(&DocumentInput::new()).unwrap();
    assert!(result.pages.is_empty());
    assert!(result.is_complete());
}

/// Test two tables separated by a large vertical gap.
///
/// The page splits into two regions; the merged reading competes and loses, so each
/// table comes out on its own with its own column boundaries.
#[test]
fn test_two_tables_on_one_page() {
    let analyzer = TableAnalyzer::new(test_config()).unwrap();
    let mut fragments = grid_at(0, 3, 4, 10.0);
    fragments.extend(grid_at(0, 4, 2, 500.0));

    let result = analyzer
        .analyze_document(&DocumentInput::from_fragments(fragments))
        .unwrap();
    let tables = result.tables();
    assert_eq!(tables.len(), 2);
    assert_eq!((tables[0].row_count(), tables[0].column_count()), (3, 4));
    assert_eq!((tables[1].row_count(), tables[1].column_count()), (4, 2));
    assert!(tables.iter().all(|t| t.confidence >= 0.9));
}

/// Test that a header line far above a table does not pollute the table.
#[test]
fn test_title_above_table_stays_separate() {
    let analyzer = TableAnalyzer::new(test_config()).unwrap();
    let mut fragments = vec![fragment("Statement", 0, 10.0, 10.0)];
    fragments.extend(grid_at(0, 3, 3, 200.0));

    let result = analyzer
        .analyze_document(&DocumentInput::from_fragments(fragments))
        .unwrap();
    let best = result
        .tables()
        .into_iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .unwrap();
    assert_eq!((best.row_count(), best.column_count()), (3, 3));
    assert!(!best.fragment_ids().contains(&0));
}

/// Test Markdown rendering of a reconstructed table.
#[test]
fn test_markdown_export() {
    let analyzer = TableAnalyzer::new(test_config()).unwrap();
    let result = analyzer
        .analyze_document(&DocumentInput::from_fragments(grid(0, 2, 2)))
        .unwrap();

    let markdown = result.tables()[0].to_markdown();
    assert_eq!(markdown, "| r0c0 | r0c1 |\n| ---- | ---- |\n| r1c0 | r1c1 |\n");
}
