//! Shared builders for integration tests.
//!
//! Grids use the same geometry everywhere: cells are 50x10, columns start every 100
//! units at x = 10, rows start every 30 units at y = 10.

#![allow(dead_code)]

use tafel::{BoundingBox, Fragment, FragmentRecord, ReconstructionConfig};

pub const CELL_WIDTH: f64 = 50.0;
pub const CELL_HEIGHT: f64 = 10.0;
pub const COLUMN_PITCH: f64 = 100.0;
pub const ROW_PITCH: f64 = 30.0;
pub const ORIGIN: f64 = 10.0;

pub fn fragment(text: &str, page_index: usize, x: f64, y: f64) -> Fragment {
    Fragment::new(text, BoundingBox::new(x, y, CELL_WIDTH, CELL_HEIGHT), page_index, None).unwrap()
}

pub fn cell_text(row: usize, col: usize) -> String {
    format!("r{}c{}", row, col)
}

/// A perfectly aligned `rows x cols` grid with uniform spacing, starting at `y0`.
pub fn grid_at(page_index: usize, rows: usize, cols: usize, y0: f64) -> Vec<Fragment> {
    let mut fragments = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            fragments.push(fragment(
                &cell_text(r, c),
                page_index,
                ORIGIN + c as f64 * COLUMN_PITCH,
                y0 + r as f64 * ROW_PITCH,
            ));
        }
    }
    fragments
}

pub fn grid(page_index: usize, rows: usize, cols: usize) -> Vec<Fragment> {
    grid_at(page_index, rows, cols, ORIGIN)
}

pub fn record(text: &str, page_index: i64, x: f64, y: f64, width: f64, height: f64) -> FragmentRecord {
    FragmentRecord {
        text: text.to_string(),
        page_index,
        x,
        y,
        width,
        height,
        font_size: None,
    }
}

/// Deterministic Fisher-Yates shuffle driven by a small LCG.
pub fn shuffled<T: Clone>(items: &[T], seed: u64) -> Vec<T> {
    let mut out = items.to_vec();
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    for i in (1..out.len()).rev() {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let j = (state >> 33) as usize % (i + 1);
        out.swap(i, j);
    }
    out
}

pub fn test_config() -> ReconstructionConfig {
    ReconstructionConfig {
        max_workers: Some(4),
        ..Default::default()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
