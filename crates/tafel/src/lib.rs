//! Tafel - Spatial Table Reconstruction for OCR Output
//!
//! Tafel rebuilds tables from positioned text fragments. It clusters fragments into rows
//! and columns, assembles a complete cell grid, and scores every table with a confidence
//! value so callers can tell a clean table from a clustering accident.
//!
//! # Quick Start
//!
//! ```rust
//! use tafel::{DocumentInput, FragmentRecord, ReconstructionConfig, TableAnalyzer};
//!
//! # fn main() -> tafel::Result<()> {
//! let mut records = Vec::new();
//! for (row, y) in [10.0, 40.0, 70.0].into_iter().enumerate() {
//!     for (col, x) in [10.0, 110.0, 210.0].into_iter().enumerate() {
//!         records.push(FragmentRecord {
//!             text: format!("r{}c{}", row, col),
//!             page_index: 0,
//!             x,
//!             y,
//!             width: 50.0,
//!             height: 10.0,
//!             font_size: None,
//!         });
//!     }
//! }
//!
//! let analyzer = TableAnalyzer::new(ReconstructionConfig::default())?;
//! let result = analyzer.analyze_document(&DocumentInput::from_records(records))?;
//!
//! let table = result.tables()[0];
//! assert_eq!((table.row_count(), table.column_count()), (3, 3));
//! assert!(table.confidence > 0.9);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Model** (`types`, `ingest`): Fragments, rows, columns, cells, tables; record and TSV ingestion
//! - **Spatial Index** (`spatial`): R-tree and sorted projections over one page's fragments
//! - **Table Stages** (`table`): Row clustering, column alignment, grid building, scoring, overlap resolution
//! - **Core Module** (`core`): Page state machine, parallel document analysis, config loading
//! - **Cache** (`cache`): LRU of page results with at-most-once computation per key
//!
//! # Features
//!
//! - Page-level parallelism on a rayon worker pool
//! - Per-page failure isolation with an explicit status for every page
//! - Cooperative cancellation at stage boundaries
//! - Optional async wrapper (`tokio-runtime`, enabled by default)

#![deny(unsafe_code)]

pub mod cache;
pub mod core;
pub mod error;
pub mod ingest;
pub mod spatial;
pub mod table;
pub mod types;
pub mod utils;

pub use error::{Result, TafelError};

pub use types::{BoundingBox, Cell, ColumnBoundary, ConfidenceBreakdown, Fragment, FragmentId, Row, Table};

pub use ingest::{DocumentInput, FragmentRecord, PageInput, fragments_from_tsv};

pub use spatial::SpatialIndex;

pub use cache::{CacheFetch, CacheStats, PageCacheKey, TableCache};

pub use core::analyzer::{AnalysisStats, DocumentResult, PageResult, TableAnalyzer};
pub use core::cancellation::CancellationToken;
pub use core::config::{ReconstructionConfig, ScoringWeights};
pub use core::pipeline::{PageOutcome, PageStage, PageStatus, run_page_pipeline};

#[cfg(feature = "tokio-runtime")]
pub use core::analyzer::analyze_document_async;
