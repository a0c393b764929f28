//! Reconstruction orchestration.
//!
//! This module turns the pure table stages into a document-level service:
//! - **Configuration**: Loading and validating [`ReconstructionConfig`]
//! - **Pipeline**: The per-page state machine from `Pending` to `Done`
//! - **Analyzer**: Fanning pages out over a worker pool with result caching
//! - **Cancellation**: Cooperative cancellation of a running document job
//!
//! # Example
//!
//! ```rust
//! use tafel::core::analyzer::TableAnalyzer;
//! use tafel::core::config::ReconstructionConfig;
//! use tafel::ingest::DocumentInput;
//!
//! # fn example() -> tafel::Result<()> {
//! let analyzer = TableAnalyzer::new(ReconstructionConfig::default())?;
//! let result = analyzer.analyze_document(&DocumentInput::default())?;
//! assert!(result.tables().is_empty());
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod cancellation;
pub mod config;
pub mod pipeline;

pub use analyzer::{AnalysisStats, DocumentResult, PageResult, TableAnalyzer};
pub use cancellation::CancellationToken;
pub use config::{ReconstructionConfig, ScoringWeights};
pub use pipeline::{PageOutcome, PageStage, PageStatus, run_page_pipeline};

#[cfg(feature = "tokio-runtime")]
pub use analyzer::analyze_document_async;
