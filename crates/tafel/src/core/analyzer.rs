//! Document-level analysis.
//!
//! [`TableAnalyzer`] fans the pages of a [`DocumentInput`] out over a rayon worker pool,
//! runs the page pipeline for each one through the shared [`TableCache`], and merges the
//! page results back into page order.
//!
//! # Failure semantics
//!
//! Page-local problems (invalid geometry, a stage error or panic, a page over the fragment
//! limit, cancellation) are reported per page through [`PageStatus`] and never fail the
//! document. Only infrastructure failures surface as `Err`: an invalid configuration, a
//! worker pool that cannot be built, or a poisoned cache lock.

use crate::cache::{CacheFetch, PageCacheKey, TableCache};
use crate::core::cancellation::CancellationToken;
use crate::core::config::ReconstructionConfig;
use crate::core::pipeline::{PageStatus, run_page_pipeline};
use crate::error::{Result, TafelError};
use crate::ingest::{DocumentInput, PageInput};
use crate::types::Table;
use crate::utils::compute_hash;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of analysing one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub page_index: usize,
    pub status: PageStatus,
    /// Tables found on the page; empty unless `status` is `Done`.
    pub tables: Vec<Table>,
    pub fragment_count: usize,
    /// Records dropped at ingestion for this page.
    pub rejected_fragments: usize,
    /// Whether the tables were served from the cache.
    pub from_cache: bool,
}

impl PageResult {
    fn new(page_index: usize, page: &PageInput, status: PageStatus, tables: Vec<Table>, from_cache: bool) -> Self {
        Self {
            page_index,
            status,
            tables,
            fragment_count: page.fragments.len(),
            rejected_fragments: page.rejected_fragments,
            from_cache,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub pages_analyzed: usize,
    pub pages_failed: usize,
    pub pages_cancelled: usize,
    pub fragments_processed: usize,
    pub rejected_fragments: usize,
    pub tables_found: usize,
    pub cache_hits: usize,
    pub elapsed_ms: u64,
}

impl AnalysisStats {
    fn from_pages(pages: &[PageResult], elapsed: Duration) -> Self {
        let mut stats = AnalysisStats {
            pages_analyzed: pages.len(),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            ..Default::default()
        };
        for page in pages {
            match page.status {
                PageStatus::Done => {}
                PageStatus::Failed { .. } | PageStatus::TooLarge { .. } => stats.pages_failed += 1,
                PageStatus::Cancelled { .. } => stats.pages_cancelled += 1,
            }
            stats.fragments_processed += page.fragment_count;
            stats.rejected_fragments += page.rejected_fragments;
            stats.tables_found += page.tables.len();
            if page.from_cache {
                stats.cache_hits += 1;
            }
        }
        stats
    }
}

/// Tables and per-page statuses of one document, in ascending page order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub fingerprint: String,
    pub pages: Vec<PageResult>,
    pub stats: AnalysisStats,
}

impl DocumentResult {
    /// Every table of the document, in page order.
    pub fn tables(&self) -> Vec<&Table> {
        self.pages.iter().flat_map(|page| page.tables.iter()).collect()
    }

    pub fn into_tables(self) -> Vec<Table> {
        self.pages.into_iter().flat_map(|page| page.tables).collect()
    }

    /// Pages that failed or were rejected as too large.
    pub fn failed_pages(&self) -> Vec<&PageResult> {
        self.pages
            .iter()
            .filter(|page| matches!(page.status, PageStatus::Failed { .. } | PageStatus::TooLarge { .. }))
            .collect()
    }

    pub fn page(&self, page_index: usize) -> Option<&PageResult> {
        self.pages.iter().find(|page| page.page_index == page_index)
    }

    /// Whether every page reached `Done`.
    pub fn is_complete(&self) -> bool {
        self.pages.iter().all(|page| page.status.is_done())
    }
}

/// Reconstructs tables for whole documents.
///
/// An analyzer owns its configuration, a worker pool and a handle to a result cache. It is
/// `Send + Sync`; share it behind an `Arc` to analyse several documents concurrently.
///
/// # Example
///
/// ```rust
/// use tafel::core::analyzer::TableAnalyzer;
/// use tafel::core::config::ReconstructionConfig;
/// use tafel::ingest::DocumentInput;
/// use tafel::types::{BoundingBox, Fragment};
///
/// # fn example() -> tafel::Result<()> {
/// let mut fragments = Vec::new();
/// for (row, y) in [10.0, 40.0].into_iter().enumerate() {
///     for (col, x) in [10.0, 110.0].into_iter().enumerate() {
///         let text = format!("r{}c{}", row, col);
///         fragments.push(Fragment::new(text, BoundingBox::new(x, y, 50.0, 10.0), 0, None)?);
///     }
/// }
///
/// let analyzer = TableAnalyzer::new(ReconstructionConfig::default())?;
/// let result = analyzer.analyze_document(&DocumentInput::from_fragments(fragments))?;
/// assert_eq!(result.tables().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TableAnalyzer {
    config: ReconstructionConfig,
    config_hash: String,
    cache: Arc<TableCache>,
    pool: rayon::ThreadPool,
}

impl TableAnalyzer {
    /// Create an analyzer with its own cache of `config.cache_capacity` entries.
    ///
    /// # Errors
    ///
    /// Returns `TafelError::Validation` for an invalid configuration and
    /// `TafelError::WorkerPool` when the worker threads cannot be started.
    pub fn new(config: ReconstructionConfig) -> Result<Self> {
        let cache = Arc::new(TableCache::new(config.cache_capacity));
        Self::with_cache(config, cache)
    }

    /// Create an analyzer that shares an existing cache.
    ///
    /// Entries are keyed by configuration as well as content, so analyzers with different
    /// reconstruction parameters can safely share one cache.
    pub fn with_cache(config: ReconstructionConfig, cache: Arc<TableCache>) -> Result<Self> {
        config.validate()?;

        // Parameters that cannot change a Done page's tables stay out of the cache identity.
        let identity = ReconstructionConfig {
            max_fragments_per_page: 0,
            cache_capacity: 0,
            max_workers: None,
            ..config.clone()
        };
        let config_hash = compute_hash(&serde_json::to_string(&identity)?);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_count())
            .thread_name(|i| format!("tafel-page-{}", i))
            .build()?;

        tracing::debug!(
            workers = config.worker_count(),
            cache_capacity = cache.capacity(),
            "Table analyzer created"
        );

        Ok(Self {
            config,
            config_hash,
            cache,
            pool,
        })
    }

    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TableCache> {
        &self.cache
    }

    /// Analyse every page of a document.
    pub fn analyze_document(&self, document: &DocumentInput) -> Result<DocumentResult> {
        self.analyze_document_with_cancellation(document, &CancellationToken::new())
    }

    /// Analyse every page of a document, stopping early when `cancel` is triggered.
    ///
    /// Pages still running when the token is cancelled stop at their next stage boundary
    /// and are reported as [`PageStatus::Cancelled`] with no tables; pages that already
    /// finished keep their results.
    ///
    /// # Errors
    ///
    /// Returns `TafelError::Cancelled` if the token is already cancelled on entry, and
    /// `TafelError::LockPoisoned` if the cache state is corrupted.
    #[tracing::instrument(skip_all, fields(pages = document.page_count(), fragments = document.fragment_count()))]
    pub fn analyze_document_with_cancellation(
        &self,
        document: &DocumentInput,
        cancel: &CancellationToken,
    ) -> Result<DocumentResult> {
        if cancel.is_cancelled() {
            return Err(TafelError::Cancelled("document job cancelled before start".to_string()));
        }

        let started = Instant::now();
        let fingerprint = document.fingerprint();
        let cache_identity = format!("{}:{}", fingerprint, self.config_hash);

        let pages: Vec<(usize, &PageInput)> = document.pages().collect();
        let results: Vec<Result<PageResult>> = self.pool.install(|| {
            pages
                .par_iter()
                .map(|&(page_index, page)| self.analyze_page(&cache_identity, page_index, page, cancel))
                .collect()
        });

        let mut ordered = BTreeMap::new();
        for result in results {
            let page = result?;
            ordered.insert(page.page_index, page);
        }
        let pages: Vec<PageResult> = ordered.into_values().collect();
        let stats = AnalysisStats::from_pages(&pages, started.elapsed());

        tracing::info!(
            pages = stats.pages_analyzed,
            tables = stats.tables_found,
            failed = stats.pages_failed,
            cancelled = stats.pages_cancelled,
            cache_hits = stats.cache_hits,
            elapsed_ms = stats.elapsed_ms,
            "Document analysed"
        );

        Ok(DocumentResult {
            fingerprint,
            pages,
            stats,
        })
    }

    fn analyze_page(
        &self,
        cache_identity: &str,
        page_index: usize,
        page: &PageInput,
        cancel: &CancellationToken,
    ) -> Result<PageResult> {
        let key = PageCacheKey::new(cache_identity, page_index);
        let fetch = self.cache.get_or_compute(key, || {
            let outcome = run_page_pipeline(page_index, &page.fragments, &self.config, cancel);
            if outcome.status.is_done() {
                Ok(outcome.tables)
            } else {
                Err(outcome.status)
            }
        })?;

        Ok(match fetch {
            CacheFetch::Hit(tables) => {
                tracing::debug!(page = page_index, "Page served from cache");
                PageResult::new(page_index, page, PageStatus::Done, Arc::unwrap_or_clone(tables), true)
            }
            CacheFetch::Computed(tables) => {
                PageResult::new(page_index, page, PageStatus::Done, Arc::unwrap_or_clone(tables), false)
            }
            CacheFetch::Failed(status) => PageResult::new(page_index, page, status, Vec::new(), false),
        })
    }
}

/// Analyse a document on tokio's blocking thread pool.
///
/// The reconstruction itself is CPU-bound and runs on the analyzer's rayon pool; this
/// wrapper only keeps it off the async executor threads.
#[cfg(feature = "tokio-runtime")]
pub async fn analyze_document_async(
    analyzer: Arc<TableAnalyzer>,
    document: DocumentInput,
    cancel: CancellationToken,
) -> Result<DocumentResult> {
    tokio::task::spawn_blocking(move || analyzer.analyze_document_with_cancellation(&document, &cancel))
        .await
        .map_err(|e| TafelError::Other(format!("Analysis task failed: {}", e)))?
}
