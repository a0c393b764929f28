//! Per-page reconstruction state machine.
//!
//! Every page moves through the stages
//!
//! ```text
//! Pending -> Indexed -> RowClustered -> ColumnAligned -> GridBuilt -> Scored -> Resolved -> Done
//! ```
//!
//! one transition at a time. Each transition consumes the previous state and produces the
//! next one, so no stage can be skipped and no stage sees partially built data. A page
//! with zero fragments goes straight from `Pending` to `Done`.
//!
//! Failures stay local to the page: an error or a panic inside a transition is recorded
//! as [`PageStatus::Failed`] together with the stage that was being computed.

use crate::core::cancellation::CancellationToken;
use crate::core::config::ReconstructionConfig;
use crate::error::{Result, TafelError};
use crate::spatial::SpatialIndex;
use crate::table::grid::check_grid_shape;
use crate::table::{
    ColumnLayout, TableCandidate, align_columns, build_grid, cluster_rows, resolve_overlaps, row_epsilon,
    score_table, segment_regions,
};
use crate::types::{Fragment, FragmentId, Row, Table};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Stages of the per-page pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStage {
    Pending,
    Indexed,
    RowClustered,
    ColumnAligned,
    GridBuilt,
    Scored,
    Resolved,
    Done,
}

impl PageStage {
    /// The stage that follows this one, `None` for `Done`.
    pub fn next(self) -> Option<PageStage> {
        match self {
            PageStage::Pending => Some(PageStage::Indexed),
            PageStage::Indexed => Some(PageStage::RowClustered),
            PageStage::RowClustered => Some(PageStage::ColumnAligned),
            PageStage::ColumnAligned => Some(PageStage::GridBuilt),
            PageStage::GridBuilt => Some(PageStage::Scored),
            PageStage::Scored => Some(PageStage::Resolved),
            PageStage::Resolved => Some(PageStage::Done),
            PageStage::Done => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PageStage::Pending => "pending",
            PageStage::Indexed => "indexed",
            PageStage::RowClustered => "row_clustered",
            PageStage::ColumnAligned => "column_aligned",
            PageStage::GridBuilt => "grid_built",
            PageStage::Scored => "scored",
            PageStage::Resolved => "resolved",
            PageStage::Done => "done",
        }
    }
}

impl fmt::Display for PageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final status of one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageStatus {
    /// All stages completed; the page's tables are valid.
    Done,
    /// A stage failed; `stage` is the stage that was being computed.
    Failed { stage: PageStage, reason: String },
    /// The page exceeded the configured fragment limit and was not processed.
    TooLarge { fragment_count: usize, limit: usize },
    /// The job was cancelled before the page finished; `stage` is the last completed stage.
    Cancelled { stage: PageStage },
}

impl PageStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, PageStatus::Done)
    }
}

/// Result of running the pipeline over one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageOutcome {
    pub page_index: usize,
    pub status: PageStatus,
    /// Empty unless `status` is `Done`.
    pub tables: Vec<Table>,
    /// Every stage the page reached, in order.
    pub trace: Vec<PageStage>,
}

/// Rows of one table region with the columns aligned over its fragments.
#[derive(Debug)]
struct Region {
    rows: Vec<Row>,
    layout: ColumnLayout,
}

/// Intermediate output of each stage.
#[derive(Debug)]
enum PageState {
    Pending,
    Indexed(SpatialIndex),
    RowClustered { index: SpatialIndex, rows: Vec<Row> },
    ColumnAligned(Vec<Region>),
    GridBuilt(Vec<TableCandidate>),
    Scored(Vec<TableCandidate>),
    Resolved(Vec<TableCandidate>),
    Done(Vec<Table>),
}

struct PageContext<'a> {
    page_index: usize,
    fragments: &'a [Fragment],
    config: &'a ReconstructionConfig,
}

impl PageState {
    fn stage(&self) -> PageStage {
        match self {
            PageState::Pending => PageStage::Pending,
            PageState::Indexed(_) => PageStage::Indexed,
            PageState::RowClustered { .. } => PageStage::RowClustered,
            PageState::ColumnAligned(_) => PageStage::ColumnAligned,
            PageState::GridBuilt(_) => PageStage::GridBuilt,
            PageState::Scored(_) => PageStage::Scored,
            PageState::Resolved(_) => PageStage::Resolved,
            PageState::Done(_) => PageStage::Done,
        }
    }

    fn into_tables(self) -> Vec<Table> {
        match self {
            PageState::Done(tables) => tables,
            _ => Vec::new(),
        }
    }

    fn advance(self, ctx: &PageContext<'_>) -> Result<PageState> {
        match self {
            PageState::Pending => Ok(PageState::Indexed(SpatialIndex::new(ctx.fragments))),

            PageState::Indexed(index) => {
                let epsilon = row_epsilon(ctx.fragments, ctx.config);
                let rows = cluster_rows(ctx.fragments, &index, epsilon);
                tracing::trace!(page = ctx.page_index, epsilon, rows = rows.len(), "Rows clustered");
                Ok(PageState::RowClustered { index, rows })
            }

            PageState::RowClustered { index, rows } => Ok(PageState::ColumnAligned(align_regions(ctx, &index, rows)?)),

            PageState::ColumnAligned(regions) => regions
                .into_iter()
                .map(|region| {
                    let table = build_grid(ctx.page_index, ctx.fragments, region.rows, region.layout.columns)?;
                    Ok(TableCandidate {
                        table,
                        column_epsilon: region.layout.epsilon,
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(PageState::GridBuilt),

            PageState::GridBuilt(mut candidates) => {
                for candidate in &mut candidates {
                    let (confidence, metrics) = score_table(
                        &candidate.table,
                        ctx.fragments,
                        candidate.column_epsilon,
                        &ctx.config.scoring,
                    );
                    candidate.table.confidence = confidence;
                    candidate.table.metrics = metrics;
                }
                Ok(PageState::Scored(candidates))
            }

            PageState::Scored(candidates) => Ok(PageState::Resolved(resolve_overlaps(
                candidates,
                ctx.fragments,
                ctx.config,
            ))),

            PageState::Resolved(candidates) => {
                let tables: Vec<Table> = candidates.into_iter().map(|candidate| candidate.table).collect();
                for table in &tables {
                    check_grid_shape(table)?;
                }
                Ok(PageState::Done(tables))
            }

            PageState::Done(tables) => Ok(PageState::Done(tables)),
        }
    }
}

/// Split rows into regions and align columns for each one.
///
/// When the page splits into several regions, the union of all regions is added as one
/// more candidate; overlap resolution then decides between the split and merged readings.
fn align_regions(ctx: &PageContext<'_>, index: &SpatialIndex, rows: Vec<Row>) -> Result<Vec<Region>> {
    let ranges = segment_regions(&rows, ctx.fragments, ctx.config.max_row_gap_ratio);

    let mut regions = Vec::with_capacity(ranges.len() + 1);
    for range in &ranges {
        regions.push(region_from_rows(ctx, index, rows[range.clone()].to_vec())?);
    }
    if ranges.len() > 1 {
        regions.push(region_from_rows(ctx, index, rows)?);
    }

    tracing::trace!(
        page = ctx.page_index,
        regions = ranges.len(),
        candidates = regions.len(),
        "Columns aligned"
    );
    Ok(regions)
}

/// Collect a region's fragments with a band query over its vertical span.
///
/// Regions are separated by blank space, so the band must hold exactly the fragments of
/// the region's rows.
fn region_from_rows(ctx: &PageContext<'_>, index: &SpatialIndex, rows: Vec<Row>) -> Result<Region> {
    let members = rows.iter().map(|row| row.fragments.len()).sum::<usize>();
    let (top, bottom) = rows
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(top, bottom), row| {
            (top.min(row.y_span.0), bottom.max(row.y_span.1))
        });

    let ids: Vec<FragmentId> = index.query_vertical(top, bottom);
    if ids.len() != members {
        return Err(TafelError::pipeline(format!(
            "region on page {} spans {} fragments but its rows hold {}",
            ctx.page_index,
            ids.len(),
            members
        )));
    }

    let layout = align_columns(ctx.fragments, index, &ids, ctx.config);
    Ok(Region { rows, layout })
}

/// Run the full pipeline over one page's fragments.
///
/// Never returns an error: every failure is reported through [`PageOutcome::status`].
pub fn run_page_pipeline(
    page_index: usize,
    fragments: &[Fragment],
    config: &ReconstructionConfig,
    cancel: &CancellationToken,
) -> PageOutcome {
    drive(page_index, fragments, config, cancel, PageState::advance)
}

fn drive<F>(
    page_index: usize,
    fragments: &[Fragment],
    config: &ReconstructionConfig,
    cancel: &CancellationToken,
    step: F,
) -> PageOutcome
where
    F: Fn(PageState, &PageContext<'_>) -> Result<PageState>,
{
    let outcome = |status: PageStatus, tables: Vec<Table>, trace: Vec<PageStage>| PageOutcome {
        page_index,
        status,
        tables,
        trace,
    };

    if fragments.len() > config.max_fragments_per_page {
        tracing::warn!(
            page = page_index,
            fragments = fragments.len(),
            limit = config.max_fragments_per_page,
            "Page exceeds fragment limit, skipping"
        );
        return outcome(
            PageStatus::TooLarge {
                fragment_count: fragments.len(),
                limit: config.max_fragments_per_page,
            },
            Vec::new(),
            Vec::new(),
        );
    }

    let mut trace = vec![PageStage::Pending];
    if cancel.is_cancelled() {
        return outcome(
            PageStatus::Cancelled {
                stage: PageStage::Pending,
            },
            Vec::new(),
            trace,
        );
    }
    if fragments.is_empty() {
        trace.push(PageStage::Done);
        return outcome(PageStatus::Done, Vec::new(), trace);
    }

    let ctx = PageContext {
        page_index,
        fragments,
        config,
    };
    let mut state = PageState::Pending;

    let tables = loop {
        let current = state.stage();
        let Some(target) = current.next() else {
            break state.into_tables();
        };
        if cancel.is_cancelled() {
            tracing::debug!(page = page_index, stage = %current, "Page cancelled");
            return outcome(PageStatus::Cancelled { stage: current }, Vec::new(), trace);
        }

        let reason = match panic::catch_unwind(AssertUnwindSafe(|| step(state, &ctx))) {
            Ok(Ok(next)) => {
                trace.push(next.stage());
                state = next;
                continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload),
        };

        tracing::warn!(page = page_index, stage = %target, reason = %reason, "Page pipeline failed");
        return outcome(PageStatus::Failed { stage: target, reason }, Vec::new(), trace);
    };

    tracing::debug!(page = page_index, tables = tables.len(), "Page done");
    outcome(PageStatus::Done, tables, trace)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {}", message)
    } else {
        "panic with non-string payload".to_string()
    }
}
