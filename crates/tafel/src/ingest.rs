//! Fragment ingestion.
//!
//! Raw OCR records come in as [`FragmentRecord`]s (or Tesseract TSV) and leave as
//! validated [`Fragment`]s grouped by page in a [`DocumentInput`]. Records that break the
//! fragment invariants are dropped with a warning and counted against their page; they
//! never fail the page or the document.

use crate::error::{Result, TafelError};
use crate::types::{BoundingBox, Fragment};
use crate::utils::fingerprint_fragments;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tesseract TSV level of word rows.
const TSV_WORD_LEVEL: u32 = 5;

/// Minimum number of fields in a TSV row (level through text).
const TSV_MIN_FIELDS: usize = 12;

/// One raw text element as produced by an OCR engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentRecord {
    pub text: String,
    pub page_index: i64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
}

impl TryFrom<FragmentRecord> for Fragment {
    type Error = TafelError;

    fn try_from(record: FragmentRecord) -> Result<Self> {
        let page_index = usize::try_from(record.page_index).map_err(|e| {
            TafelError::invalid_fragment_with_source(format!("negative page index {}", record.page_index), e)
        })?;
        Fragment::new(
            record.text,
            BoundingBox::new(record.x, record.y, record.width, record.height),
            page_index,
            record.font_size,
        )
    }
}

/// Extract word fragments from Tesseract TSV output.
///
/// Only word rows (level 5) with a confidence of at least `min_confidence` are kept.
/// Page numbers in TSV are 1-based and become 0-based page indices. Rows with an
/// unparsable page number or coordinate, or that do not form a valid fragment, are
/// skipped with a warning.
pub fn fragments_from_tsv(tsv_data: &str, min_confidence: f64) -> Vec<Fragment> {
    let mut fragments = Vec::new();

    for (line_num, line) in tsv_data.lines().enumerate() {
        if line_num == 0 {
            continue;
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < TSV_MIN_FIELDS {
            continue;
        }

        let level = fields[0].trim().parse::<u32>().unwrap_or(0);
        if level != TSV_WORD_LEVEL {
            continue;
        }

        let conf = fields[10].trim().parse::<f64>().unwrap_or(-1.0);
        if conf < min_confidence {
            continue;
        }

        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }

        let page_num = fields[1].trim().parse::<usize>().ok().filter(|&page| page >= 1);
        let geometry: Option<Vec<f64>> = fields[6..10].iter().map(|field| field.trim().parse::<f64>().ok()).collect();
        let (Some(page_num), Some(geometry)) = (page_num, geometry) else {
            tracing::warn!(line = line_num, text, "Dropping TSV word with unparsable page or geometry");
            continue;
        };
        let bbox = BoundingBox::new(geometry[0], geometry[1], geometry[2], geometry[3]);

        match Fragment::new(text, bbox, page_num - 1, None) {
            Ok(fragment) => fragments.push(fragment),
            Err(e) => tracing::warn!(line = line_num, error = %e, "Dropping invalid TSV word"),
        }
    }

    fragments
}

/// Fragments of one page plus the number of records dropped during ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageInput {
    pub fragments: Vec<Fragment>,
    pub rejected_fragments: usize,
}

/// A document's fragments grouped by page, ready for analysis.
///
/// Pages are kept in ascending page order. A page may be present with no fragments
/// (a blank page), which analyses to `Done` with no tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentInput {
    fingerprint: Option<String>,
    pages: BTreeMap<usize, PageInput>,
    rejected_records: usize,
}

impl DocumentInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group already validated fragments by their page index.
    pub fn from_fragments(fragments: impl IntoIterator<Item = Fragment>) -> Self {
        let mut document = Self::new();
        for fragment in fragments {
            document.add_fragment(fragment);
        }
        document
    }

    /// Validate raw records and group them by page.
    ///
    /// Invalid records are dropped and logged. Those with a usable page index are counted
    /// in that page's `rejected_fragments`; the rest in [`rejected_records`](Self::rejected_records).
    pub fn from_records(records: impl IntoIterator<Item = FragmentRecord>) -> Self {
        let mut document = Self::new();
        for record in records {
            let page = usize::try_from(record.page_index).ok();
            match Fragment::try_from(record) {
                Ok(fragment) => document.add_fragment(fragment),
                Err(e) => {
                    tracing::warn!(page = ?page, error = %e, "Dropping invalid fragment");
                    match page {
                        Some(page_index) => document.pages.entry(page_index).or_default().rejected_fragments += 1,
                        None => document.rejected_records += 1,
                    }
                }
            }
        }
        document
    }

    /// Parse a JSON array of [`FragmentRecord`]s.
    ///
    /// # Errors
    ///
    /// Returns `TafelError::Serialization` when the JSON does not describe a record array.
    /// Individual invalid records are dropped, not reported as errors.
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<FragmentRecord> = serde_json::from_str(json)?;
        Ok(Self::from_records(records))
    }

    /// Use a caller-provided fingerprint (for example a hash of the source file) as the
    /// cache identity of this document.
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn add_fragment(&mut self, fragment: Fragment) {
        self.pages.entry(fragment.page_index()).or_default().fragments.push(fragment);
    }

    /// Make sure `page_index` exists, even if it never receives a fragment.
    pub fn ensure_page(&mut self, page_index: usize) -> &mut PageInput {
        self.pages.entry(page_index).or_default()
    }

    /// Cache identity of the document: the provided fingerprint, or a hash of every
    /// fragment in page order.
    pub fn fingerprint(&self) -> String {
        match &self.fingerprint {
            Some(fingerprint) => fingerprint.clone(),
            None => fingerprint_fragments(self.pages.values().flat_map(|page| page.fragments.iter())),
        }
    }

    pub fn page(&self, page_index: usize) -> Option<&PageInput> {
        self.pages.get(&page_index)
    }

    /// Pages in ascending page order.
    pub fn pages(&self) -> impl Iterator<Item = (usize, &PageInput)> {
        self.pages.iter().map(|(&index, page)| (index, page))
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn fragment_count(&self) -> usize {
        self.pages.values().map(|page| page.fragments.len()).sum()
    }

    /// Records dropped because they had no usable page index.
    pub fn rejected_records(&self) -> usize {
        self.rejected_records
    }
}
