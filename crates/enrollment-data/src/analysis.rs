//! Main report pipeline.
//!
//! Reader → Tokenizer → Normalizer, then aggregation and statistics over the
//! normalized records. Returns a [`ProcessedReport`] ready for export.

use std::path::{Path, PathBuf};
use std::time::Instant;

use enrollment_core::error::{ReportError, Result};
use enrollment_core::models::{EnrollmentRecord, ReportMetadata, RunSummary};
use enrollment_core::settings::PipelineOptions;
use tracing::{debug, info};

use crate::aggregator::{AggregateRow, Aggregator};
use crate::normalizer::Normalizer;
use crate::reader::{find_report_files, load_report_text, scan_metadata, ReportReader};
use crate::statistics::ReportStatistics;
use crate::tokenizer::Tokenizer;

// ── Public types ──────────────────────────────────────────────────────────────

/// Everything produced from one report.
#[derive(Debug, Clone)]
pub struct ProcessedReport {
    pub metadata: ReportMetadata,
    pub records: Vec<EnrollmentRecord>,
    /// Sorted by section key.
    pub aggregates: Vec<AggregateRow>,
    pub summary: RunSummary,
    pub statistics: ReportStatistics,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run the full pipeline over report text.
///
/// 1. Scan the preamble for report metadata.
/// 2. Drop boilerplate and split into data lines.
/// 3. Tokenize, merging continuation lines.
/// 4. Normalize, falling back to the preamble term.
/// 5. Aggregate and compute statistics.
pub fn process_report(raw_text: &str, options: &PipelineOptions) -> Result<ProcessedReport> {
    let started = Instant::now();
    let layout = &options.layout;
    let patterns = layout.patterns()?;

    // ── Step 1: Metadata ──────────────────────────────────────────────────────
    let metadata = scan_metadata(raw_text, layout, &patterns);

    // ── Step 2: Lines ─────────────────────────────────────────────────────────
    let lines = ReportReader::new(layout, &patterns).read(raw_text)?;

    // ── Step 3: Tokens ────────────────────────────────────────────────────────
    let tokenized = Tokenizer::new(layout).tokenize_all(&lines)?;

    // ── Step 4: Records ───────────────────────────────────────────────────────
    let normalized = Normalizer::new(layout, &patterns, &options.vocabulary)
        .with_subject_filter(&options.subject_filter)
        .with_fallback_term(metadata.term.clone())
        .normalize(tokenized.records);

    let mut summary = normalized.summary;
    summary.continuation_lines_merged = tokenized.continuation_lines_merged;
    summary.lines_skipped = tokenized.lines_skipped;

    // ── Step 5: Aggregates ────────────────────────────────────────────────────
    let aggregates = Aggregator::aggregate(&normalized.records);
    let statistics = ReportStatistics::compute(&normalized.records, &options.online_locations);

    debug!(
        "{} layout: {} lines, {} records, {} sections in {:.3}s",
        layout.name,
        lines.len(),
        normalized.records.len(),
        aggregates.len(),
        started.elapsed().as_secs_f64()
    );

    Ok(ProcessedReport {
        metadata,
        records: normalized.records,
        aggregates,
        summary,
        statistics,
    })
}

/// Load and process a single report file.
pub fn process_file(path: &Path, options: &PipelineOptions) -> Result<ProcessedReport> {
    info!("Processing {}", path.display());
    let text = load_report_text(path)?;
    process_report(&text, options)
}

/// The reports behind `path`: the file itself, or every report under a
/// directory in path order.
///
/// Callers process them one at a time so each finished report is counted
/// before a later one fails.
pub fn report_paths(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let files = find_report_files(path);
    if files.is_empty() {
        return Err(ReportError::MalformedInput(format!(
            "no report files under {}",
            path.display()
        )));
    }
    info!("Found {} report files under {}", files.len(), path.display());
    Ok(files)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
