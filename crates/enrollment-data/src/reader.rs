//! Report discovery, loading and line filtering.
//!
//! Turns raw report text into the [`RawLine`]s worth tokenizing: the
//! preamble, blank lines, page breaks, repeated report headers and every
//! line matching one of the layout's boilerplate patterns are dropped, order
//! is preserved.

use std::path::{Path, PathBuf};

use enrollment_core::error::{ReportError, Result};
use enrollment_core::layout::{LayoutPatterns, ReportLayout};
use enrollment_core::models::{RawLine, ReportMetadata};
use enrollment_core::time_utils::parse_report_date;
use regex::Regex;
use tracing::{debug, warn};

/// Extensions the retrieval side saves reports under.
pub const REPORT_EXTENSIONS: [&str; 3] = ["txt", "lis", "csv"];

/// Suffixes of tables we wrote ourselves; never read back as reports.
const OUTPUT_SUFFIXES: [&str; 4] = [
    ".records.csv",
    ".aggregates.csv",
    ".records.tsv",
    ".aggregates.tsv",
];

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all report files recursively under `dir`, sorted by path.
pub fn find_report_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Report path does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_report_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Read a report from disk. Bytes that aren't UTF-8 (Latin-1 exports) are
/// replaced rather than rejected.
pub fn load_report_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|source| ReportError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decode_report_bytes(&bytes))
}

pub fn decode_report_bytes(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Line filter for one layout.
#[derive(Debug, Clone)]
pub struct ReportReader {
    skip_leading_lines: usize,
    boilerplate: Vec<Regex>,
    /// The metadata report-name pattern; its line heads every page.
    report_header: Option<Regex>,
}

impl ReportReader {
    pub fn new(layout: &ReportLayout, patterns: &LayoutPatterns) -> Self {
        Self {
            skip_leading_lines: layout.skip_leading_lines,
            boilerplate: patterns.boilerplate.clone(),
            report_header: patterns.report_name.clone(),
        }
    }

    /// Split `raw_text` into data lines.
    ///
    /// Fails with [`ReportError::MalformedInput`] when the text is empty or
    /// nothing but boilerplate remains.
    pub fn read(&self, raw_text: &str) -> Result<Vec<RawLine>> {
        if raw_text.trim().is_empty() {
            return Err(ReportError::MalformedInput("input is empty".to_string()));
        }

        let mut lines = Vec::new();
        let mut physical = 0usize;
        let mut boilerplate = 0usize;

        for (idx, line) in raw_text.split('\n').enumerate() {
            physical += 1;
            if idx < self.skip_leading_lines {
                continue;
            }

            let cleaned: String = line.chars().filter(|c| *c != '\r' && *c != '\x0c').collect();
            let cleaned = cleaned.trim_end();
            if cleaned.trim().is_empty() {
                continue;
            }
            if self.is_boilerplate(cleaned) {
                boilerplate += 1;
                continue;
            }

            lines.push(RawLine::new(idx + 1, cleaned));
        }

        debug!(
            "{} physical lines, {} boilerplate, {} data lines",
            physical,
            boilerplate,
            lines.len()
        );

        if lines.is_empty() {
            return Err(ReportError::MalformedInput(format!(
                "no data lines among {} lines once boilerplate is removed",
                physical
            )));
        }
        Ok(lines)
    }

    fn is_boilerplate(&self, line: &str) -> bool {
        self.report_header.as_ref().is_some_and(|re| re.is_match(line))
            || self.boilerplate.iter().any(|re| re.is_match(line))
    }
}

/// Pull report name, term and run date out of the report text.
///
/// Each pattern's first match wins; absent patterns leave the field empty.
pub fn scan_metadata(raw_text: &str, layout: &ReportLayout, patterns: &LayoutPatterns) -> ReportMetadata {
    let capture = |re: &Option<Regex>| -> Option<String> {
        let re = re.as_ref()?;
        raw_text.lines().find_map(|line| {
            re.captures(line)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
    };

    let run_date = capture(&patterns.run_date)
        .and_then(|raw| parse_report_date(&raw, &layout.metadata.run_date_format));

    ReportMetadata {
        report_name: capture(&patterns.report_name),
        term: capture(&patterns.metadata_term).map(|t| t.to_uppercase()),
        run_date,
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn is_report_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if OUTPUT_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        return false;
    }
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            REPORT_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
