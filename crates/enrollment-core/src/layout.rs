//! Report layouts: where each field lives on a report line.
//!
//! A layout is plain data (serde) so an institution can describe its own
//! export format in JSON instead of patching column offsets in code. Two
//! layouts ship built in: [`ReportLayout::standard`] for the whitespace
//! aligned term report and [`ReportLayout::banner9`] for the Banner 9
//! SWRCGSR "Show Output" text.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

/// Current layout schema version understood by this crate.
pub const LAYOUT_VERSION: u32 = 1;

/// Default accepted term codes: `FALL2023`-style names or Banner `202040`.
pub const DEFAULT_TERM_PATTERN: &str = r"^(?:(?:FALL|SPRING|SUMMER|WINTER)\d{4}|\d{6})$";

// ── Fields ────────────────────────────────────────────────────────────────────

/// Every field the pipeline knows how to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Term,
    Subject,
    Course,
    Section,
    Title,
    Instructor,
    Enrolled,
    Capacity,
    Waitlist,
    CreditHours,
    Crn,
    Days,
    MeetingTime,
    Location,
}

/// Target type a raw token is coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Upper-cased identifier (term, subject, course and section numbers).
    Code,
    /// Free text with inner whitespace preserved.
    Text,
    /// Non-negative integer, blank reads as zero.
    Count,
    /// Non-negative integral number that may be written as a decimal.
    CreditHours,
    /// Meeting time span, converted to 24-hour form when recognisable.
    MeetingTime,
}

impl FieldKind {
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Term => "term",
            FieldKind::Subject => "subject",
            FieldKind::Course => "course",
            FieldKind::Section => "section",
            FieldKind::Title => "title",
            FieldKind::Instructor => "instructor",
            FieldKind::Enrolled => "enrolled",
            FieldKind::Capacity => "capacity",
            FieldKind::Waitlist => "waitlist",
            FieldKind::CreditHours => "credit_hours",
            FieldKind::Crn => "crn",
            FieldKind::Days => "days",
            FieldKind::MeetingTime => "meeting_time",
            FieldKind::Location => "location",
        }
    }

    pub fn value_type(self) -> ValueType {
        match self {
            FieldKind::Term
            | FieldKind::Subject
            | FieldKind::Course
            | FieldKind::Section
            | FieldKind::Crn => ValueType::Code,
            FieldKind::Title | FieldKind::Instructor | FieldKind::Days | FieldKind::Location => {
                ValueType::Text
            }
            FieldKind::Enrolled | FieldKind::Capacity | FieldKind::Waitlist => ValueType::Count,
            FieldKind::CreditHours => ValueType::CreditHours,
            FieldKind::MeetingTime => ValueType::MeetingTime,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Columns ───────────────────────────────────────────────────────────────────

/// Location of a field on a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRef {
    /// Character span for fixed-width reports.
    Span { start: usize, width: usize },
    /// Zero-based field index for delimited reports.
    Index(usize),
}

/// How lines are split into columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineFormat {
    FixedWidth,
    Delimited { delimiter: char },
}

/// One field of a layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: FieldKind,
    pub column: ColumnRef,
    /// A record line whose required column is missing entirely is corrupt.
    #[serde(default)]
    pub required: bool,
    /// Column heading as printed in the report banner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FieldSpec {
    fn span(field: FieldKind, start: usize, width: usize, required: bool, label: &str) -> Self {
        Self {
            field,
            column: ColumnRef::Span { start, width },
            required,
            label: Some(label.to_string()),
        }
    }
}

/// Patterns for pulling report metadata out of the preamble.
///
/// Each pattern must carry one capture group holding the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataPatterns {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_date: Option<String>,
    /// `chrono` format of the captured run date.
    #[serde(default = "default_run_date_format")]
    pub run_date_format: String,
}

fn default_run_date_format() -> String {
    "%d-%b-%Y".to_string()
}

fn default_term_pattern() -> String {
    DEFAULT_TERM_PATTERN.to_string()
}

fn default_version() -> u32 {
    LAYOUT_VERSION
}

// ── ReportLayout ──────────────────────────────────────────────────────────────

/// Complete description of one report format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLayout {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub format: LineFormat,
    pub fields: Vec<FieldSpec>,
    /// Fields that are never blank on the first line of a record.
    pub record_start: Vec<FieldKind>,
    /// Field that wrapped text on a continuation line is appended to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_field: Option<FieldKind>,
    /// Lines shorter than this (trailing blanks removed) are skipped.
    #[serde(default)]
    pub min_width: usize,
    /// Physical lines to discard before looking for data.
    #[serde(default)]
    pub skip_leading_lines: usize,
    /// Banners, footers and rules dropped by the reader.
    #[serde(default)]
    pub boilerplate_patterns: Vec<String>,
    /// Header lines that leaked into the data, collapsed by the normalizer.
    #[serde(default)]
    pub header_patterns: Vec<String>,
    #[serde(default = "default_term_pattern")]
    pub term_pattern: String,
    #[serde(default)]
    pub metadata: MetadataPatterns,
}

impl ReportLayout {
    /// Whitespace-aligned term report:
    ///
    /// ```text
    /// FALL2023 BIOL 1010 001 Intro Biology  Smith J   28  30   2   4
    /// ```
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            version: LAYOUT_VERSION,
            format: LineFormat::FixedWidth,
            fields: vec![
                FieldSpec::span(FieldKind::Term, 0, 9, true, "Term"),
                FieldSpec::span(FieldKind::Subject, 9, 5, true, "Subj"),
                FieldSpec::span(FieldKind::Course, 14, 5, true, "Crse"),
                FieldSpec::span(FieldKind::Section, 19, 4, true, "Sec"),
                FieldSpec::span(FieldKind::Title, 23, 15, false, "Title"),
                FieldSpec::span(FieldKind::Instructor, 38, 9, false, "Instructor"),
                FieldSpec::span(FieldKind::Enrolled, 47, 4, false, "Enrl"),
                FieldSpec::span(FieldKind::Capacity, 51, 4, false, "Cap"),
                FieldSpec::span(FieldKind::Waitlist, 55, 4, false, "Wait"),
                FieldSpec::span(FieldKind::CreditHours, 59, 4, false, "Cr"),
            ],
            record_start: vec![FieldKind::Term, FieldKind::Subject],
            continuation_field: Some(FieldKind::Title),
            min_width: 4,
            skip_leading_lines: 0,
            boilerplate_patterns: vec![
                r"(?i)^\s*enrollment report\b".to_string(),
                r"^Term\s+Subj\b".to_string(),
                r"^\s*[-=]{3,}".to_string(),
                r"(?i)^\s*page\s+\d+".to_string(),
                r"(?i)^\s*(run|printed|generated)\b.*\d{1,2}:\d{2}".to_string(),
                r"^\s*\*\*".to_string(),
            ],
            header_patterns: vec![r"(?i)^\s*term\s+subj(ect)?\s+(crse|course|number)\b".to_string()],
            term_pattern: default_term_pattern(),
            metadata: MetadataPatterns::default(),
        }
    }

    /// Banner 9 SWRCGSR text output (140 columns, seven preamble lines).
    ///
    /// The term is not printed per row; it comes from the `Term:` preamble
    /// line.
    pub fn banner9() -> Self {
        Self {
            name: "banner9".to_string(),
            version: LAYOUT_VERSION,
            format: LineFormat::FixedWidth,
            fields: vec![
                FieldSpec::span(FieldKind::Subject, 0, 5, true, "Subject"),
                FieldSpec::span(FieldKind::Course, 5, 5, true, "Number"),
                FieldSpec::span(FieldKind::Crn, 10, 6, true, "CRN"),
                FieldSpec::span(FieldKind::Section, 16, 4, true, "Section"),
                FieldSpec::span(FieldKind::Title, 28, 16, false, "Title"),
                FieldSpec::span(FieldKind::CreditHours, 44, 7, false, "Credit"),
                FieldSpec::span(FieldKind::Capacity, 51, 5, false, "Max"),
                FieldSpec::span(FieldKind::Enrolled, 56, 5, false, "Enrolled"),
                FieldSpec::span(FieldKind::Waitlist, 66, 5, false, "WList"),
                FieldSpec::span(FieldKind::Days, 71, 8, false, "Days"),
                FieldSpec::span(FieldKind::MeetingTime, 79, 12, false, "Time"),
                FieldSpec::span(FieldKind::Location, 91, 8, false, "Loc"),
                FieldSpec::span(FieldKind::Instructor, 121, 19, false, "Instructor"),
            ],
            record_start: vec![FieldKind::Crn],
            continuation_field: Some(FieldKind::Title),
            min_width: 20,
            skip_leading_lines: 7,
            boilerplate_patterns: vec![
                r"^\s*SWRCGSR\b".to_string(),
                r"^\s*---".to_string(),
                r"^\s*Sub".to_string(),
                r"^\s*Ter".to_string(),
                r"^\s*\*\* ".to_string(),
            ],
            header_patterns: vec![r"(?i)^\s*subject\s+number\s+crn\b".to_string()],
            term_pattern: r"^\d{6}$".to_string(),
            metadata: MetadataPatterns {
                report_name: Some(r"^\s*(SWRCGSR)\b".to_string()),
                term: Some(r"(?i)^\s*term\b\W*(\d{6})".to_string()),
                run_date: Some(r"(\d{2}-[A-Za-z]{3}-\d{4})".to_string()),
                run_date_format: default_run_date_format(),
            },
        }
    }

    /// Look up a built-in layout by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "standard" => Some(Self::standard()),
            "banner9" => Some(Self::banner9()),
            _ => None,
        }
    }

    /// Load a layout from a JSON file and validate it.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ReportError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let layout: ReportLayout = serde_json::from_str(&content)?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn field(&self, kind: FieldKind) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.field == kind)
    }

    pub fn has_field(&self, kind: FieldKind) -> bool {
        self.field(kind).is_some()
    }

    /// Column labels in field order, for spotting leaked header rows.
    pub fn column_labels(&self) -> Vec<(FieldKind, &str)> {
        self.fields
            .iter()
            .filter_map(|f| f.label.as_deref().map(|l| (f.field, l)))
            .collect()
    }

    /// Position of `kind` within a token record built from this layout.
    pub fn position(&self, kind: FieldKind) -> Option<usize> {
        self.fields.iter().position(|f| f.field == kind)
    }

    /// Check structural consistency before any line is read.
    pub fn validate(&self) -> Result<()> {
        if self.version > LAYOUT_VERSION {
            return Err(ReportError::Config(format!(
                "layout {} has version {}, newest supported is {}",
                self.name, self.version, LAYOUT_VERSION
            )));
        }
        if self.fields.is_empty() {
            return Err(ReportError::Config(format!("layout {} defines no fields", self.name)));
        }

        let mut seen = std::collections::HashSet::new();
        for spec in &self.fields {
            if !seen.insert(spec.field) {
                return Err(ReportError::Config(format!(
                    "layout {} defines {} twice",
                    self.name, spec.field
                )));
            }
            match (&self.format, &spec.column) {
                (LineFormat::FixedWidth, ColumnRef::Span { width, .. }) if *width == 0 => {
                    return Err(ReportError::Config(format!(
                        "layout {}: {} has zero width",
                        self.name, spec.field
                    )));
                }
                (LineFormat::FixedWidth, ColumnRef::Index(_)) => {
                    return Err(ReportError::Config(format!(
                        "layout {}: {} uses a field index in a fixed-width layout",
                        self.name, spec.field
                    )));
                }
                (LineFormat::Delimited { .. }, ColumnRef::Span { .. }) => {
                    return Err(ReportError::Config(format!(
                        "layout {}: {} uses a column span in a delimited layout",
                        self.name, spec.field
                    )));
                }
                _ => {}
            }
        }

        for kind in [FieldKind::Subject, FieldKind::Course, FieldKind::Section] {
            if !self.has_field(kind) {
                return Err(ReportError::Config(format!(
                    "layout {} is missing the {} field",
                    self.name, kind
                )));
            }
        }
        if !self.has_field(FieldKind::Term) && self.metadata.term.is_none() {
            return Err(ReportError::Config(format!(
                "layout {} has neither a term column nor a term metadata pattern",
                self.name
            )));
        }

        if self.record_start.is_empty() {
            return Err(ReportError::Config(format!(
                "layout {} names no record-start fields",
                self.name
            )));
        }
        for kind in self.record_start.iter().chain(self.continuation_field.iter()) {
            if !self.has_field(*kind) {
                return Err(ReportError::Config(format!(
                    "layout {} refers to undefined field {}",
                    self.name, kind
                )));
            }
        }

        self.patterns().map(|_| ())
    }

    /// Compile every regular expression in the layout.
    pub fn patterns(&self) -> Result<LayoutPatterns> {
        let metadata = &self.metadata;
        Ok(LayoutPatterns {
            boilerplate: compile_all(&self.boilerplate_patterns)?,
            header: compile_all(&self.header_patterns)?,
            term: compile(&self.term_pattern)?,
            report_name: metadata.report_name.as_deref().map(compile).transpose()?,
            metadata_term: metadata.term.as_deref().map(compile).transpose()?,
            run_date: metadata.run_date.as_deref().map(compile).transpose()?,
        })
    }
}

/// Compiled form of a layout's regular expressions.
#[derive(Debug, Clone)]
pub struct LayoutPatterns {
    pub boilerplate: Vec<Regex>,
    pub header: Vec<Regex>,
    pub term: Regex,
    pub report_name: Option<Regex>,
    pub metadata_term: Option<Regex>,
    pub run_date: Option<Regex>,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| ReportError::Config(format!("invalid pattern {:?}: {}", pattern, e)))
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| compile(p)).collect()
}
