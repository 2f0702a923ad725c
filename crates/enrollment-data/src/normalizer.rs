//! Token records to typed [`EnrollmentRecord`]s.
//!
//! Invalid records are dropped and counted, never fatal. Header rows that
//! leaked through the reader are collapsed and counted separately.

use std::collections::BTreeSet;

use enrollment_core::error::{DropReason, NormalizationError};
use enrollment_core::layout::{FieldKind, LayoutPatterns, ReportLayout, ValueType};
use enrollment_core::models::{EnrollmentRecord, RunSummary, TokenRecord};
use enrollment_core::time_utils::to_24_hour;
use enrollment_core::vocabulary::{Canonical, SubjectVocabulary};
use tracing::debug;

type RecordResult<T> = std::result::Result<T, NormalizationError>;

/// Typed records of one report plus the counters gathered on the way.
#[derive(Debug, Clone, Default)]
pub struct NormalizedReport {
    pub records: Vec<EnrollmentRecord>,
    pub summary: RunSummary,
}

/// Coerces token records for one layout.
#[derive(Debug, Clone)]
pub struct Normalizer<'a> {
    layout: &'a ReportLayout,
    patterns: &'a LayoutPatterns,
    vocabulary: &'a SubjectVocabulary,
    subject_filter: Option<&'a BTreeSet<String>>,
    fallback_term: Option<String>,
}

impl<'a> Normalizer<'a> {
    pub fn new(
        layout: &'a ReportLayout,
        patterns: &'a LayoutPatterns,
        vocabulary: &'a SubjectVocabulary,
    ) -> Self {
        Self {
            layout,
            patterns,
            vocabulary,
            subject_filter: None,
            fallback_term: None,
        }
    }

    /// Keep only records whose canonical subject is in `filter`. An empty
    /// filter keeps everything.
    pub fn with_subject_filter(mut self, filter: &'a BTreeSet<String>) -> Self {
        self.subject_filter = (!filter.is_empty()).then_some(filter);
        self
    }

    /// Term used when a record carries none, usually the one printed in the
    /// report preamble.
    pub fn with_fallback_term(mut self, term: Option<String>) -> Self {
        self.fallback_term = term.map(|t| t.trim().to_uppercase()).filter(|t| !t.is_empty());
        self
    }

    /// Normalize every token record, in order.
    pub fn normalize(&self, records: Vec<TokenRecord>) -> NormalizedReport {
        let mut report = NormalizedReport::default();
        let mut unknown = BTreeSet::new();

        for token in &records {
            report.summary.records_processed += 1;

            if self.is_header(token) {
                debug!("line {}: header row collapsed", token.line_number);
                report.summary.header_rows_removed += 1;
                continue;
            }

            let record = match self.normalize_record(token) {
                Ok(record) => record,
                Err(e) => {
                    debug!("{}", e);
                    report.summary.record_drop(e.reason);
                    continue;
                }
            };

            if let Some(filter) = self.subject_filter {
                if !filter.contains(&record.subject) {
                    report.summary.records_filtered += 1;
                    continue;
                }
            }

            if let Canonical::Unknown(code) = self.vocabulary.canonicalize(&record.subject) {
                unknown.insert(code);
            }
            report.records.push(record);
        }

        report.summary.records_kept = report.records.len();
        report.summary.unknown_subjects = unknown.into_iter().collect();
        report
    }

    /// Coerce a single token record.
    pub fn normalize_record(&self, token: &TokenRecord) -> RecordResult<EnrollmentRecord> {
        let line = token.line_number;
        let text = |kind| token.get(kind).map(str::trim).unwrap_or_default().to_string();
        let optional = |kind: FieldKind| {
            let value = token.get(kind).map(str::trim).filter(|v| !v.is_empty())?;
            Some(match kind.value_type() {
                ValueType::Code => value.to_uppercase(),
                ValueType::MeetingTime => to_24_hour(value),
                _ => value.to_string(),
            })
        };

        let term = self.term(token)?;
        let subject = self
            .vocabulary
            .canonicalize(&required_code(token, line, FieldKind::Subject)?)
            .into_code();
        let course = required_code(token, line, FieldKind::Course)?;
        let section = required_code(token, line, FieldKind::Section)?;

        Ok(EnrollmentRecord {
            term,
            subject,
            course,
            section,
            title: text(FieldKind::Title),
            instructor: text(FieldKind::Instructor),
            enrolled: number(token, line, FieldKind::Enrolled)?,
            capacity: number(token, line, FieldKind::Capacity)?,
            waitlist: number(token, line, FieldKind::Waitlist)?,
            credit_hours: number(token, line, FieldKind::CreditHours)?,
            crn: optional(FieldKind::Crn),
            days: optional(FieldKind::Days),
            meeting_time: optional(FieldKind::MeetingTime),
            location: optional(FieldKind::Location),
        })
    }

    /// `true` when the record is a column banner rather than data.
    pub fn is_header(&self, token: &TokenRecord) -> bool {
        if self.patterns.header.iter().any(|re| re.is_match(&token.source)) {
            return true;
        }

        let mut matched = 0;
        for (kind, label) in self.layout.column_labels() {
            let value = token.get(kind).map(str::trim).unwrap_or_default();
            if value.is_empty() {
                continue;
            }
            if !value.eq_ignore_ascii_case(label) {
                return false;
            }
            matched += 1;
        }
        matched >= 2
    }

    // ── Private ───────────────────────────────────────────────────────────────

    fn term(&self, token: &TokenRecord) -> RecordResult<String> {
        let value = token
            .get(FieldKind::Term)
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .or_else(|| self.fallback_term.clone())
            .ok_or_else(|| reject(token.line_number, FieldKind::Term, "", DropReason::MissingValue))?;

        if !self.patterns.term.is_match(&value) {
            return Err(reject(
                token.line_number,
                FieldKind::Term,
                &value,
                DropReason::MalformedTermCode,
            ));
        }
        Ok(value)
    }
}

// ── Field coercion ────────────────────────────────────────────────────────────

fn reject(line_number: usize, field: FieldKind, value: &str, reason: DropReason) -> NormalizationError {
    NormalizationError {
        line_number,
        field,
        value: value.to_string(),
        reason,
    }
}

fn required_code(token: &TokenRecord, line: usize, kind: FieldKind) -> RecordResult<String> {
    let value = token.get(kind).map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(reject(line, kind, value, DropReason::MissingValue));
    }
    Ok(value.to_uppercase())
}

/// Numeric field coerced by its value type; blank reads as 0.
fn number(token: &TokenRecord, line: usize, kind: FieldKind) -> RecordResult<u32> {
    let value = token.get(kind).map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Ok(0);
    }
    let parsed = match kind.value_type() {
        ValueType::CreditHours => parse_credit_hours(value),
        _ => parse_count(value),
    };
    parsed.map_err(|reason| reject(line, kind, value, reason))
}

fn parse_count(value: &str) -> std::result::Result<u32, DropReason> {
    match value.parse::<i64>() {
        Ok(n) if n < 0 => Err(DropReason::NegativeCount),
        Ok(n) => u32::try_from(n).map_err(|_| DropReason::NonNumericCount),
        Err(_) => Err(DropReason::NonNumericCount),
    }
}

/// Integral hours written as `3` or `3.000`.
fn parse_credit_hours(value: &str) -> std::result::Result<u32, DropReason> {
    let hours: f64 = value.parse().map_err(|_| DropReason::InvalidCreditHours)?;
    if !hours.is_finite() || hours < 0.0 || hours.fract() != 0.0 || hours > f64::from(u32::MAX) {
        return Err(DropReason::InvalidCreditHours);
    }
    Ok(hours as u32)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
