use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DropReason;
use crate::layout::FieldKind;

/// One physical line of a report that survived boilerplate filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 1-based line number in the source text.
    pub number: usize,
    pub text: String,
}

impl RawLine {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

/// Raw string fields of one record, aligned with the layout's field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub line_number: usize,
    /// Source line, kept for header detection and error messages.
    pub source: String,
    pub fields: Vec<(FieldKind, String)>,
}

impl TokenRecord {
    pub fn get(&self, kind: FieldKind) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_mut(&mut self, kind: FieldKind) -> Option<&mut String> {
        self.fields
            .iter_mut()
            .find(|(k, _)| *k == kind)
            .map(|(_, v)| v)
    }
}

/// A fully typed row of the enrollment report.
///
/// Counts are unsigned, so the non-negative invariant is carried by the
/// type. `enrolled <= capacity` is deliberately not enforced: registrar
/// overrides produce over-enrolled sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub term: String,
    pub subject: String,
    pub course: String,
    pub section: String,
    pub title: String,
    pub instructor: String,
    pub enrolled: u32,
    pub capacity: u32,
    pub waitlist: u32,
    pub credit_hours: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<String>,
    /// 24-hour `HH:MM-HH:MM`, or the raw text (`TBA`) when unrecognised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl EnrollmentRecord {
    /// Grouping key used by the aggregator.
    pub fn key(&self) -> SectionKey {
        SectionKey {
            term: self.term.clone(),
            subject: self.subject.clone(),
            course: self.course.clone(),
            section: self.section.clone(),
        }
    }

    /// Subject and course number, e.g. `"BIOL1010"`.
    pub fn course_code(&self) -> String {
        format!("{}{}", self.subject, self.course)
    }

    /// Credit-hour production: credit hours times enrolled students.
    pub fn credit_hour_production(&self) -> u64 {
        u64::from(self.credit_hours) * u64::from(self.enrolled)
    }

    /// Enrolled over capacity, 0 when capacity is 0.
    pub fn fill_ratio(&self) -> f64 {
        fill_ratio(self.enrolled.into(), self.capacity.into())
    }
}

/// `(term, subject, course, section)`, ordered lexicographically field by field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SectionKey {
    pub term: String,
    pub subject: String,
    pub course: String,
    pub section: String,
}

/// Enrolled over capacity, defined as 0 when capacity is 0.
pub fn fill_ratio(enrolled: u64, capacity: u64) -> f64 {
    if capacity == 0 {
        0.0
    } else {
        enrolled as f64 / capacity as f64
    }
}

/// Output table format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    #[default]
    Csv,
    Tsv,
}

impl TableFormat {
    pub fn delimiter(self) -> u8 {
        match self {
            TableFormat::Csv => b',',
            TableFormat::Tsv => b'\t',
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Tsv => "tsv",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "csv" => Some(TableFormat::Csv),
            "tsv" => Some(TableFormat::Tsv),
            _ => None,
        }
    }
}

/// Facts about a report taken from its preamble.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportMetadata {
    pub report_name: Option<String>,
    pub term: Option<String>,
    pub run_date: Option<NaiveDate>,
}

impl ReportMetadata {
    /// Canonical archive name `<REPORT>_<TERM>_<YYYYMMDD>.<ext>`, when all
    /// three parts are known.
    pub fn archive_file_name(&self, extension: &str) -> Option<String> {
        let name = self.report_name.as_deref()?;
        let term = self.term.as_deref()?;
        let date = self.run_date?;
        Some(format!(
            "{}_{}_{}.{}",
            name,
            term,
            date.format("%Y%m%d"),
            extension.trim_start_matches('.')
        ))
    }
}

/// Counters gathered over one run of the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Token records handed to the normalizer.
    pub records_processed: usize,
    pub records_kept: usize,
    pub records_dropped: usize,
    pub drop_reasons: BTreeMap<DropReason, usize>,
    pub header_rows_removed: usize,
    /// Records outside the configured subject filter.
    pub records_filtered: usize,
    pub continuation_lines_merged: usize,
    pub lines_skipped: usize,
    /// Subject codes missing from the vocabulary, sorted and unique.
    pub unknown_subjects: Vec<String>,
}

impl RunSummary {
    pub fn record_drop(&mut self, reason: DropReason) {
        self.records_dropped += 1;
        *self.drop_reasons.entry(reason).or_insert(0) += 1;
    }

    /// Fold another report's counters into this one.
    pub fn absorb(&mut self, other: &RunSummary) {
        self.records_processed += other.records_processed;
        self.records_kept += other.records_kept;
        self.records_dropped += other.records_dropped;
        for (reason, count) in &other.drop_reasons {
            *self.drop_reasons.entry(*reason).or_insert(0) += count;
        }
        self.header_rows_removed += other.header_rows_removed;
        self.records_filtered += other.records_filtered;
        self.continuation_lines_merged += other.continuation_lines_merged;
        self.lines_skipped += other.lines_skipped;
        for code in &other.unknown_subjects {
            if let Err(pos) = self.unknown_subjects.binary_search(code) {
                self.unknown_subjects.insert(pos, code.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(enrolled: u32, capacity: u32, credit_hours: u32) -> EnrollmentRecord {
        EnrollmentRecord {
            term: "FALL2023".to_string(),
            subject: "BIOL".to_string(),
            course: "1010".to_string(),
            section: "001".to_string(),
            title: "Intro Biology".to_string(),
            instructor: "Smith J".to_string(),
            enrolled,
            capacity,
            waitlist: 0,
            credit_hours,
            crn: None,
            days: None,
            meeting_time: None,
            location: None,
        }
    }

    #[test]
    fn test_fill_ratio_zero_capacity() {
        assert_eq!(record(5, 0, 3).fill_ratio(), 0.0);
        assert!((record(15, 30, 3).fill_ratio() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_credit_hour_production() {
        assert_eq!(record(28, 30, 4).credit_hour_production(), 112);
    }

    #[test]
    fn test_course_code_and_key() {
        let r = record(1, 1, 1);
        assert_eq!(r.course_code(), "BIOL1010");
        assert_eq!(r.key().section, "001");
    }

    #[test]
    fn test_section_key_orders_field_by_field() {
        let a = SectionKey {
            term: "FALL2023".into(),
            subject: "BIOL".into(),
            course: "1010".into(),
            section: "002".into(),
        };
        let b = SectionKey {
            section: "010".into(),
            ..a.clone()
        };
        let c = SectionKey {
            subject: "CHEM".into(),
            section: "001".into(),
            ..a.clone()
        };
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_token_record_lookup() {
        let mut rec = TokenRecord {
            line_number: 1,
            source: String::new(),
            fields: vec![
                (FieldKind::Term, "   ".to_string()),
                (FieldKind::Title, "Lab".to_string()),
            ],
        };
        assert_eq!(rec.get(FieldKind::Title), Some("Lab"));
        assert_eq!(rec.get(FieldKind::Crn), None);
        rec.get_mut(FieldKind::Title).unwrap().push_str(" II");
        assert_eq!(rec.get(FieldKind::Title), Some("Lab II"));
    }

    #[test]
    fn test_archive_file_name() {
        let meta = ReportMetadata {
            report_name: Some("SWRCGSR".into()),
            term: Some("202040".into()),
            run_date: NaiveDate::from_ymd_opt(2020, 8, 15),
        };
        assert_eq!(
            meta.archive_file_name("csv").as_deref(),
            Some("SWRCGSR_202040_20200815.csv")
        );
        assert_eq!(
            meta.archive_file_name(".txt").as_deref(),
            Some("SWRCGSR_202040_20200815.txt")
        );
    }

    #[test]
    fn test_archive_file_name_needs_all_parts() {
        let meta = ReportMetadata {
            report_name: Some("SWRCGSR".into()),
            term: None,
            run_date: NaiveDate::from_ymd_opt(2020, 8, 15),
        };
        assert!(meta.archive_file_name("csv").is_none());
    }

    #[test]
    fn test_summary_absorb_merges_counts_and_subjects() {
        let mut a = RunSummary::default();
        a.records_processed = 3;
        a.record_drop(DropReason::NonNumericCount);
        a.unknown_subjects = vec!["ZOO".into()];

        let mut b = RunSummary::default();
        b.records_processed = 2;
        b.record_drop(DropReason::NonNumericCount);
        b.record_drop(DropReason::MalformedTermCode);
        b.unknown_subjects = vec!["ART".into(), "ZOO".into()];

        a.absorb(&b);
        assert_eq!(a.records_processed, 5);
        assert_eq!(a.records_dropped, 3);
        assert_eq!(a.drop_reasons[&DropReason::NonNumericCount], 2);
        assert_eq!(a.drop_reasons[&DropReason::MalformedTermCode], 1);
        assert_eq!(a.unknown_subjects, vec!["ART".to_string(), "ZOO".to_string()]);
    }
}
