//! Splits data lines into named raw fields.
//!
//! Column positions come from the injected [`ReportLayout`]. A line whose
//! record-start columns are all blank is a continuation of the previous
//! record (a wrapped course title); its text is appended to the layout's
//! continuation field.

use enrollment_core::error::{ReportError, Result};
use enrollment_core::layout::{ColumnRef, FieldKind, LineFormat, ReportLayout};
use enrollment_core::models::{RawLine, TokenRecord};
use tracing::{debug, warn};

/// Classification of a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Record(TokenRecord),
    /// Text to append to the previous record's continuation field.
    Continuation { line_number: usize, text: String },
    Skip,
}

/// Token records of one report, continuations already merged.
#[derive(Debug, Clone, Default)]
pub struct TokenizedReport {
    pub records: Vec<TokenRecord>,
    pub continuation_lines_merged: usize,
    pub lines_skipped: usize,
}

/// Line tokenizer bound to one layout.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    layout: &'a ReportLayout,
}

impl<'a> Tokenizer<'a> {
    pub fn new(layout: &'a ReportLayout) -> Self {
        Self { layout }
    }

    /// Classify and split one line.
    ///
    /// Fails only when a record line is missing a required column outright.
    pub fn tokenize(&self, line: &RawLine) -> Result<LineKind> {
        let text = line.text.trim_end();
        if text.chars().count() < self.layout.min_width {
            debug!("line {}: shorter than {} columns, skipped", line.number, self.layout.min_width);
            return Ok(LineKind::Skip);
        }

        let tokens = self.split(text);

        let record_start_blank = self.layout.record_start.iter().all(|kind| {
            self.token(&tokens, *kind)
                .map(|t| t.trim().is_empty())
                .unwrap_or(true)
        });
        if record_start_blank {
            let text = self
                .layout
                .continuation_field
                .and_then(|kind| self.token(&tokens, kind))
                .map(|t| t.trim().to_string())
                .unwrap_or_default();
            if text.is_empty() {
                return Ok(LineKind::Skip);
            }
            return Ok(LineKind::Continuation {
                line_number: line.number,
                text,
            });
        }

        let mut fields = Vec::with_capacity(self.layout.fields.len());
        for (spec, token) in self.layout.fields.iter().zip(tokens) {
            match token {
                Some(value) => fields.push((spec.field, value)),
                None if spec.required => {
                    return Err(ReportError::Tokenization {
                        line_number: line.number,
                        line: line.text.clone(),
                        reason: format!("required column {} not found", spec.field),
                    });
                }
                None => fields.push((spec.field, String::new())),
            }
        }

        Ok(LineKind::Record(TokenRecord {
            line_number: line.number,
            source: line.text.clone(),
            fields,
        }))
    }

    /// Tokenize a whole report, merging continuation lines into the record
    /// before them.
    ///
    /// Data lines that yield no record at all mean the layout doesn't fit
    /// the report, which is reported against the first line.
    pub fn tokenize_all(&self, lines: &[RawLine]) -> Result<TokenizedReport> {
        let mut report = TokenizedReport::default();

        for line in lines {
            match self.tokenize(line)? {
                LineKind::Record(record) => report.records.push(record),
                LineKind::Continuation { line_number, text } => {
                    if self.merge_continuation(&mut report.records, &text) {
                        report.continuation_lines_merged += 1;
                    } else {
                        warn!("line {}: continuation with no record before it", line_number);
                        report.lines_skipped += 1;
                    }
                }
                LineKind::Skip => report.lines_skipped += 1,
            }
        }

        if report.records.is_empty() {
            if let Some(first) = lines.first() {
                return Err(ReportError::Tokenization {
                    line_number: first.number,
                    line: first.text.clone(),
                    reason: format!("no line matches the {} layout", self.layout.name),
                });
            }
        }

        debug!(
            "{} records, {} continuations merged, {} lines skipped",
            report.records.len(),
            report.continuation_lines_merged,
            report.lines_skipped
        );
        Ok(report)
    }

    // ── Private ───────────────────────────────────────────────────────────────

    fn merge_continuation(&self, records: &mut [TokenRecord], text: &str) -> bool {
        let Some(kind) = self.layout.continuation_field else {
            return false;
        };
        let Some(field) = records.last_mut().and_then(|r| r.get_mut(kind)) else {
            return false;
        };
        let trimmed_len = field.trim_end().len();
        field.truncate(trimmed_len);
        if !field.trim().is_empty() {
            field.push(' ');
        }
        field.push_str(text);
        true
    }

    /// One token per layout field, `None` when the column isn't on the line.
    fn split(&self, text: &str) -> Vec<Option<String>> {
        match &self.layout.format {
            LineFormat::FixedWidth => {
                let chars: Vec<char> = text.chars().collect();
                self.layout
                    .fields
                    .iter()
                    .map(|spec| match spec.column {
                        ColumnRef::Span { start, width } if start < chars.len() => {
                            let end = (start + width).min(chars.len());
                            Some(chars[start..end].iter().collect())
                        }
                        _ => None,
                    })
                    .collect()
            }
            LineFormat::Delimited { delimiter } => {
                let parts: Vec<&str> = text.split(*delimiter).collect();
                self.layout
                    .fields
                    .iter()
                    .map(|spec| match spec.column {
                        ColumnRef::Index(i) => parts.get(i).map(|p| p.to_string()),
                        ColumnRef::Span { .. } => None,
                    })
                    .collect()
            }
        }
    }

    fn token<'t>(&self, tokens: &'t [Option<String>], kind: FieldKind) -> Option<&'t str> {
        let pos = self.layout.position(kind)?;
        tokens.get(pos)?.as_deref()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use enrollment_core::layout::FieldSpec;

    const SCENARIO: &str = "FALL2023 BIOL 1010 001 Intro Biology  Smith J   28  30   2   4";

    fn raw(number: usize, text: &str) -> RawLine {
        RawLine::new(number, text)
    }

    fn record(kind: LineKind) -> TokenRecord {
        match kind {
            LineKind::Record(r) => r,
            other => panic!("expected record, got {:?}", other),
        }
    }

    fn pipe_layout() -> ReportLayout {
        let field = |field, index, required| FieldSpec {
            field,
            column: ColumnRef::Index(index),
            required,
            label: None,
        };
        ReportLayout {
            name: "pipe".to_string(),
            format: LineFormat::Delimited { delimiter: '|' },
            fields: vec![
                field(FieldKind::Term, 0, true),
                field(FieldKind::Subject, 1, true),
                field(FieldKind::Course, 2, true),
                field(FieldKind::Section, 3, true),
                field(FieldKind::Title, 4, false),
                field(FieldKind::Enrolled, 5, false),
            ],
            record_start: vec![FieldKind::Term],
            min_width: 0,
            boilerplate_patterns: vec![],
            header_patterns: vec![],
            ..ReportLayout::standard()
        }
    }

    // ── tokenize ──────────────────────────────────────────────────────────────

    #[test]
    fn test_tokenize_scenario_line() {
        let layout = ReportLayout::standard();
        let rec = record(Tokenizer::new(&layout).tokenize(&raw(1, SCENARIO)).unwrap());

        assert_eq!(rec.get(FieldKind::Term).map(str::trim), Some("FALL2023"));
        assert_eq!(rec.get(FieldKind::Subject).map(str::trim), Some("BIOL"));
        assert_eq!(rec.get(FieldKind::Course).map(str::trim), Some("1010"));
        assert_eq!(rec.get(FieldKind::Section).map(str::trim), Some("001"));
        assert_eq!(rec.get(FieldKind::Title).map(str::trim), Some("Intro Biology"));
        assert_eq!(rec.get(FieldKind::Instructor).map(str::trim), Some("Smith J"));
        assert_eq!(rec.get(FieldKind::Enrolled).map(str::trim), Some("28"));
        assert_eq!(rec.get(FieldKind::Capacity).map(str::trim), Some("30"));
        assert_eq!(rec.get(FieldKind::Waitlist).map(str::trim), Some("2"));
        assert_eq!(rec.get(FieldKind::CreditHours).map(str::trim), Some("4"));
    }

    #[test]
    fn test_tokenize_missing_trailing_fields_are_empty() {
        let layout = ReportLayout::standard();
        let rec = record(
            Tokenizer::new(&layout)
                .tokenize(&raw(1, "FALL2023 BIOL 1010 001 Intro Biology"))
                .unwrap(),
        );
        assert_eq!(rec.get(FieldKind::Enrolled), Some(""));
        assert_eq!(rec.get(FieldKind::CreditHours), Some(""));
        assert_eq!(rec.fields.len(), layout.fields.len());
    }

    #[test]
    fn test_tokenize_blank_record_start_is_continuation() {
        let layout = ReportLayout::standard();
        let line = format!("{}Laboratory", " ".repeat(23));
        let kind = Tokenizer::new(&layout).tokenize(&raw(7, &line)).unwrap();
        assert_eq!(
            kind,
            LineKind::Continuation {
                line_number: 7,
                text: "Laboratory".to_string()
            }
        );
    }

    #[test]
    fn test_tokenize_blank_record_start_without_title_is_skip() {
        let layout = ReportLayout::standard();
        let line = format!("{}Smith J", " ".repeat(38));
        assert_eq!(Tokenizer::new(&layout).tokenize(&raw(1, &line)).unwrap(), LineKind::Skip);
    }

    #[test]
    fn test_tokenize_short_line_is_skip() {
        let layout = ReportLayout::standard();
        assert_eq!(Tokenizer::new(&layout).tokenize(&raw(1, "12")).unwrap(), LineKind::Skip);
    }

    #[test]
    fn test_tokenize_missing_required_column_is_error() {
        let layout = ReportLayout::standard();
        let err = Tokenizer::new(&layout)
            .tokenize(&raw(9, "FALL2023 BIOL"))
            .unwrap_err();
        match err {
            ReportError::Tokenization { line_number, line, reason } => {
                assert_eq!(line_number, 9);
                assert_eq!(line, "FALL2023 BIOL");
                assert!(reason.contains("course"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_tokenize_delimited_line() {
        let layout = pipe_layout();
        let rec = record(
            Tokenizer::new(&layout)
                .tokenize(&raw(1, "FALL2023|BIOL|1010|001|Intro Biology|28"))
                .unwrap(),
        );
        assert_eq!(rec.get(FieldKind::Title), Some("Intro Biology"));
        assert_eq!(rec.get(FieldKind::Enrolled), Some("28"));
    }

    #[test]
    fn test_tokenize_delimited_missing_optional_field() {
        let layout = pipe_layout();
        let rec = record(
            Tokenizer::new(&layout)
                .tokenize(&raw(1, "FALL2023|BIOL|1010|001"))
                .unwrap(),
        );
        assert_eq!(rec.get(FieldKind::Enrolled), Some(""));
    }

    #[test]
    fn test_tokenize_delimited_missing_required_field() {
        let layout = pipe_layout();
        let err = Tokenizer::new(&layout)
            .tokenize(&raw(3, "FALL2023|BIOL"))
            .unwrap_err();
        assert!(matches!(err, ReportError::Tokenization { line_number: 3, .. }));
    }

    #[test]
    fn test_tokenize_non_ascii_counts_characters() {
        let layout = ReportLayout::standard();
        let line = "FALL2023 SPAN 2010 001 Español II     Muñoz R   20  25   0   3";
        let rec = record(Tokenizer::new(&layout).tokenize(&raw(1, line)).unwrap());
        assert_eq!(rec.get(FieldKind::Title).map(str::trim), Some("Español II"));
        assert_eq!(rec.get(FieldKind::Instructor).map(str::trim), Some("Muñoz R"));
        assert_eq!(rec.get(FieldKind::Enrolled).map(str::trim), Some("20"));
    }

    // ── tokenize_all ──────────────────────────────────────────────────────────

    #[test]
    fn test_tokenize_all_merges_continuation_into_previous_title() {
        let layout = ReportLayout::standard();
        let lines = vec![
            raw(1, "FALL2023 BIOL 1020 001 Principles of  Smith J   28  30   2   4"),
            raw(2, &format!("{}Biology II", " ".repeat(23))),
            raw(3, SCENARIO),
        ];
        let report = Tokenizer::new(&layout).tokenize_all(&lines).unwrap();

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.continuation_lines_merged, 1);
        assert_eq!(
            report.records[0].get(FieldKind::Title),
            Some("Principles of Biology II")
        );
    }

    #[test]
    fn test_tokenize_all_leading_continuation_is_skipped() {
        let layout = ReportLayout::standard();
        let lines = vec![raw(1, &format!("{}Orphan", " ".repeat(23))), raw(2, SCENARIO)];
        let report = Tokenizer::new(&layout).tokenize_all(&lines).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.lines_skipped, 1);
        assert_eq!(report.continuation_lines_merged, 0);
    }

    #[test]
    fn test_tokenize_all_without_any_record_is_error() {
        let layout = ReportLayout::standard();
        let lines = vec![raw(4, "xx"), raw(5, &format!("{}Orphan", " ".repeat(23)))];
        let err = Tokenizer::new(&layout).tokenize_all(&lines).unwrap_err();
        match err {
            ReportError::Tokenization { line_number, reason, .. } => {
                assert_eq!(line_number, 4);
                assert!(reason.contains("standard"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
