//! Record and aggregate tables, written as CSV or TSV.
//!
//! Output is deterministic: the same records produce byte-identical files.
//! Both tables are staged under a `.part` suffix and only renamed into place
//! once both are written, so a failed export leaves no half-finished pair.
//! Write failures surface as [`ReportError::Io`] carrying the original
//! `io::Error`; nothing is retried.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use enrollment_core::error::{ReportError, Result};
use enrollment_core::formatting::round_to;
use enrollment_core::models::{EnrollmentRecord, TableFormat};
use tracing::{info, warn};

use crate::aggregator::AggregateRow;

pub const RECORD_COLUMNS: [&str; 10] = [
    "term",
    "subject",
    "course",
    "section",
    "title",
    "instructor",
    "enrolled",
    "capacity",
    "waitlist",
    "credit_hours",
];

pub const AGGREGATE_COLUMNS: [&str; 7] = [
    "term",
    "subject",
    "course",
    "section",
    "enrolled",
    "capacity",
    "fill_ratio",
];

/// Decimal places kept for fill ratios.
const RATIO_DECIMALS: u32 = 4;

/// Files written by [`export`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedTables {
    pub records: PathBuf,
    pub aggregates: PathBuf,
}

impl ExportedTables {
    /// `<stem>.records.<ext>` and `<stem>.aggregates.<ext>`.
    pub fn for_stem(stem: &Path, format: TableFormat) -> Self {
        Self {
            records: with_suffix(stem, "records", format),
            aggregates: with_suffix(stem, "aggregates", format),
        }
    }
}

/// Write both tables next to `stem`.
pub fn export(
    records: &[EnrollmentRecord],
    aggregates: &[AggregateRow],
    stem: &Path,
    format: TableFormat,
) -> Result<ExportedTables> {
    let tables = ExportedTables::for_stem(stem, format);
    let staged = ExportedTables {
        records: staging_path(&tables.records),
        aggregates: staging_path(&tables.aggregates),
    };

    let written = File::create(&staged.records)
        .map_err(ReportError::from)
        .and_then(|file| write_records(file, records, format))
        .and_then(|()| File::create(&staged.aggregates).map_err(ReportError::from))
        .and_then(|file| write_aggregates(file, aggregates, format));
    if let Err(err) = written {
        discard(&staged);
        return Err(err);
    }

    std::fs::rename(&staged.records, &tables.records)?;
    std::fs::rename(&staged.aggregates, &tables.aggregates)?;

    info!(
        "Wrote {} records to {} and {} aggregates to {}",
        records.len(),
        tables.records.display(),
        aggregates.len(),
        tables.aggregates.display()
    );
    Ok(tables)
}

/// Write the record table to any sink.
pub fn write_records<W: Write>(sink: W, records: &[EnrollmentRecord], format: TableFormat) -> Result<()> {
    let mut writer = table_writer(sink, format);
    writer.write_record(RECORD_COLUMNS).map_err(into_io)?;
    for r in records {
        let row = [
            r.term.clone(),
            r.subject.clone(),
            r.course.clone(),
            r.section.clone(),
            r.title.clone(),
            r.instructor.clone(),
            r.enrolled.to_string(),
            r.capacity.to_string(),
            r.waitlist.to_string(),
            r.credit_hours.to_string(),
        ];
        writer.write_record(&row).map_err(into_io)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the aggregate table to any sink.
pub fn write_aggregates<W: Write>(sink: W, rows: &[AggregateRow], format: TableFormat) -> Result<()> {
    let mut writer = table_writer(sink, format);
    writer.write_record(AGGREGATE_COLUMNS).map_err(into_io)?;
    for row in rows {
        let fields = [
            row.term.clone(),
            row.subject.clone(),
            row.course.clone(),
            row.section.clone(),
            row.enrolled.to_string(),
            row.capacity.to_string(),
            format_ratio(row.fill_ratio()),
        ];
        writer.write_record(&fields).map_err(into_io)?;
    }
    writer.flush()?;
    Ok(())
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn table_writer<W: Write>(sink: W, format: TableFormat) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(format.delimiter())
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(sink)
}

fn format_ratio(ratio: f64) -> String {
    format!("{:.prec$}", round_to(ratio, RATIO_DECIMALS), prec = RATIO_DECIMALS as usize)
}

fn with_suffix(stem: &Path, table: &str, format: TableFormat) -> PathBuf {
    let mut name = OsString::from(stem.as_os_str());
    name.push(format!(".{}.{}", table, format.extension()));
    PathBuf::from(name)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

fn discard(staged: &ExportedTables) {
    for path in [&staged.records, &staged.aggregates] {
        if path.is_file() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("Could not remove partial table {}: {}", path.display(), e);
            }
        }
    }
}

/// Unwrap the sink's own error; anything else is a serialisation failure.
fn into_io(err: csv::Error) -> io::Error {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, format!("{:?}", other)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Aggregator;
    use enrollment_core::error::ReportError;
    use tempfile::TempDir;

    fn record(subject: &str, section: &str, title: &str, enrolled: u32, capacity: u32) -> EnrollmentRecord {
        EnrollmentRecord {
            term: "FALL2023".to_string(),
            subject: subject.to_string(),
            course: "1010".to_string(),
            section: section.to_string(),
            title: title.to_string(),
            instructor: "Smith J".to_string(),
            enrolled,
            capacity,
            waitlist: 2,
            credit_hours: 4,
            crn: None,
            days: None,
            meeting_time: None,
            location: None,
        }
    }

    fn sample() -> Vec<EnrollmentRecord> {
        vec![
            record("BIOL", "001", "Intro Biology", 28, 30),
            record("BIOL", "002", "Biology, Honors", 10, 0),
        ]
    }

    fn records_csv(records: &[EnrollmentRecord], format: TableFormat) -> String {
        let mut buf = Vec::new();
        write_records(&mut buf, records, format).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_record_table_columns_and_values() {
        let text = records_csv(&sample(), TableFormat::Csv);
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("term,subject,course,section,title,instructor,enrolled,capacity,waitlist,credit_hours")
        );
        assert_eq!(lines.next(), Some("FALL2023,BIOL,1010,001,Intro Biology,Smith J,28,30,2,4"));
        assert_eq!(lines.next(), Some("FALL2023,BIOL,1010,002,\"Biology, Honors\",Smith J,10,0,2,4"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_tsv_uses_tabs() {
        let text = records_csv(&sample(), TableFormat::Tsv);
        assert!(text.starts_with("term\tsubject\tcourse"));
        assert!(text.contains("\tBiology, Honors\t"));
    }

    #[test]
    fn test_aggregate_fill_ratio_rounded() {
        let mut buf = Vec::new();
        write_aggregates(&mut buf, &Aggregator::aggregate(&sample()), TableFormat::Csv).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "term,subject,course,section,enrolled,capacity,fill_ratio");
        assert_eq!(lines[1], "FALL2023,BIOL,1010,001,28,30,0.9333");
        assert_eq!(lines[2], "FALL2023,BIOL,1010,002,10,0,0.0000");
    }

    #[test]
    fn test_export_file_names() {
        let tables = ExportedTables::for_stem(Path::new("/out/fall.2023"), TableFormat::Tsv);
        assert_eq!(tables.records, PathBuf::from("/out/fall.2023.records.tsv"));
        assert_eq!(tables.aggregates, PathBuf::from("/out/fall.2023.aggregates.tsv"));
    }

    #[test]
    fn test_export_is_byte_identical_on_rerun() {
        let dir = TempDir::new().unwrap();
        let records = sample();
        let aggregates = Aggregator::aggregate(&records);

        let first = export(&records, &aggregates, &dir.path().join("a"), TableFormat::Csv).unwrap();
        let second = export(&records, &aggregates, &dir.path().join("b"), TableFormat::Csv).unwrap();

        assert_eq!(
            std::fs::read(&first.records).unwrap(),
            std::fs::read(&second.records).unwrap()
        );
        assert_eq!(
            std::fs::read(&first.aggregates).unwrap(),
            std::fs::read(&second.aggregates).unwrap()
        );
    }

    #[test]
    fn test_export_leaves_no_tables_when_second_write_fails() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("fall");
        let tables = ExportedTables::for_stem(&stem, TableFormat::Csv);
        std::fs::create_dir(staging_path(&tables.aggregates)).unwrap();

        let err = export(&sample(), &[], &stem, TableFormat::Csv).unwrap_err();

        assert_eq!(err.kind(), "IOError");
        assert!(!tables.records.exists());
        assert!(!tables.aggregates.exists());
        assert!(!staging_path(&tables.records).exists());
    }

    #[test]
    fn test_export_replaces_previous_tables() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("fall");
        let records = sample();

        export(&records[..1], &[], &stem, TableFormat::Csv).unwrap();
        let tables = export(&records, &[], &stem, TableFormat::Csv).unwrap();

        let text = std::fs::read_to_string(&tables.records).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(!staging_path(&tables.records).exists());
    }

    #[test]
    fn test_export_unwritable_destination_is_io_error() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("missing").join("report");
        let err = export(&sample(), &[], &stem, TableFormat::Csv).unwrap_err();
        match err {
            ReportError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
