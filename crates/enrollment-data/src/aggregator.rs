//! Per-section aggregation of enrollment records.
//!
//! Rows are keyed by `(term, subject, course, section)` and kept in a
//! `BTreeMap` so output is always sorted by key. Partial aggregates of a
//! partitioned record set merge into the same rows as aggregating the whole
//! set at once.

use std::collections::BTreeMap;

use enrollment_core::models::{fill_ratio, EnrollmentRecord, SectionKey};
use serde::Serialize;

// ── AggregateRow ──────────────────────────────────────────────────────────────

/// Summed counts for one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateRow {
    pub term: String,
    pub subject: String,
    pub course: String,
    pub section: String,
    pub enrolled: u64,
    pub capacity: u64,
    pub waitlist: u64,
    /// Number of records folded into this row.
    pub records: usize,
}

impl AggregateRow {
    fn new(key: SectionKey) -> Self {
        Self {
            term: key.term,
            subject: key.subject,
            course: key.course,
            section: key.section,
            enrolled: 0,
            capacity: 0,
            waitlist: 0,
            records: 0,
        }
    }

    pub fn key(&self) -> SectionKey {
        SectionKey {
            term: self.term.clone(),
            subject: self.subject.clone(),
            course: self.course.clone(),
            section: self.section.clone(),
        }
    }

    /// Add a single record's counts to the running totals.
    pub fn add_record(&mut self, record: &EnrollmentRecord) {
        self.enrolled += u64::from(record.enrolled);
        self.capacity += u64::from(record.capacity);
        self.waitlist += u64::from(record.waitlist);
        self.records += 1;
    }

    /// Fold another row's counts into this one.
    pub fn add_row(&mut self, other: &AggregateRow) {
        self.enrolled += other.enrolled;
        self.capacity += other.capacity;
        self.waitlist += other.waitlist;
        self.records += other.records;
    }

    /// Enrolled over capacity, 0 when capacity is 0.
    pub fn fill_ratio(&self) -> f64 {
        fill_ratio(self.enrolled, self.capacity)
    }
}

/// Grand totals over a set of aggregate rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateTotals {
    pub sections: usize,
    pub records: usize,
    pub enrolled: u64,
    pub capacity: u64,
    pub waitlist: u64,
}

impl AggregateTotals {
    pub fn fill_ratio(&self) -> f64 {
        fill_ratio(self.enrolled, self.capacity)
    }
}

// ── Aggregator ────────────────────────────────────────────────────────────────

/// Stateless helper that groups records by section.
pub struct Aggregator;

impl Aggregator {
    /// Group `records` by section key. Rows are sorted by key (ascending).
    pub fn aggregate(records: &[EnrollmentRecord]) -> Vec<AggregateRow> {
        let mut map: BTreeMap<SectionKey, AggregateRow> = BTreeMap::new();

        for record in records {
            let key = record.key();
            map.entry(key.clone())
                .or_insert_with(|| AggregateRow::new(key))
                .add_record(record);
        }

        map.into_values().collect()
    }

    /// Combine two aggregate sets, summing rows that share a key.
    pub fn merge(a: &[AggregateRow], b: &[AggregateRow]) -> Vec<AggregateRow> {
        let mut map: BTreeMap<SectionKey, AggregateRow> = BTreeMap::new();

        for row in a.iter().chain(b) {
            let key = row.key();
            map.entry(key.clone())
                .or_insert_with(|| AggregateRow::new(key))
                .add_row(row);
        }

        map.into_values().collect()
    }

    /// Sum every row into a single [`AggregateTotals`].
    pub fn totals(rows: &[AggregateRow]) -> AggregateTotals {
        let mut totals = AggregateTotals {
            sections: rows.len(),
            ..Default::default()
        };
        for row in rows {
            totals.records += row.records;
            totals.enrolled += row.enrolled;
            totals.capacity += row.capacity;
            totals.waitlist += row.waitlist;
        }
        totals
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
