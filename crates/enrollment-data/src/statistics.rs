//! Dashboard figures computed over normalized records.

use std::collections::{BTreeMap, BTreeSet};

use enrollment_core::formatting::round_to;
use enrollment_core::models::EnrollmentRecord;
use serde::Serialize;

/// Sections at or above this fill ratio are listed as nearly full.
pub const HIGH_FILL_RATIO: f64 = 0.85;
/// Sections at or below this fill ratio are listed as under-filled.
pub const LOW_FILL_RATIO: f64 = 0.40;
/// Sections with fewer students than this are listed as small.
pub const SMALL_SECTION_LIMIT: u32 = 13;

/// Per-instructor totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstructorLoad {
    pub instructor: String,
    pub sections: usize,
    pub enrolled: u64,
    pub credit_hours: u64,
    pub average_enrollment: f64,
}

/// Credit-hour production of one course (subject + number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseProduction {
    pub course: String,
    pub credit_hour_production: u64,
}

/// One section as listed on the dashboard's watch lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionSnapshot {
    pub course: String,
    pub section: String,
    pub enrolled: u32,
    pub capacity: u32,
    pub waitlist: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_time: Option<String>,
    pub instructor: String,
}

impl From<&EnrollmentRecord> for SectionSnapshot {
    fn from(r: &EnrollmentRecord) -> Self {
        Self {
            course: r.course_code(),
            section: r.section.clone(),
            enrolled: r.enrolled,
            capacity: r.capacity,
            waitlist: r.waitlist,
            days: r.days.clone(),
            meeting_time: r.meeting_time.clone(),
            instructor: r.instructor.clone(),
        }
    }
}

/// Face-to-face vs online credit-hour production.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliverySplit {
    pub face_to_face_chp: u64,
    pub online_chp: u64,
    /// Face-to-face share of all production; absent when there is none.
    pub face_to_face_share: Option<f64>,
}

/// Summary statistics of one report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportStatistics {
    pub total_sections: usize,
    pub total_enrolled: u64,
    pub average_enrollment: f64,
    pub total_credit_hour_production: u64,
    pub average_fill_rate: f64,
    pub average_waitlist: f64,
    pub average_enrollment_per_instructor: f64,
    pub instructors: Vec<InstructorLoad>,
    pub production_by_course: Vec<CourseProduction>,
    pub nearly_full: Vec<SectionSnapshot>,
    pub under_filled: Vec<SectionSnapshot>,
    pub small_sections: Vec<SectionSnapshot>,
    pub waitlisted: Vec<SectionSnapshot>,
    pub delivery: DeliverySplit,
}

impl ReportStatistics {
    /// Compute every figure. `online_locations` are the location codes of
    /// online sections, compared with inner whitespace collapsed.
    pub fn compute(records: &[EnrollmentRecord], online_locations: &[String]) -> Self {
        if records.is_empty() {
            return Self::default();
        }
        let n = records.len() as f64;

        let sections: BTreeSet<_> = records
            .iter()
            .map(|r| match &r.crn {
                Some(crn) => (r.term.clone(), crn.clone(), String::new(), String::new()),
                None => (r.term.clone(), r.subject.clone(), r.course.clone(), r.section.clone()),
            })
            .collect();

        let total_enrolled: u64 = records.iter().map(|r| u64::from(r.enrolled)).sum();
        let total_waitlist: u64 = records.iter().map(|r| u64::from(r.waitlist)).sum();
        let total_chp: u64 = records.iter().map(EnrollmentRecord::credit_hour_production).sum();
        let fill_sum: f64 = records.iter().map(EnrollmentRecord::fill_ratio).sum();

        let instructors = instructor_loads(records);
        let average_enrollment_per_instructor = if instructors.is_empty() {
            0.0
        } else {
            let sum: u64 = instructors.iter().map(|i| i.enrolled).sum();
            round_to(sum as f64 / instructors.len() as f64, 2)
        };

        Self {
            total_sections: sections.len(),
            total_enrolled,
            average_enrollment: round_to(total_enrolled as f64 / n, 2),
            total_credit_hour_production: total_chp,
            average_fill_rate: round_to(fill_sum / n, 2),
            average_waitlist: round_to(total_waitlist as f64 / n, 2),
            average_enrollment_per_instructor,
            instructors,
            production_by_course: production_by_course(records),
            nearly_full: watch_list(records, |r| r.fill_ratio() >= HIGH_FILL_RATIO),
            under_filled: watch_list(records, |r| r.fill_ratio() <= LOW_FILL_RATIO),
            small_sections: watch_list(records, |r| r.enrolled < SMALL_SECTION_LIMIT),
            waitlisted: watch_list(records, |r| r.waitlist > 0),
            delivery: delivery_split(records, online_locations),
        }
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn watch_list(
    records: &[EnrollmentRecord],
    pred: impl Fn(&EnrollmentRecord) -> bool,
) -> Vec<SectionSnapshot> {
    records.iter().filter(|r| pred(r)).map(SectionSnapshot::from).collect()
}

/// Sorted by enrollment (descending), then name.
fn instructor_loads(records: &[EnrollmentRecord]) -> Vec<InstructorLoad> {
    let mut map: BTreeMap<&str, InstructorLoad> = BTreeMap::new();
    for r in records {
        let load = map.entry(r.instructor.as_str()).or_insert_with(|| InstructorLoad {
            instructor: r.instructor.clone(),
            sections: 0,
            enrolled: 0,
            credit_hours: 0,
            average_enrollment: 0.0,
        });
        load.sections += 1;
        load.enrolled += u64::from(r.enrolled);
        load.credit_hours += u64::from(r.credit_hours);
    }

    let mut loads: Vec<InstructorLoad> = map
        .into_values()
        .map(|mut load| {
            load.average_enrollment = round_to(load.enrolled as f64 / load.sections as f64, 2);
            load
        })
        .collect();
    loads.sort_by(|a, b| b.enrolled.cmp(&a.enrolled).then_with(|| a.instructor.cmp(&b.instructor)));
    loads
}

/// Sorted by production (descending), then course.
fn production_by_course(records: &[EnrollmentRecord]) -> Vec<CourseProduction> {
    let mut map: BTreeMap<String, u64> = BTreeMap::new();
    for r in records {
        *map.entry(r.course_code()).or_insert(0) += r.credit_hour_production();
    }
    let mut rows: Vec<CourseProduction> = map
        .into_iter()
        .map(|(course, credit_hour_production)| CourseProduction {
            course,
            credit_hour_production,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.credit_hour_production
            .cmp(&a.credit_hour_production)
            .then_with(|| a.course.cmp(&b.course))
    });
    rows
}

fn delivery_split(records: &[EnrollmentRecord], online_locations: &[String]) -> DeliverySplit {
    let online: BTreeSet<String> = online_locations.iter().map(|l| collapse_whitespace(l)).collect();

    let mut split = DeliverySplit::default();
    for r in records {
        let is_online = r
            .location
            .as_deref()
            .map(|loc| online.contains(&collapse_whitespace(loc)))
            .unwrap_or(false);
        if is_online {
            split.online_chp += r.credit_hour_production();
        } else {
            split.face_to_face_chp += r.credit_hour_production();
        }
    }

    let total = split.face_to_face_chp + split.online_chp;
    if total > 0 {
        split.face_to_face_share = Some(round_to(split.face_to_face_chp as f64 / total as f64, 2));
    }
    split
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
