use crate::models::RunSummary;

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use enrollment_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let rounded = round_to(value.abs(), decimals);

    let integer_part = rounded.trunc() as u64;
    let grouped = group_thousands(&integer_part.to_string());

    let result = if decimals == 0 {
        grouped
    } else {
        let frac_str = format!("{:.prec$}", rounded.fract(), prec = decimals as usize);
        // "0.50" -> ".50"
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative {
        format!("-{}", result)
    } else {
        result
    }
}

/// Round half away from zero to `decimals` places.
///
/// A half-ULP nudge keeps exact midpoints such as `1.005` from rounding down
/// because of their binary representation.
///
/// ```
/// use enrollment_core::formatting::round_to;
///
/// assert_eq!(round_to(0.93333, 4), 0.9333);
/// assert_eq!(round_to(1.005, 2), 1.01);
/// ```
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * value.abs() * factor;
    let nudged = if value < 0.0 {
        value * factor - epsilon
    } else {
        value * factor + epsilon
    };
    nudged.round() / factor
}

/// Render a 0..=1 ratio as a percentage with one decimal, e.g. `"93.3%"`.
pub fn format_percent(ratio: f64) -> String {
    format!("{}%", format_number(ratio * 100.0, 1))
}

/// Human-readable end-of-run summary: totals first, then drop reasons and
/// codes flagged for review.
pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut lines = vec![format!(
        "{} records processed, {} kept, {} dropped",
        summary.records_processed, summary.records_kept, summary.records_dropped
    )];

    for (reason, count) in &summary.drop_reasons {
        lines.push(format!("  dropped ({}): {}", reason, count));
    }
    if summary.header_rows_removed > 0 {
        lines.push(format!(
            "  header rows collapsed: {}",
            summary.header_rows_removed
        ));
    }
    if summary.records_filtered > 0 {
        lines.push(format!(
            "  outside subject filter: {}",
            summary.records_filtered
        ));
    }
    if summary.continuation_lines_merged > 0 {
        lines.push(format!(
            "  continuation lines merged: {}",
            summary.continuation_lines_merged
        ));
    }
    if !summary.unknown_subjects.is_empty() {
        lines.push(format!(
            "  subject codes for review: {}",
            summary.unknown_subjects.join(", ")
        ));
    }

    lines.join("\n")
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────
