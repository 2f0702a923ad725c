use chrono::NaiveDate;
use tracing::warn;

// ── Meeting times ─────────────────────────────────────────────────────────────

/// Convert a report meeting time such as `"0100-0215PM"` to 24-hour
/// `"13:00-14:15"`.
///
/// The AM/PM marker belongs to the end time. The start time is moved into
/// the afternoon only when that keeps it before the end, so `"1100-1215PM"`
/// stays `"11:00-12:15"`. Anything that doesn't parse (`"TBA"`, blanks) is
/// returned trimmed and unchanged.
pub fn to_24_hour(raw: &str) -> String {
    let trimmed = raw.trim();
    match parse_meeting_time(trimmed) {
        Some(((sh, sm), (eh, em))) => format!("{:02}:{:02}-{:02}:{:02}", sh, sm, eh, em),
        None => trimmed.to_string(),
    }
}

type Clock = (u32, u32);

fn parse_meeting_time(s: &str) -> Option<(Clock, Clock)> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let upper = compact.to_uppercase();
    let (span, pm) = if let Some(rest) = upper.strip_suffix("PM") {
        (rest, true)
    } else if let Some(rest) = upper.strip_suffix("AM") {
        (rest, false)
    } else {
        return None;
    };

    let (start, end) = span.split_once('-')?;
    let (mut sh, sm) = parse_hhmm(start)?;
    let (mut eh, em) = parse_hhmm(end)?;

    if pm {
        if eh < 12 {
            eh += 12;
        }
        if sh < 12 && (sh + 12) * 60 + sm <= eh * 60 + em {
            sh += 12;
        }
    }
    Some(((sh, sm), (eh, em)))
}

fn parse_hhmm(s: &str) -> Option<Clock> {
    if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u32 = s[..2].parse().ok()?;
    let minute: u32 = s[2..].parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

// ── Report dates ──────────────────────────────────────────────────────────────

/// Parse a report run date such as `"15-AUG-2020"` with the given `chrono`
/// format. Month names match case-insensitively.
///
/// Returns `None` (and logs) when the text doesn't match.
pub fn parse_report_date(raw: &str, format: &str) -> Option<NaiveDate> {
    let cleaned = raw.trim().trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
    match NaiveDate::parse_from_str(cleaned, format) {
        Ok(date) => Some(date),
        Err(e) => {
            warn!("could not parse report date {:?} as {}: {}", raw, format, e);
            None
        }
    }
}
