//! Small text helpers shared by the widgets and API.

use chrono::{DateTime, NaiveDate, Utc};

pub const ELLIPSIS: char = '…';

/// Cut `s` to at most `max` characters, ending with `…` when shortened.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out: String = s.chars().take(max - 1).collect();
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    out.push(ELLIPSIS);
    out
}

/// Escape text for XML/SVG text nodes and attribute values.
pub fn escape_xml(s: &str) -> String {
    html_escape::encode_quoted_attribute(s).to_string()
}

/// "just now", "5 minutes ago", "yesterday", "3 weeks ago", ...
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = now.signed_duration_since(then).num_seconds();
    if secs < 60 {
        return "just now".to_string();
    }
    let minutes = secs / 60;
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return plural(hours, "hour");
    }
    days_ago(hours / 24)
}

/// Day-granular variant for calendar dates: "today", "yesterday", ...
pub fn relative_day(date: NaiveDate, today: NaiveDate) -> String {
    let days = today.signed_duration_since(date).num_days();
    if days <= 0 {
        return "today".to_string();
    }
    days_ago(days)
}

fn days_ago(days: i64) -> String {
    match days {
        1 => "yesterday".to_string(),
        d if d < 7 => plural(d, "day"),
        d if d < 30 => plural(d / 7, "week"),
        d if d < 365 => plural((d / 30).max(1), "month"),
        d => plural(d / 365, "year"),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Letterboxd-style stars: `3.5 -> "★★★½"`.
pub fn rating_stars(rating: f32) -> String {
    let halves = (rating.clamp(0.0, 5.0) * 2.0).round() as usize;
    let mut out = "★".repeat(halves / 2);
    if halves % 2 == 1 {
        out.push('½');
    }
    out
}
