//! Small helpers shared by the models: tolerant JSON field readers, date
//! parsing, relative-time labels and avatar resolution.
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Reads a numeric field that the backend may send as a number or a numeric string.
pub fn json_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Reads an id that may arrive as a number or a string.
pub fn json_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// First numeric value found among `keys`, in order.
pub fn first_f64(json: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| json_f64(&json[*key]))
}

/// First non-empty string found among `keys`, in order.
pub fn first_str(json: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        json[*key]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .map(String::from)
    })
}

pub fn json_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parses the timestamp formats the SCMS backend emits.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM` (taken as UTC)
/// and bare dates (midnight UTC).
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn json_datetime(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(parse_datetime)
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// Formats `then` relative to `now` the way the stream shows post times.
///
/// Under a minute is "just now"; minutes, hours and days are spelled out up to
/// a week, in either direction; anything older or further out is shown as a
/// date such as "Mar 4, 2025".
pub fn format_relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let future = delta < Duration::zero();
    let secs = delta.num_seconds().abs();

    let label = if secs < 60 {
        return "just now".to_string();
    } else if secs < 3600 {
        plural(secs / 60, "minute")
    } else if secs < 86_400 {
        plural(secs / 3600, "hour")
    } else if secs < 7 * 86_400 {
        plural(secs / 86_400, "day")
    } else {
        return then.format("%b %-d, %Y").to_string();
    };

    if future {
        format!("in {}", label)
    } else {
        format!("{} ago", label)
    }
}

/// How a user's avatar should be drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum AvatarSource {
    Url(String),
    Initials(String),
}

/// Up to two uppercase initials from a display name ("Maria dela Cruz" -> "MC").
pub fn initials(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let picked: Vec<&str> = match words.len() {
        0 => return "?".to_string(),
        1 => vec![words[0]],
        n => vec![words[0], words[n - 1]],
    };
    picked
        .iter()
        .filter_map(|w| w.chars().next())
        .flat_map(|c| c.to_uppercase())
        .collect()
}

/// Resolves a stored avatar path against the server base URL.
///
/// Absolute `http(s)://` and `data:` URLs pass through; `/storage/x.png` and
/// `storage/x.png` are joined onto `base_url`. Missing avatars fall back to
/// the user's initials.
pub fn resolve_avatar(base_url: &str, avatar: Option<&str>, name: &str) -> AvatarSource {
    let base = base_url.trim_end_matches('/');
    match avatar.map(str::trim).filter(|a| !a.is_empty() && *a != "null") {
        Some(a) if a.starts_with("http://") || a.starts_with("https://") || a.starts_with("data:") => {
            AvatarSource::Url(a.to_string())
        }
        Some(a) if a.starts_with('/') => AvatarSource::Url(format!("{}{}", base, a)),
        Some(a) => AvatarSource::Url(format!("{}/{}", base, a)),
        None => AvatarSource::Initials(initials(name)),
    }
}
