use std::sync::LazyLock;

use regex::Regex;

use crate::timer::error::TimerError;

const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 3_600.0;

/// Informal phrases, checked in order. Longer phrases that contain a shorter
/// one ("half an hour" contains "an hour") must come first.
static PHRASES: LazyLock<Vec<(Regex, u64)>> = LazyLock::new(|| {
    [
        (r"\bhalf\s+an\s+hour\b", 1_800),
        (r"\bhalf\s+a\s+minute\b", 30),
        (r"\bthree[\s-]+quarters?\s+(?:of\s+an\s+)?hour\b", 2_700),
        (r"\b(?:a\s+)?quarter\s+(?:of\s+an\s+)?hour\b", 900),
        (r"\ba\s+couple\s+of\s+minutes\b", 120),
        (r"\b(?:a|one)\s+seconds?\b", 1),
        (r"\b(?:a|one)\s+minutes?\b", 60),
        (r"\b(?:an|one)\s+hours?\b", 3_600),
    ]
    .into_iter()
    .map(|(pattern, seconds)| (Regex::new(pattern).expect("phrase pattern"), seconds))
    .collect()
});

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\d*\.?\d+)\s*(hours|hour|hrs|hr|h|minutes|minute|mins|min|m|seconds|second|secs|sec|s)?",
    )
    .expect("token pattern")
});

/// Converts free-form text into whole seconds. Returns 0 when nothing in the
/// text looks like a usable duration; callers treat 0 as invalid.
pub fn parse_seconds(input: &str) -> u64 {
    parse_duration(input).unwrap_or(0)
}

/// Like [`parse_seconds`] but distinguishes "nothing recognised" from "zero or
/// unusable length".
pub fn parse_duration(input: &str) -> Result<u64, TimerError> {
    let text = input.trim().to_lowercase();
    match read_seconds(&text) {
        Some(raw) => validate_seconds(raw),
        None => Err(TimerError::InvalidFormat {
            input: input.to_string(),
        }),
    }
}

/// Raw second count from the first grammar that claims `text`, or `None`
/// when none does.
fn read_seconds(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }
    if let Some(seconds) = parse_colon_groups(text) {
        return Some(seconds as f64);
    }
    PHRASES
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, seconds)| *seconds as f64)
        .or_else(|| sum_tokens(text))
}

/// Floors a raw second count, rejecting anything that would not make a
/// runnable countdown.
pub fn validate_seconds(raw: f64) -> Result<u64, TimerError> {
    if !raw.is_finite() || raw <= 0.0 {
        return Err(TimerError::InvalidDuration { value: raw });
    }
    let floored = raw.floor();
    if floored < 1.0 || floored >= u64::MAX as f64 {
        return Err(TimerError::InvalidDuration { value: raw });
    }
    Ok(floored as u64)
}

/// `H:MM:SS` or `MM:SS`. Digit-only groups of any other arity, or too large
/// to add up, are claimed (and yield 0) so they never fall through to the
/// tokenizer.
fn parse_colon_groups(text: &str) -> Option<u64> {
    if !text.contains(':') {
        return None;
    }
    let parts = text.split(':').map(str::trim).collect::<Vec<_>>();
    if !parts
        .iter()
        .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let mut numbers = Vec::with_capacity(parts.len());
    for part in parts {
        let Ok(number) = part.parse::<u64>() else {
            return Some(0);
        };
        numbers.push(number);
    }
    let (hours, minutes, seconds) = match numbers.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => (0, *m, *s),
        _ => return Some(0),
    };
    hours
        .checked_mul(3_600)
        .and_then(|total| total.checked_add(minutes.checked_mul(60)?))
        .and_then(|total| total.checked_add(seconds))
        .or(Some(0))
}

fn sum_tokens(text: &str) -> Option<f64> {
    let mut matched_any = false;
    let mut total = 0.0_f64;
    for caps in TOKEN.captures_iter(text) {
        let Some(value) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) else {
            continue;
        };
        matched_any = true;
        let multiplier = match caps.get(2).map(|m| m.as_str()) {
            Some("h" | "hr" | "hrs" | "hour" | "hours") => SECONDS_PER_HOUR,
            Some("s" | "sec" | "secs" | "second" | "seconds") => 1.0,
            // minute units and bare numbers
            _ => SECONDS_PER_MINUTE,
        };
        total += value * multiplier;
    }
    matched_any.then_some(total)
}

/// Zero-padded `HH:MM:SS`; hours grow past two digits when needed.
pub fn format_hms(total_seconds: u64) -> String {
    let hours = total_seconds / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

pub fn format_percent(percent: f64) -> String {
    format!("{:.1}%", percent.clamp(0.0, 100.0))
}
