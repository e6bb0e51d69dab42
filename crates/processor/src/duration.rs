//! Duration parsing utilities.

use anyhow::Context;
use std::time::Duration;

/// Parse a time period such as `"500ms"`, `"30s"`, `"0 sec"`, `"5 min"`,
/// `"1h"`, `"2 days"` or a plain number of seconds (`"300"`).
///
/// Units are case-insensitive and may be separated from the number by
/// whitespace.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty duration string");
    }

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num_str, unit) = s.split_at(split);
    if num_str.is_empty() {
        anyhow::bail!("Invalid duration value: {s}");
    }
    let value: u64 = num_str
        .parse()
        .with_context(|| format!("Invalid duration value: {s}"))?;

    let duration = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Duration::from_secs(value),
        "ms" | "millis" | "msec" | "milliseconds" => Duration::from_millis(value),
        "m" | "min" | "mins" | "minute" | "minutes" => Duration::from_secs(value * 60),
        "h" | "hr" | "hour" | "hours" => Duration::from_secs(value * 3600),
        "d" | "day" | "days" => Duration::from_secs(value * 86_400),
        other => anyhow::bail!("Unknown time unit '{other}' in duration: {s}"),
    };
    Ok(duration)
}
