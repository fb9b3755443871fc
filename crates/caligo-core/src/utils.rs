//! Formatting helpers shared by progress messages and reports.

use std::time::Duration;

const BYTE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Format a byte count (or rate) using binary units.
///
/// `postfix` is appended to the unit, e.g. `"/s"` for speeds.
///
/// # Examples
///
/// ```
/// use caligo_core::utils::human_readable_bytes;
///
/// assert_eq!(human_readable_bytes(1536.0, ""), "1.50 KB");
/// assert_eq!(human_readable_bytes(0.0, "/s"), "0.00 B/s");
/// ```
#[must_use]
pub fn human_readable_bytes(value: f64, postfix: &str) -> String {
    let mut value = if value.is_finite() { value.max(0.0) } else { 0.0 };
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}{postfix}", BYTE_UNITS[unit])
}

/// Format a duration as `1d 2h 3m 4s`, skipping zero components.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    if total == 0 {
        return "0s".to_string();
    }

    let parts = [
        (total / 86_400, "d"),
        ((total % 86_400) / 3_600, "h"),
        ((total % 3_600) / 60, "m"),
        (total % 60, "s"),
    ];

    parts
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, suffix)| format!("{value}{suffix}"))
        .collect::<Vec<_>>()
        .join(" ")
}
