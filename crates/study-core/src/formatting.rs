use chrono::NaiveDate;

/// Round `value` to `decimals` places, half away from zero.
///
/// # Examples
///
/// ```
/// use study_core::formatting::round_to;
///
/// assert_eq!(round_to(1.25, 1), 1.3);
/// assert_eq!(round_to(0.04, 1), 0.0);
/// assert_eq!(round_to(2.0, 1), 2.0);
/// ```
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10_f64.powi(decimals as i32);
    // Nudge by a relative epsilon so midpoints like 1.15 (stored as 1.1499..)
    // still round up.
    let epsilon = f64::EPSILON * value.abs() * factor;
    ((value * factor) + epsilon.copysign(value)).round() / factor
}

/// Format a duration in minutes as `"45m"`, `"3h"` or `"3h 45m"`.
///
/// # Examples
///
/// ```
/// use study_core::formatting::format_time;
///
/// assert_eq!(format_time(45.0),  "45m");
/// assert_eq!(format_time(60.0),  "1h");
/// assert_eq!(format_time(225.0), "3h 45m");
/// ```
pub fn format_time(minutes: f64) -> String {
    let total_mins = minutes.round().max(0.0) as i64;
    if total_mins < 60 {
        format!("{}m", total_mins)
    } else {
        let hours = total_mins / 60;
        let mins = total_mins % 60;
        if mins == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, mins)
        }
    }
}

/// Format fractional hours with one decimal, e.g. `"2.5h"`.
pub fn format_hours(hours: f64) -> String {
    format!("{:.1}h", round_to(hours, 1))
}

/// Short chart label for a calendar day, e.g. `"Jun 5"`.
pub fn chart_label(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

/// Convert seconds to whole minutes, rounding to nearest.
pub fn seconds_to_rounded_minutes(seconds: u64) -> u64 {
    seconds / 60 + u64::from(seconds % 60 >= 30)
}

/// Convert seconds to whole minutes, discarding the remainder.
pub fn seconds_to_floor_minutes(seconds: u64) -> u64 {
    seconds / 60
}

/// Pluralise `unit` for `count`, e.g. `"1 day"`, `"3 days"`.
pub fn plural(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("{} {}", count, unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
