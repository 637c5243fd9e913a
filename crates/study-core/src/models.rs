use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Owner assigned to records that carry no `userId`.
pub const ANONYMOUS_USER: &str = "anonymous";

/// One recorded interval of study time.
///
/// Decoding is lenient: a record with a missing or garbled `duration`
/// decodes with `duration == 0`, and a missing or non-string `date`
/// decodes to `None`. Such records contribute nothing to aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySession {
    /// Opaque identifier assigned by the data source.
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    /// Owner of the session; an email address or `"anonymous"`.
    #[serde(
        rename = "userId",
        default = "default_user",
        deserialize_with = "lenient_user"
    )]
    pub user_id: String,
    /// Elapsed seconds.
    #[serde(default, deserialize_with = "lenient_duration")]
    pub duration: u64,
    /// ISO 8601 timestamp of when the session was recorded.
    #[serde(
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<String>,
}

impl StudySession {
    /// Build a session recorded at `recorded_at`.
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        duration: u64,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            duration,
            date: Some(recorded_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

fn default_user() -> String {
    ANONYMOUS_USER.to_string()
}

/// Coerce a raw JSON duration into whole seconds.
///
/// Non-negative integers pass through, non-negative floats and numeric
/// strings are floored, everything else is `0`.
pub fn duration_from_value(value: &Value) -> u64 {
    let as_float = match value {
        Value::Number(n) => {
            if let Some(secs) = n.as_u64() {
                return secs;
            }
            n.as_f64()
        }
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match as_float {
        Some(f) if f.is_finite() && f > 0.0 => f.floor() as u64,
        _ => 0,
    }
}

fn lenient_duration<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(duration_from_value).unwrap_or(0))
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_user<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let user = lenient_string(deserializer)?;
    if user.is_empty() {
        Ok(default_user())
    } else {
        Ok(user)
    }
}

// ── WindowMode ────────────────────────────────────────────────────────────────

/// The trailing period aggregates are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Today and the six days before it.
    Week,
    /// From the same day one calendar month ago up to today.
    Month,
}

impl WindowMode {
    /// Divisor used for `averagePerDay`.
    pub fn length_in_days(self) -> u32 {
        match self {
            WindowMode::Week => 7,
            WindowMode::Month => 30,
        }
    }

    /// Map a view name (`"week"`, `"month"`) onto a window.
    pub fn from_view(view: &str) -> Option<Self> {
        match view.to_lowercase().as_str() {
            "week" | "weekly" => Some(WindowMode::Week),
            "month" | "monthly" => Some(WindowMode::Month),
            _ => None,
        }
    }
}

impl fmt::Display for WindowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowMode::Week => write!(f, "week"),
            WindowMode::Month => write!(f, "month"),
        }
    }
}

// ── Derived output ────────────────────────────────────────────────────────────

/// Headline numbers for one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyStats {
    /// Sum of durations in hours, one decimal.
    pub total_hours: f64,
    /// `total_hours / window length`, one decimal.
    pub average_per_day: f64,
    /// Longest single session in whole minutes.
    pub longest_session: u64,
    /// Distinct calendar days with study time.
    pub days_studied: u32,
    /// Consecutive study days ending today or yesterday.
    pub streak: u32,
}

/// Per-day minutes series for the trend chart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendChart {
    /// Short labels such as `"Jun 5"`, one per day.
    pub labels: Vec<String>,
    /// Whole minutes studied, aligned with `labels`.
    pub data: Vec<u64>,
}

/// Full output of one aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyReport {
    pub mode: WindowMode,
    /// First calendar day of the window.
    pub window_start: NaiveDate,
    /// Last calendar day of the window (today).
    pub window_end: NaiveDate,
    pub stats: StudyStats,
    /// Seconds per calendar day, one entry for every day of the window.
    pub heatmap: BTreeMap<NaiveDate, u64>,
    pub chart: TrendChart,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn decode(json: &str) -> StudySession {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_decode_complete_record() {
        let s = decode(
            r#"{"id":"a1","userId":"ada@example.edu","duration":1500,"date":"2024-06-05T10:00:00Z"}"#,
        );
        assert_eq!(s.id, "a1");
        assert_eq!(s.user_id, "ada@example.edu");
        assert_eq!(s.duration, 1500);
        assert_eq!(s.date.as_deref(), Some("2024-06-05T10:00:00Z"));
    }

    #[test]
    fn test_decode_missing_fields_use_defaults() {
        let s = decode("{}");
        assert_eq!(s.id, "");
        assert_eq!(s.user_id, ANONYMOUS_USER);
        assert_eq!(s.duration, 0);
        assert!(s.date.is_none());
    }

    #[test]
    fn test_decode_garbled_duration_is_zero() {
        assert_eq!(decode(r#"{"duration":-30}"#).duration, 0);
        assert_eq!(decode(r#"{"duration":null}"#).duration, 0);
        assert_eq!(decode(r#"{"duration":"soon"}"#).duration, 0);
        assert_eq!(decode(r#"{"duration":[1,2]}"#).duration, 0);
    }

    #[test]
    fn test_decode_float_and_string_durations() {
        assert_eq!(decode(r#"{"duration":59.9}"#).duration, 59);
        assert_eq!(decode(r#"{"duration":"1200"}"#).duration, 1200);
    }

    #[test]
    fn test_decode_non_string_date_is_none() {
        assert!(decode(r#"{"date":12345}"#).date.is_none());
        assert!(decode(r#"{"date":"  "}"#).date.is_none());
    }

    #[test]
    fn test_numeric_id_and_blank_user() {
        let s = decode(r#"{"id":42,"userId":""}"#);
        assert_eq!(s.id, "42");
        assert_eq!(s.user_id, ANONYMOUS_USER);
    }

    #[test]
    fn test_new_formats_date_as_rfc3339() {
        let at = Utc.with_ymd_and_hms(2024, 6, 5, 9, 30, 0).unwrap();
        let s = StudySession::new("p1", "anonymous", 1500, at);
        assert_eq!(s.date.as_deref(), Some("2024-06-05T09:30:00Z"));
    }

    #[test]
    fn test_window_mode_from_view() {
        assert_eq!(WindowMode::from_view("week"), Some(WindowMode::Week));
        assert_eq!(WindowMode::from_view("Month"), Some(WindowMode::Month));
        assert_eq!(WindowMode::from_view("leaderboard"), None);
        assert_eq!(WindowMode::Week.length_in_days(), 7);
        assert_eq!(WindowMode::Month.length_in_days(), 30);
    }

    #[test]
    fn test_report_serialises_camel_case() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        let report = StudyReport {
            mode: WindowMode::Week,
            window_start: day,
            window_end: day,
            stats: StudyStats::default(),
            heatmap: BTreeMap::from([(day, 60)]),
            chart: TrendChart::default(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "week");
        assert_eq!(json["windowStart"], "2024-06-05");
        assert_eq!(json["stats"]["totalHours"], 0.0);
        assert_eq!(json["heatmap"]["2024-06-05"], 60);
    }
}
