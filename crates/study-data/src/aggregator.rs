//! Study-time statistics over a trailing week or month.
//!
//! [`StudyStatsAggregator::aggregate`] is a pure function of the session
//! list, the window mode, the configured timezone and an explicit `now`. It
//! never fails: malformed records simply contribute nothing.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Months, NaiveDate, Utc};
use study_core::formatting::{
    chart_label, round_to, seconds_to_floor_minutes, seconds_to_rounded_minutes,
};
use study_core::models::{StudyReport, StudySession, StudyStats, TrendChart, WindowMode};
use study_core::time_utils::TimezoneHandler;
use tracing::debug;

const SECONDS_PER_HOUR: f64 = 3600.0;

// ── StudyWindow ───────────────────────────────────────────────────────────────

/// The calendar days and instants covered by one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudyWindow {
    pub mode: WindowMode,
    /// First calendar day (local).
    pub start_date: NaiveDate,
    /// Last calendar day (local), i.e. today.
    pub end_date: NaiveDate,
    /// Start of `start_date` in UTC.
    pub start: DateTime<Utc>,
    /// `now`; the inclusive upper bound.
    pub end: DateTime<Utc>,
}

impl StudyWindow {
    /// Window of `mode` ending at `now`.
    ///
    /// Week: today and the six days before. Month: from the same day one
    /// calendar month earlier (clamped to month end) through today.
    pub fn ending_at(mode: WindowMode, now: DateTime<Utc>, tz: &TimezoneHandler) -> Self {
        let today = tz.local_date(now);
        let start_date = match mode {
            WindowMode::Week => today - chrono::Duration::days(6),
            WindowMode::Month => today.checked_sub_months(Months::new(1)).unwrap_or(today),
        };
        Self {
            mode,
            start_date,
            end_date: today,
            start: tz.start_of_day(start_date),
            end: now,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }

    /// Every calendar day of the window, oldest first.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end_date;
        self.start_date.iter_days().take_while(move |d| *d <= end)
    }

    /// Local day a session falls on, or `None` when it has no parseable
    /// date or lies outside the window.
    pub fn locate(&self, session: &StudySession, tz: &TimezoneHandler) -> Option<NaiveDate> {
        let ts = tz.parse_timestamp(session.date.as_deref()?)?;
        self.contains(ts).then(|| tz.local_date(ts))
    }
}

// ── StudyStatsAggregator ──────────────────────────────────────────────────────

/// Computes [`StudyReport`]s in a fixed timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct StudyStatsAggregator {
    tz: TimezoneHandler,
}

impl StudyStatsAggregator {
    pub fn new(tz: TimezoneHandler) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> &TimezoneHandler {
        &self.tz
    }

    /// Aggregate `sessions` over the `mode` window ending at `now`.
    pub fn aggregate(
        &self,
        sessions: &[StudySession],
        mode: WindowMode,
        now: DateTime<Utc>,
    ) -> StudyReport {
        let window = StudyWindow::ending_at(mode, now, &self.tz);

        // Pre-seed every day so the heatmap and chart have no gaps.
        let mut heatmap: BTreeMap<NaiveDate, u64> = window.days().map(|d| (d, 0)).collect();
        let mut total_seconds = 0u64;
        let mut longest = 0u64;
        let mut counted = 0usize;

        for session in sessions {
            let Some(day) = window.locate(session, &self.tz) else {
                continue;
            };
            counted += 1;
            let bucket = heatmap.entry(day).or_insert(0);
            *bucket = bucket.saturating_add(session.duration);
            total_seconds = total_seconds.saturating_add(session.duration);
            longest = longest.max(session.duration);
        }

        let studied: BTreeSet<NaiveDate> = heatmap
            .iter()
            .filter(|(_, secs)| **secs > 0)
            .map(|(day, _)| *day)
            .collect();

        // The average is taken from the rounded total so the two agree.
        let total_hours = round_to(total_seconds as f64 / SECONDS_PER_HOUR, 1);
        let stats = StudyStats {
            total_hours,
            average_per_day: round_to(total_hours / f64::from(mode.length_in_days()), 1),
            longest_session: seconds_to_floor_minutes(longest),
            days_studied: studied.len() as u32,
            streak: current_streak(&studied, window.end_date),
        };

        let chart = TrendChart {
            labels: heatmap.keys().map(|d| chart_label(*d)).collect(),
            data: heatmap
                .values()
                .map(|secs| seconds_to_rounded_minutes(*secs))
                .collect(),
        };

        debug!(
            mode = %mode,
            sessions = sessions.len(),
            in_window = counted,
            total_seconds,
            streak = stats.streak,
            "aggregated study stats"
        );

        StudyReport {
            mode,
            window_start: window.start_date,
            window_end: window.end_date,
            stats,
            heatmap,
            chart,
        }
    }
}

/// Consecutive study days ending today or yesterday.
///
/// Zero when the most recent study day is older than yesterday; otherwise
/// walks back from it and stops at the first gap.
pub fn current_streak(study_days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut days = study_days.iter().rev().copied();
    let Some(latest) = days.next() else {
        return 0;
    };

    let since_latest = (today - latest).num_days();
    if !(0..=1).contains(&since_latest) {
        return 0;
    }

    let mut streak = 1;
    let mut previous = latest;
    for day in days {
        if (previous - day).num_days() != 1 {
            break;
        }
        streak += 1;
        previous = day;
    }
    streak
}

// ── Tests ─────────────────────────────────────────────────────────────────────
