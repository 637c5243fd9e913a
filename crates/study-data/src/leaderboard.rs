//! Per-user study time rankings.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use study_core::formatting::round_to;
use study_core::models::{StudySession, WindowMode};
use study_core::time_utils::TimezoneHandler;

use crate::aggregator::StudyWindow;

/// One ranked user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    pub user_id: String,
    pub total_seconds: u64,
    /// `total_seconds` in hours, one decimal.
    pub total_hours: f64,
    /// Sessions with non-zero duration in the window.
    pub sessions: u32,
    pub days_studied: u32,
}

#[derive(Default)]
struct UserTotals {
    seconds: u64,
    sessions: u32,
    days: BTreeSet<NaiveDate>,
}

/// Ranks users by study time within a window.
pub struct Leaderboard;

impl Leaderboard {
    /// Rank every user with study time in the `mode` window ending at `now`.
    ///
    /// Ordered by total seconds (descending), ties broken by user id. At most
    /// `limit` entries are returned.
    pub fn rank(
        sessions: &[StudySession],
        mode: WindowMode,
        now: DateTime<Utc>,
        tz: &TimezoneHandler,
        limit: usize,
    ) -> Vec<LeaderboardEntry> {
        let window = StudyWindow::ending_at(mode, now, tz);
        let mut per_user: HashMap<&str, UserTotals> = HashMap::new();

        for session in sessions.iter().filter(|s| s.duration > 0) {
            let Some(day) = window.locate(session, tz) else {
                continue;
            };
            let totals = per_user.entry(session.user_id.as_str()).or_default();
            totals.seconds = totals.seconds.saturating_add(session.duration);
            totals.sessions += 1;
            totals.days.insert(day);
        }

        let mut ranked: Vec<(&str, UserTotals)> = per_user.into_iter().collect();
        ranked.sort_by(|(a_user, a), (b_user, b)| {
            b.seconds.cmp(&a.seconds).then_with(|| a_user.cmp(b_user))
        });

        ranked
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (user, totals))| LeaderboardEntry {
                rank: i + 1,
                user_id: user.to_string(),
                total_seconds: totals.seconds,
                total_hours: round_to(totals.seconds as f64 / 3600.0, 1),
                sessions: totals.sessions,
                days_studied: totals.days.len() as u32,
            })
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
