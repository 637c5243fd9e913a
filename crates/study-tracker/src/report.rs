//! Plain-text rendering of reports and leaderboards.

use study_core::formatting::{format_hours, format_time, plural};
use study_core::models::StudyReport;
use study_data::leaderboard::LeaderboardEntry;

const BAR_WIDTH: usize = 30;
const SHADES: [char; 5] = ['·', '░', '▒', '▓', '█'];

/// Intensity glyph for `seconds` relative to the busiest day.
fn shade(seconds: u64, max: u64) -> char {
    if seconds == 0 || max == 0 {
        return SHADES[0];
    }
    let level = ((seconds as f64 / max as f64) * 4.0).ceil() as usize;
    SHADES[level.clamp(1, 4)]
}

/// Render the headline stats, the heatmap (one row per week) and the trend
/// bars.
pub fn render_report(report: &StudyReport) -> String {
    let stats = &report.stats;
    let mut out = format!(
        "Study stats ({}: {} to {})\n",
        report.mode, report.window_start, report.window_end
    );
    out.push_str(&format!("  Total:           {}\n", format_hours(stats.total_hours)));
    out.push_str(&format!(
        "  Average per day: {}\n",
        format_hours(stats.average_per_day)
    ));
    out.push_str(&format!(
        "  Longest session: {}\n",
        format_time(stats.longest_session as f64)
    ));
    out.push_str(&format!(
        "  Days studied:    {}\n",
        plural(u64::from(stats.days_studied), "day")
    ));
    out.push_str(&format!(
        "  Streak:          {}\n",
        plural(u64::from(stats.streak), "day")
    ));

    let max = report.heatmap.values().copied().max().unwrap_or(0);
    out.push_str("\nHeatmap\n");
    let days: Vec<_> = report.heatmap.iter().collect();
    for week in days.chunks(7) {
        let Some((first, _)) = week.first() else {
            continue;
        };
        let cells: String = week.iter().map(|(_, secs)| shade(**secs, max)).collect();
        out.push_str(&format!("  {}  {}\n", first.format("%m-%d"), cells));
    }

    let max_minutes = report.chart.data.iter().copied().max().unwrap_or(0);
    let label_width = report.chart.labels.iter().map(|l| l.len()).max().unwrap_or(0);
    out.push_str("\nTrend\n");
    for (label, minutes) in report.chart.labels.iter().zip(&report.chart.data) {
        let width = if max_minutes == 0 {
            0
        } else {
            ((*minutes as f64 / max_minutes as f64) * BAR_WIDTH as f64).round() as usize
        };
        out.push_str(&format!(
            "  {:<lw$}  {:<bw$} {}\n",
            label,
            "█".repeat(width),
            format_time(*minutes as f64),
            lw = label_width,
            bw = BAR_WIDTH
        ));
    }

    out
}

pub fn render_leaderboard(entries: &[LeaderboardEntry]) -> String {
    if entries.is_empty() {
        return "No study time recorded in this window.\n".to_string();
    }

    let user_width = entries
        .iter()
        .map(|e| e.user_id.chars().count())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut out = format!(
        "{:>4}  {:<uw$}  {:>7}  {:>8}  {:>4}\n",
        "Rank",
        "User",
        "Hours",
        "Sessions",
        "Days",
        uw = user_width
    );
    for entry in entries {
        out.push_str(&format!(
            "{:>4}  {:<uw$}  {:>7.1}  {:>8}  {:>4}\n",
            entry.rank,
            entry.user_id,
            entry.total_hours,
            entry.sessions,
            entry.days_studied,
            uw = user_width
        ));
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
