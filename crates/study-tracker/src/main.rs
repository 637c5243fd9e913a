mod bootstrap;
mod report;

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use study_core::models::{StudyReport, WindowMode, ANONYMOUS_USER};
use study_core::settings::Settings;
use study_core::time_utils::TimezoneHandler;
use study_data::aggregator::StudyStatsAggregator;
use study_data::leaderboard::Leaderboard;
use study_data::reader::{FileSessionSource, SessionSource, SessionStore};
use study_runtime::pomodoro::{spawn_pomodoro, PomodoroConfig, PomodoroTimer};
use study_runtime::watcher::ReportWatcher;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("study-tracker v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "View: {}, Timezone: {}, Sessions: {}",
        settings.view,
        settings.timezone,
        settings.sessions_path().display()
    );

    let aggregator = StudyStatsAggregator::new(TimezoneHandler::new(&settings.timezone));

    match settings.view.as_str() {
        "week" | "month" => {
            let mode = WindowMode::from_view(&settings.view).unwrap_or(WindowMode::Week);
            let source = FileSessionSource::new(settings.sessions_path())
                .with_user(settings.user.clone());

            if settings.watch {
                run_watch(&settings, source, aggregator, mode).await?;
            } else {
                let sessions = source.load()?;
                let report = aggregator.aggregate(&sessions, mode, Utc::now());
                print_report(&settings, &report)?;
            }
        }

        "leaderboard" => {
            let mode = WindowMode::from_view(&settings.window).unwrap_or(WindowMode::Week);
            // Rankings compare users, so the user filter does not apply.
            let sessions = FileSessionSource::new(settings.sessions_path()).load()?;
            let entries = Leaderboard::rank(
                &sessions,
                mode,
                Utc::now(),
                aggregator.timezone(),
                settings.limit,
            );
            if settings.format == "json" {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print!("{}", report::render_leaderboard(&entries));
            }
        }

        "timer" => run_timer(&settings, aggregator).await?,

        unknown => {
            eprintln!("Unknown view: {}", unknown);
        }
    }

    Ok(())
}

fn print_report(settings: &Settings, report: &StudyReport) -> Result<()> {
    if settings.format == "json" {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report::render_report(report));
    }
    Ok(())
}

/// Re-print the report every time the session source changes, until Ctrl+C.
async fn run_watch(
    settings: &Settings,
    source: FileSessionSource,
    aggregator: StudyStatsAggregator,
    mode: WindowMode,
) -> Result<()> {
    tracing::info!("Watching {} for changes...", source.path().display());

    let watcher = ReportWatcher::new(
        Box::new(source),
        aggregator,
        mode,
        Duration::from_secs(u64::from(settings.refresh_rate)),
    );
    let (mut rx, handle) = watcher.start();

    loop {
        tokio::select! {
            snapshot = rx.recv() => {
                let Some(snapshot) = snapshot else {
                    break;
                };
                tracing::debug!(
                    sessions = snapshot.session_count,
                    generated_at = %snapshot.generated_at,
                    "received report snapshot"
                );
                print_report(settings, &snapshot.report)?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received; stopping watcher");
                break;
            }
        }
    }

    handle.abort();
    Ok(())
}

/// Run Pomodoro cycles, appending every completed focus interval to the
/// session log, until Ctrl+C.
async fn run_timer(settings: &Settings, aggregator: StudyStatsAggregator) -> Result<()> {
    let mut config = PomodoroConfig::from_minutes(
        settings.focus_minutes,
        settings.short_break_minutes,
        settings.long_break_minutes,
    )?;
    config.auto_continue = true;

    let user = settings
        .user
        .clone()
        .unwrap_or_else(|| ANONYMOUS_USER.to_string());
    let log_path = settings.sessions_path();
    let source = FileSessionSource::new(&log_path).with_user(Some(user.clone()));

    let timer = PomodoroTimer::new(config, user);
    println!(
        "Focus for {} minutes. Press Ctrl+C to stop.",
        settings.focus_minutes
    );
    let (mut rx, handle) = spawn_pomodoro(timer, Duration::from_secs(1));

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                if let Some(session) = &event.session {
                    SessionStore::append(&log_path, session).with_context(|| {
                        format!("failed to record session in {}", log_path.display())
                    })?;
                    let sessions = source.load()?;
                    let today = aggregator.aggregate(&sessions, WindowMode::Week, Utc::now());
                    println!(
                        "Focus complete at {}. Streak: {} day(s), {}h this week.",
                        event.completed_at.with_timezone(&aggregator.timezone().tz()).format("%H:%M"),
                        today.stats.streak,
                        today.stats.total_hours
                    );
                }
                println!("Next: {}", event.next);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received; stopping timer");
                break;
            }
        }
    }

    handle.abort();
    Ok(())
}
