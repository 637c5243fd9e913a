//! Background report watcher.
//!
//! Polls a [`SessionSource`] on an interval and pushes a freshly computed
//! [`ReportSnapshot`] through an `mpsc` channel whenever the sessions change
//! or the local calendar day rolls over.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use study_core::models::{StudyReport, WindowMode};
use study_data::aggregator::StudyStatsAggregator;
use study_data::reader::SessionSource;
use tokio::sync::mpsc;
use tokio::time;

// ── Public types ──────────────────────────────────────────────────────────────

/// One recomputed report, forwarded to the presentation layer.
#[derive(Debug, Clone)]
pub struct ReportSnapshot {
    pub report: StudyReport,
    /// Number of sessions the source returned.
    pub session_count: usize,
    pub generated_at: DateTime<Utc>,
}

/// Decides whether a poll needs a reload.
#[derive(Debug, Default)]
pub struct RefreshState {
    fingerprint: Option<u64>,
    day: Option<NaiveDate>,
}

impl RefreshState {
    /// `true` when nothing is cached yet, the source cannot fingerprint
    /// itself, the fingerprint moved or the day rolled over.
    pub fn is_stale(&self, fingerprint: Option<u64>, today: NaiveDate) -> bool {
        fingerprint.is_none()
            || self.fingerprint.is_none()
            || self.fingerprint != fingerprint
            || self.day != Some(today)
    }

    pub fn record(&mut self, fingerprint: Option<u64>, today: NaiveDate) {
        self.fingerprint = fingerprint;
        self.day = Some(today);
    }
}

// ── ReportWatcher ─────────────────────────────────────────────────────────────

/// Recomputes the study report whenever its source changes.
pub struct ReportWatcher {
    source: Box<dyn SessionSource>,
    aggregator: StudyStatsAggregator,
    mode: WindowMode,
    update_interval: Duration,
}

impl ReportWatcher {
    pub fn new(
        source: Box<dyn SessionSource>,
        aggregator: StudyStatsAggregator,
        mode: WindowMode,
        update_interval: Duration,
    ) -> Self {
        Self {
            source,
            aggregator,
            mode,
            update_interval,
        }
    }

    /// Spawn the polling loop.
    ///
    /// The first snapshot is sent immediately. The loop exits when the
    /// receiver is dropped or the handle is aborted.
    pub fn start(self) -> (mpsc::Receiver<ReportSnapshot>, WatcherHandle) {
        let (tx, rx) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            self.watch_loop(tx).await;
        });

        (rx, WatcherHandle { handle })
    }

    async fn watch_loop(self, tx: mpsc::Sender<ReportSnapshot>) {
        let mut state = RefreshState::default();

        self.refresh_and_send(&mut state, &tx).await;

        let mut interval = time::interval(self.update_interval);
        // The first tick fires immediately; the initial refresh already ran.
        interval.tick().await;

        loop {
            interval.tick().await;

            if tx.is_closed() {
                tracing::debug!("report channel closed; exiting watch loop");
                break;
            }

            self.refresh_and_send(&mut state, &tx).await;
        }
    }

    async fn refresh_and_send(&self, state: &mut RefreshState, tx: &mpsc::Sender<ReportSnapshot>) {
        let now = Utc::now();
        let today = self.aggregator.timezone().local_date(now);
        let fingerprint = self.source.fingerprint();

        if !state.is_stale(fingerprint, today) {
            return;
        }

        let sessions = match self.source.load() {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load sessions; keeping last report");
                return;
            }
        };
        state.record(fingerprint, today);

        let snapshot = ReportSnapshot {
            report: self.aggregator.aggregate(&sessions, self.mode, now),
            session_count: sessions.len(),
            generated_at: now,
        };

        if let Err(e) = tx.send(snapshot).await {
            tracing::warn!(error = %e, "failed to send report snapshot; receiver dropped");
        }
    }
}

// ── WatcherHandle ─────────────────────────────────────────────────────────────

/// Handle to the background watch task.
pub struct WatcherHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl WatcherHandle {
    /// Immediately abort the watch loop.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use study_core::models::StudySession;
    use study_core::time_utils::TimezoneHandler;
    use study_data::reader::{FileSessionSource, SessionStore};

    fn watcher_for(path: &std::path::Path, interval: Duration) -> ReportWatcher {
        ReportWatcher::new(
            Box::new(FileSessionSource::new(path)),
            StudyStatsAggregator::new(TimezoneHandler::new("UTC")),
            WindowMode::Week,
            interval,
        )
    }

    #[test]
    fn test_refresh_state() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2024, 6, 6).unwrap();
        let mut state = RefreshState::default();

        assert!(state.is_stale(Some(1), today));
        state.record(Some(1), today);
        assert!(!state.is_stale(Some(1), today));
        assert!(state.is_stale(Some(2), today));
        assert!(state.is_stale(Some(1), tomorrow));
        assert!(state.is_stale(None, today));
    }

    #[tokio::test]
    async fn test_watcher_sends_initial_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sessions.jsonl");
        SessionStore::append(&path, &StudySession::new("a", "ada", 3600, Utc::now())).unwrap();

        let (mut rx, handle) = watcher_for(&path, Duration::from_secs(60)).start();

        let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for snapshot")
            .expect("channel closed before receiving snapshot");

        assert_eq!(snapshot.session_count, 1);
        assert_eq!(snapshot.report.stats.total_hours, 1.0);
        assert_eq!(snapshot.report.heatmap.len(), 7);

        handle.abort();
    }

    #[tokio::test]
    async fn test_watcher_missing_file_reports_zeroes() {
        let dir = tempfile::TempDir::new().unwrap();
        let (mut rx, handle) =
            watcher_for(&dir.path().join("none.jsonl"), Duration::from_secs(60)).start();

        let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.session_count, 0);
        assert_eq!(snapshot.report.stats.streak, 0);

        handle.abort();
    }

    #[tokio::test]
    async fn test_watcher_resends_after_change() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sessions.jsonl");
        let at = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        SessionStore::append(&path, &StudySession::new("old", "ada", 60, at)).unwrap();

        let (mut rx, handle) = watcher_for(&path, Duration::from_millis(20)).start();
        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.session_count, 1);

        SessionStore::append(&path, &StudySession::new("new", "ada", 1800, Utc::now())).unwrap();

        let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.session_count, 2);
        assert_eq!(second.report.stats.total_hours, 0.5);

        handle.abort();
    }
}
