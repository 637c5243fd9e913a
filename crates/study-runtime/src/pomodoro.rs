//! Pomodoro timer.
//!
//! [`PomodoroTimer`] is a plain state machine advanced by [`PomodoroTimer::tick`];
//! [`spawn_pomodoro`] drives it from a tokio interval and forwards phase
//! completions over a channel. Every completed focus interval yields a
//! [`StudySession`] ready to be appended to the session log.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use study_core::models::StudySession;
use study_core::{Result, StudyError};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Focus,
    ShortBreak,
    LongBreak,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Focus => write!(f, "focus"),
            Phase::ShortBreak => write!(f, "short break"),
            Phase::LongBreak => write!(f, "long break"),
        }
    }
}

/// Phase lengths and the long-break cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PomodoroConfig {
    pub focus: Duration,
    pub short_break: Duration,
    pub long_break: Duration,
    /// A long break follows every n-th completed focus interval.
    pub long_break_every: u32,
    /// Start the next phase automatically instead of going idle.
    pub auto_continue: bool,
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self {
            focus: Duration::from_secs(25 * 60),
            short_break: Duration::from_secs(5 * 60),
            long_break: Duration::from_secs(15 * 60),
            long_break_every: 4,
            auto_continue: false,
        }
    }
}

impl PomodoroConfig {
    /// Build a config from whole minutes.
    pub fn from_minutes(focus: u32, short_break: u32, long_break: u32) -> Result<Self> {
        if focus == 0 || short_break == 0 || long_break == 0 {
            return Err(StudyError::Config(
                "pomodoro phase lengths must be at least one minute".to_string(),
            ));
        }
        Ok(Self {
            focus: Duration::from_secs(u64::from(focus) * 60),
            short_break: Duration::from_secs(u64::from(short_break) * 60),
            long_break: Duration::from_secs(u64::from(long_break) * 60),
            ..Self::default()
        })
    }

    pub fn duration_of(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Focus => self.focus,
            Phase::ShortBreak => self.short_break,
            Phase::LongBreak => self.long_break,
        }
    }
}

// ── Timer ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

/// Emitted whenever a phase runs to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseCompleted {
    pub phase: Phase,
    pub next: Phase,
    pub completed_at: DateTime<Utc>,
    /// Present for completed focus intervals only.
    pub session: Option<StudySession>,
}

#[derive(Debug, Clone)]
pub struct PomodoroTimer {
    config: PomodoroConfig,
    user_id: String,
    phase: Phase,
    status: TimerStatus,
    remaining: Duration,
    completed_focus: u32,
}

impl PomodoroTimer {
    /// Phase lengths below one millisecond are raised to one millisecond.
    pub fn new(mut config: PomodoroConfig, user_id: impl Into<String>) -> Self {
        let floor = Duration::from_millis(1);
        config.focus = config.focus.max(floor);
        config.short_break = config.short_break.max(floor);
        config.long_break = config.long_break.max(floor);
        Self {
            config,
            user_id: user_id.into(),
            phase: Phase::Focus,
            status: TimerStatus::Idle,
            remaining: config.focus,
            completed_focus: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Focus intervals completed since the last reset.
    pub fn completed_focus(&self) -> u32 {
        self.completed_focus
    }

    /// Run the current phase from its remaining time.
    pub fn start(&mut self) {
        self.status = TimerStatus::Running;
    }

    /// Continue a paused phase; no effect otherwise.
    pub fn resume(&mut self) {
        if self.status == TimerStatus::Paused {
            self.status = TimerStatus::Running;
        }
    }

    pub fn pause(&mut self) {
        if self.status == TimerStatus::Running {
            self.status = TimerStatus::Paused;
        }
    }

    /// Back to an idle, full-length focus phase with the cycle count cleared.
    pub fn reset(&mut self) {
        self.phase = Phase::Focus;
        self.status = TimerStatus::Idle;
        self.remaining = self.config.focus;
        self.completed_focus = 0;
    }

    /// Abandon the current phase and move to the next one.
    ///
    /// A skipped focus interval is not counted and records no session.
    pub fn skip(&mut self) -> Phase {
        let next = match self.phase {
            Phase::Focus => Phase::ShortBreak,
            Phase::ShortBreak | Phase::LongBreak => Phase::Focus,
        };
        self.enter(next);
        next
    }

    /// Advance a running timer by `elapsed`, observed at `now`.
    ///
    /// Returns one event per completed phase; several phases may complete
    /// in one call when `auto_continue` is set.
    pub fn tick(&mut self, elapsed: Duration, now: DateTime<Utc>) -> Vec<PhaseCompleted> {
        let mut events = Vec::new();
        let mut left = elapsed;

        while self.status == TimerStatus::Running && left >= self.remaining {
            left -= self.remaining;
            let completed_at =
                now - chrono::Duration::from_std(left).unwrap_or_else(|_| chrono::Duration::zero());
            events.push(self.complete_phase(completed_at));
        }

        if self.status == TimerStatus::Running {
            self.remaining -= left;
        }
        events
    }

    fn complete_phase(&mut self, completed_at: DateTime<Utc>) -> PhaseCompleted {
        let phase = self.phase;
        let (next, session) = match phase {
            Phase::Focus => {
                self.completed_focus += 1;
                let every = self.config.long_break_every.max(1);
                let next = if self.completed_focus % every == 0 {
                    Phase::LongBreak
                } else {
                    Phase::ShortBreak
                };
                let session = StudySession::new(
                    format!("pomodoro-{}", completed_at.timestamp_millis()),
                    self.user_id.clone(),
                    self.config.focus.as_secs(),
                    completed_at,
                );
                (next, Some(session))
            }
            Phase::ShortBreak | Phase::LongBreak => (Phase::Focus, None),
        };

        self.enter(next);
        if !self.config.auto_continue {
            self.status = TimerStatus::Idle;
        }

        PhaseCompleted {
            phase,
            next,
            completed_at,
            session,
        }
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.remaining = self.config.duration_of(phase);
    }
}

// ── Async driver ──────────────────────────────────────────────────────────────

/// Handle to a running timer task.
pub struct PomodoroHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl PomodoroHandle {
    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Start `timer` and tick it every `tick_every` in a tokio task.
///
/// The task ends when the receiver is dropped, when the timer goes idle
/// (no `auto_continue`), or when aborted.
pub fn spawn_pomodoro(
    mut timer: PomodoroTimer,
    tick_every: Duration,
) -> (mpsc::Receiver<PhaseCompleted>, PomodoroHandle) {
    let (tx, rx) = mpsc::channel(16);

    let handle = tokio::spawn(async move {
        timer.start();
        tracing::info!(phase = %timer.phase(), remaining = ?timer.remaining(), "pomodoro started");

        let mut interval = time::interval(tick_every);
        interval.tick().await;
        let mut last = Instant::now();

        loop {
            interval.tick().await;
            let now = Instant::now();
            let elapsed = now - last;
            last = now;

            for event in timer.tick(elapsed, Utc::now()) {
                tracing::info!(phase = %event.phase, next = %event.next, "pomodoro phase completed");
                if tx.send(event).await.is_err() {
                    tracing::debug!("pomodoro channel closed; stopping timer");
                    return;
                }
            }

            if timer.status() != TimerStatus::Running || tx.is_closed() {
                break;
            }
        }
    });

    (rx, PomodoroHandle { handle })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 5, 10, 0, 0).unwrap()
    }

    fn mins(n: u64) -> Duration {
        Duration::from_secs(n * 60)
    }

    fn auto_config() -> PomodoroConfig {
        PomodoroConfig {
            auto_continue: true,
            ..PomodoroConfig::default()
        }
    }

    #[test]
    fn test_from_minutes_rejects_zero() {
        assert!(PomodoroConfig::from_minutes(0, 5, 15).is_err());
        let cfg = PomodoroConfig::from_minutes(50, 10, 30).unwrap();
        assert_eq!(cfg.focus, mins(50));
        assert_eq!(cfg.long_break_every, 4);
    }

    #[test]
    fn test_idle_timer_ignores_ticks() {
        let mut timer = PomodoroTimer::new(PomodoroConfig::default(), "ada");
        assert!(timer.tick(mins(30), now()).is_empty());
        assert_eq!(timer.remaining(), mins(25));
        assert_eq!(timer.status(), TimerStatus::Idle);
    }

    #[test]
    fn test_partial_tick_counts_down() {
        let mut timer = PomodoroTimer::new(PomodoroConfig::default(), "ada");
        timer.start();
        assert!(timer.tick(mins(10), now()).is_empty());
        assert_eq!(timer.remaining(), mins(15));
    }

    #[test]
    fn test_pause_freezes_remaining() {
        let mut timer = PomodoroTimer::new(PomodoroConfig::default(), "ada");
        timer.start();
        timer.tick(mins(5), now());
        timer.pause();
        timer.tick(mins(50), now());
        assert_eq!(timer.remaining(), mins(20));
        assert_eq!(timer.status(), TimerStatus::Paused);

        timer.resume();
        assert_eq!(timer.status(), TimerStatus::Running);
        timer.tick(mins(5), now());
        assert_eq!(timer.remaining(), mins(15));
    }

    #[test]
    fn test_focus_completion_records_session_and_goes_idle() {
        let mut timer = PomodoroTimer::new(PomodoroConfig::default(), "ada");
        timer.start();
        let events = timer.tick(mins(26), now());

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.phase, Phase::Focus);
        assert_eq!(event.next, Phase::ShortBreak);
        // completed one minute before the tick was observed
        assert_eq!(event.completed_at, now() - chrono::Duration::minutes(1));

        let session = event.session.as_ref().unwrap();
        assert_eq!(session.duration, 1500);
        assert_eq!(session.user_id, "ada");
        assert_eq!(session.date.as_deref(), Some("2024-06-05T09:59:00Z"));

        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.phase(), Phase::ShortBreak);
        assert_eq!(timer.remaining(), mins(5));
    }

    #[test]
    fn test_long_break_after_fourth_focus() {
        let mut timer = PomodoroTimer::new(auto_config(), "ada");
        timer.start();

        // 4 x (25 + 5) minus the last short break = 115 minutes
        let events = timer.tick(mins(25 + 5 + 25 + 5 + 25 + 5 + 25), now());
        let phases: Vec<Phase> = events.iter().map(|e| e.phase).collect();
        assert_eq!(
            phases,
            vec![
                Phase::Focus,
                Phase::ShortBreak,
                Phase::Focus,
                Phase::ShortBreak,
                Phase::Focus,
                Phase::ShortBreak,
                Phase::Focus,
            ]
        );
        assert_eq!(events.last().unwrap().next, Phase::LongBreak);
        assert_eq!(timer.completed_focus(), 4);
        assert_eq!(events.iter().filter(|e| e.session.is_some()).count(), 4);
        assert_eq!(timer.phase(), Phase::LongBreak);
        assert_eq!(timer.status(), TimerStatus::Running);
    }

    #[test]
    fn test_skip_does_not_record() {
        let mut timer = PomodoroTimer::new(PomodoroConfig::default(), "ada");
        timer.start();
        assert_eq!(timer.skip(), Phase::ShortBreak);
        assert_eq!(timer.completed_focus(), 0);
        assert_eq!(timer.remaining(), mins(5));
        assert_eq!(timer.skip(), Phase::Focus);
    }

    #[test]
    fn test_reset_clears_cycle() {
        let mut timer = PomodoroTimer::new(auto_config(), "ada");
        timer.start();
        timer.tick(mins(27), now());
        timer.reset();
        assert_eq!(timer.phase(), Phase::Focus);
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.remaining(), mins(25));
        assert_eq!(timer.completed_focus(), 0);
    }

    #[tokio::test]
    async fn test_spawned_timer_emits_focus_completion() {
        let config = PomodoroConfig {
            focus: Duration::from_millis(40),
            short_break: Duration::from_millis(40),
            long_break: Duration::from_millis(40),
            long_break_every: 4,
            auto_continue: false,
        };
        let timer = PomodoroTimer::new(config, "ada");
        let (mut rx, handle) = spawn_pomodoro(timer, Duration::from_millis(5));

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for phase completion")
            .expect("channel closed early");
        assert_eq!(event.phase, Phase::Focus);
        assert!(event.session.is_some());

        // Without auto_continue the task stops after the first phase.
        let next = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("task should close the channel");
        assert!(next.is_none());

        handle.abort();
    }
}
