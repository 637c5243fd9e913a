use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-user state directory under `$HOME`.
pub const APP_DIR: &str = ".study-tracker";

/// Root of the per-user state directory, `~/.study-tracker/`.
pub fn app_dir() -> PathBuf {
    app_dir_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
}

/// State directory rooted at `base_dir` (used for testing).
pub fn app_dir_in(base_dir: &Path) -> PathBuf {
    base_dir.join(APP_DIR)
}

/// Session log used when no `--sessions` path was ever given.
pub fn default_sessions_path() -> PathBuf {
    app_dir().join("sessions.jsonl")
}

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Study time statistics, streaks and a Pomodoro timer
#[derive(Parser, Debug, Clone)]
#[command(
    name = "study-tracker",
    about = "Study time statistics, streaks and a Pomodoro timer",
    version
)]
pub struct Settings {
    /// View to show
    #[arg(long, default_value = "week", value_parser = ["week", "month", "leaderboard", "timer"])]
    pub view: String,

    /// Session file (.json / .jsonl) or directory of session files
    #[arg(long)]
    pub sessions: Option<PathBuf>,

    /// Only count sessions owned by this user id
    #[arg(long)]
    pub user: Option<String>,

    /// Timezone used to bucket sessions into days (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Window for the leaderboard view
    #[arg(long, default_value = "week", value_parser = ["week", "month"])]
    pub window: String,

    /// Maximum leaderboard rows
    #[arg(long, default_value = "10")]
    pub limit: usize,

    /// Keep running and re-print the report whenever the sessions change
    #[arg(long)]
    pub watch: bool,

    /// Refresh rate in seconds for watch mode (1-300)
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..=300))]
    pub refresh_rate: u32,

    /// Focus interval length in minutes
    #[arg(long, default_value = "25", value_parser = clap::value_parser!(u32).range(1..=180))]
    pub focus_minutes: u32,

    /// Short break length in minutes
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..=60))]
    pub short_break_minutes: u32,

    /// Long break length in minutes
    #[arg(long, default_value = "15", value_parser = clap::value_parser!(u32).range(1..=120))]
    pub long_break_minutes: u32,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.study-tracker/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_minutes: Option<u32>,
}

impl LastUsedParams {
    /// Default path of the persisted config file.
    pub fn config_path() -> PathBuf {
        app_dir().join("last_used.json")
    }

    /// Config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        app_dir_in(base_dir).join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at `path` if it exists.
    pub fn clear_at(path: &Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with explicit args and config
    /// path, so tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!(error = %e, "failed to clear saved configuration");
            }
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins over persisted values.
        if !is_arg_explicitly_set(&matches, "view") {
            if let Some(v) = last.view {
                settings.view = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "format") {
            if let Some(v) = last.format {
                settings.format = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "focus_minutes") {
            if let Some(v) = last.focus_minutes {
                settings.focus_minutes = v;
            }
        }
        if settings.sessions.is_none() {
            settings.sessions = last.sessions;
        }
        if settings.user.is_none() {
            settings.user = last.user;
        }

        settings = Self::resolve_auto_values(settings);

        let params = LastUsedParams::from(&settings);
        if let Err(e) = params.save_to(config_path) {
            tracing::warn!(error = %e, "failed to persist last-used settings");
        }

        settings
    }

    /// Session path to read, falling back to the default log.
    pub fn sessions_path(&self) -> PathBuf {
        self.sessions.clone().unwrap_or_else(default_sessions_path)
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        settings
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            // The timer is a one-off action, not a view to return to.
            view: (s.view != "timer").then(|| s.view.clone()),
            sessions: s.sessions.clone(),
            user: s.user.clone(),
            timezone: Some(s.timezone.clone()),
            format: Some(s.format.clone()),
            focus_minutes: Some(s.focus_minutes),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    #[test]
    fn test_last_used_params_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            view: Some("month".to_string()),
            sessions: Some(PathBuf::from("/data/sessions.json")),
            user: Some("ada@example.edu".to_string()),
            timezone: Some("Europe/Berlin".to_string()),
            format: Some("json".to_string()),
            focus_minutes: Some(50),
        };
        params.save_to(&path).expect("save");

        let loaded = LastUsedParams::load_from(&path);
        assert_eq!(loaded.view.as_deref(), Some("month"));
        assert_eq!(loaded.sessions, Some(PathBuf::from("/data/sessions.json")));
        assert_eq!(loaded.user.as_deref(), Some("ada@example.edu"));
        assert_eq!(loaded.timezone.as_deref(), Some("Europe/Berlin"));
        assert_eq!(loaded.format.as_deref(), Some("json"));
        assert_eq!(loaded.focus_minutes, Some(50));
    }

    #[test]
    fn test_last_used_params_default_when_missing_or_corrupt() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        assert!(LastUsedParams::load_from(&path).view.is_none());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        assert!(LastUsedParams::load_from(&path).timezone.is_none());
    }

    #[test]
    fn test_last_used_params_clear() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&path).expect("save");
        assert!(path.exists());

        LastUsedParams::clear_at(&path).expect("clear");
        assert!(!path.exists());
    }

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["study-tracker"]);

        assert_eq!(settings.view, "week");
        assert!(settings.sessions.is_none());
        assert!(settings.user.is_none());
        assert_eq!(settings.timezone, "auto");
        assert_eq!(settings.format, "text");
        assert_eq!(settings.window, "week");
        assert_eq!(settings.limit, 10);
        assert!(!settings.watch);
        assert_eq!(settings.refresh_rate, 5);
        assert_eq!(settings.focus_minutes, 25);
        assert_eq!(settings.short_break_minutes, 5);
        assert_eq!(settings.long_break_minutes, 15);
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.debug);
        assert!(!settings.clear);
    }

    #[test]
    fn test_settings_rejects_unknown_view() {
        let result = Settings::try_parse_from(["study-tracker", "--view", "chart"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_with_last_used_merges_persisted_view() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            view: Some("month".to_string()),
            timezone: Some("UTC".to_string()),
            user: Some("ada@example.edu".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings =
            Settings::load_with_last_used_impl(vec!["study-tracker".into()], &config_path);
        assert_eq!(settings.view, "month");
        assert_eq!(settings.timezone, "UTC");
        assert_eq!(settings.user.as_deref(), Some("ada@example.edu"));
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            view: Some("month".to_string()),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(
            vec!["study-tracker".into(), "--view".into(), "week".into()],
            &config_path,
        );
        assert_eq!(settings.view, "week");
    }

    #[test]
    fn test_timer_view_is_not_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            vec![
                "study-tracker".into(),
                "--view".into(),
                "timer".into(),
                "--timezone".into(),
                "UTC".into(),
            ],
            &config_path,
        );

        let loaded = LastUsedParams::load_from(&config_path);
        assert!(loaded.view.is_none());
        assert_eq!(loaded.timezone.as_deref(), Some("UTC"));
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&config_path).expect("save");

        Settings::load_with_last_used_impl(
            vec!["study-tracker".into(), "--clear".into()],
            &config_path,
        );

        assert!(!config_path.exists(), "file must be gone after --clear");
    }

    #[test]
    fn test_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        let settings = Settings::load_with_last_used_impl(
            vec!["study-tracker".into(), "--debug".into()],
            &config_path,
        );
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_sessions_path_falls_back_to_default() {
        let settings = Settings::parse_from(["study-tracker"]);
        assert!(settings.sessions_path().ends_with("sessions.jsonl"));

        let settings = Settings::parse_from(["study-tracker", "--sessions", "/tmp/s.json"]);
        assert_eq!(settings.sessions_path(), PathBuf::from("/tmp/s.json"));
    }
}
