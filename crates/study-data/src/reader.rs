//! Session file discovery, loading and appending.
//!
//! Sessions arrive as JSON documents (an array of records, or an object with
//! a `sessions` array) or as JSONL logs with one record per line. A single bad
//! record never fails a load; it is logged and skipped.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use study_core::models::StudySession;
use study_core::{Result, StudyError};
use tracing::{debug, warn};

// ── SessionSource ─────────────────────────────────────────────────────────────

/// Anything that can hand over a materialized list of study sessions.
pub trait SessionSource: Send + Sync {
    /// Load the current list of sessions.
    fn load(&self) -> Result<Vec<StudySession>>;

    /// Cheap change detector. Two equal fingerprints mean the underlying
    /// data has not changed; `None` means "unknown, always reload".
    fn fingerprint(&self) -> Option<u64>;
}

/// Sessions stored in a file or a directory of files.
#[derive(Debug, Clone)]
pub struct FileSessionSource {
    path: PathBuf,
    user: Option<String>,
}

impl FileSessionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            user: None,
        }
    }

    /// Keep only records whose `userId` equals `user`.
    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionSource for FileSessionSource {
    /// A missing path is treated as "no sessions recorded yet".
    fn load(&self) -> Result<Vec<StudySession>> {
        let sessions = match load_sessions(&self.path) {
            Ok(sessions) => sessions,
            Err(StudyError::SessionsNotFound(path)) => {
                warn!("Session path does not exist: {}", path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        Ok(match &self.user {
            Some(user) => sessions.into_iter().filter(|s| &s.user_id == user).collect(),
            None => sessions,
        })
    }

    fn fingerprint(&self) -> Option<u64> {
        let files = if self.path.is_dir() {
            find_session_files(&self.path)
        } else {
            vec![self.path.clone()]
        };

        let mut hasher = DefaultHasher::new();
        for file in &files {
            file.hash(&mut hasher);
            match std::fs::metadata(file) {
                Ok(meta) => {
                    meta.len().hash(&mut hasher);
                    if let Ok(modified) = meta.modified() {
                        modified.hash(&mut hasher);
                    }
                }
                Err(_) => 0u8.hash(&mut hasher),
            }
        }
        Some(hasher.finish())
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.json` and `.jsonl` files recursively under `dir`, sorted by path.
pub fn find_session_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Session directory does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_session_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load sessions from a file or a directory.
///
/// For a directory, unreadable files are logged and skipped. Records with a
/// non-empty `id` seen earlier (in path order) are dropped as duplicates.
pub fn load_sessions(path: &Path) -> Result<Vec<StudySession>> {
    if !path.exists() {
        return Err(StudyError::SessionsNotFound(path.to_path_buf()));
    }

    let mut sessions = Vec::new();
    if path.is_dir() {
        let files = find_session_files(path);
        for file in &files {
            match load_file(file) {
                Ok(mut loaded) => sessions.append(&mut loaded),
                Err(e) => warn!("Skipping {}: {}", file.display(), e),
            }
        }
        debug!(
            "Loaded {} sessions from {} files under {}",
            sessions.len(),
            files.len(),
            path.display()
        );
    } else {
        sessions = load_file(path)?;
    }

    Ok(dedupe_by_id(sessions))
}

/// Load one session file. `.jsonl` files are read line by line; anything
/// else is parsed as a single JSON document.
pub fn load_file(path: &Path) -> Result<Vec<StudySession>> {
    let content = std::fs::read_to_string(path).map_err(|source| StudyError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let is_jsonl = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("jsonl"))
        .unwrap_or(false);

    if is_jsonl {
        Ok(parse_jsonl(&content, path))
    } else {
        parse_json_document(&content)
    }
}

/// Parse a JSON document holding an array of records, an object with a
/// `sessions` array, or one bare record.
pub fn parse_json_document(content: &str) -> Result<Vec<StudySession>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let doc: Value = serde_json::from_str(content)?;
    let records = match doc {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("sessions") {
            Some(Value::Array(items)) => items,
            Some(_) => Vec::new(),
            None => vec![Value::Object(map)],
        },
        _ => Vec::new(),
    };

    Ok(records_to_sessions(records))
}

/// Append one session to a JSONL log, creating parent directories.
pub struct SessionStore;

impl SessionStore {
    pub fn append(path: &Path, session: &StudySession) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let line = serde_json::to_string(session)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| StudyError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        writeln!(file, "{}", line)?;

        debug!("Appended session {} to {}", session.id, path.display());
        Ok(())
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn is_session_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("jsonl"))
        .unwrap_or(false)
}

fn parse_jsonl(content: &str, path: &Path) -> Vec<StudySession> {
    let mut records = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => records.push(value),
            Err(e) => warn!(
                "Skipping malformed line {} in {}: {}",
                lineno + 1,
                path.display(),
                e
            ),
        }
    }
    records_to_sessions(records)
}

fn records_to_sessions(records: Vec<Value>) -> Vec<StudySession> {
    records
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<StudySession>(value) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Skipping malformed session record: {}", e);
                None
            }
        })
        .collect()
}

fn dedupe_by_id(sessions: Vec<StudySession>) -> Vec<StudySession> {
    let mut seen: HashSet<String> = HashSet::new();
    let before = sessions.len();
    let kept: Vec<StudySession> = sessions
        .into_iter()
        .filter(|s| s.id.is_empty() || seen.insert(s.id.clone()))
        .collect();
    if kept.len() != before {
        debug!("Dropped {} duplicate session records", before - kept.len());
    }
    kept
}

// ── Tests ─────────────────────────────────────────────────────────────────────
