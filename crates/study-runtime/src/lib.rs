//! Runtime layer for the study tracker.
//!
//! Runs the background report watcher and the Pomodoro timer as tokio tasks
//! that talk to the caller over channels.

pub mod pomodoro;
pub mod watcher;

pub use study_core as core;
pub use study_data as data;
