//! Data layer for the study tracker.
//!
//! Loads study sessions from JSON / JSONL files, computes the windowed
//! statistics report (totals, streak, heatmap, trend chart) and ranks users
//! on the leaderboard.

pub mod aggregator;
pub mod leaderboard;
pub mod reader;

pub use study_core as core;
