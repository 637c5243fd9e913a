//! Core types shared by the study tracker crates.
//!
//! Holds the session and report models, the error type, timezone handling,
//! display formatting helpers and CLI settings.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use error::{Result, StudyError};
