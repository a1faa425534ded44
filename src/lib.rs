//! Mood journal: classified journal entries and distress alerts for
//! reviewers.

pub mod alerts;
pub mod api;
pub mod archive;
pub mod auth;
pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod journal;
pub mod logging;
pub mod models;
pub mod report;
pub mod store;

pub use error::{JournalError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
