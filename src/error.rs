//! Error types.
//!
//! Everything here ends up as plain text for a person or an agent, so the
//! `Display` strings carry the remediation hints.

use std::path::PathBuf;
use thiserror::Error;

const FULL_DISK_ACCESS_HINT: &str = "Please grant Full Disk Access permission to your terminal application \
     in System Preferences > Security & Privacy > Privacy > Full Disk Access.";

/// Failures talking to one of the local SQLite stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(
        "{store} database not found at {}. Check that the path is correct. {hint}",
        .path.display(),
        hint = FULL_DISK_ACCESS_HINT
    )]
    NotFound { store: &'static str, path: PathBuf },

    #[error("Cannot access {store} database at {}. {hint} Error: {source}", .path.display(), hint = FULL_DISK_ACCESS_HINT)]
    Denied {
        store: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot access {store} database. {hint} Error: {source}", hint = FULL_DISK_ACCESS_HINT)]
    Unavailable {
        store: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Could not access any {store} databases. {hint}", hint = FULL_DISK_ACCESS_HINT)]
    NoneReadable { store: &'static str },

    #[error("{store} query failed: {source}")]
    Query {
        store: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

impl StoreError {
    /// Store missing or not readable, as opposed to a bad query.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, StoreError::Query { .. })
    }
}

/// A single store row that could not be turned into a record.
#[derive(Debug, Error)]
#[error("row is missing or has a malformed '{column}' column")]
pub struct RowError {
    pub column: &'static str,
}

/// Invalid `contact:N` references.
#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("No recent contact matches available. Please search for a contact first.")]
    NoRecentMatches,

    #[error("Invalid selection. Please choose a number between 1 and {len}.")]
    OutOfRange { index: i64, len: usize },

    #[error("Error selecting contact: {0}")]
    Invalid(String),
}

/// Failures reported by the outbound transport.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("{0}")]
    Failed(String),

    #[error("failed to run osascript: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Unknown result: {0}")]
    UnknownResult(String),
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("Error sending message: {0}")]
    Send(#[from] SendError),
}
