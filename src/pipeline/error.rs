//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Errors surfaced by the ingestion pipeline.
///
/// Only `Config` is fatal, and only at construction. `Fetch` and
/// `Transport` abort the current cycle; the next scheduled cycle retries
/// naturally. `Store` errors are handled per transaction inside the
/// Projector and never abort a batch.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("configuration error: {0}")]
    Config(String),

    /// The gateway answered with a non-success status.
    #[error("gateway returned HTTP {status}: {body}")]
    Fetch { status: u16, body: String },

    /// The gateway could not be reached at all.
    #[error("gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from decoding the arguments of a tracked contract call.
///
/// These are per-transaction and recoverable: the Projector logs a warning
/// and skips the transaction.
#[derive(Debug, Error)]
pub enum CallDataError {
    #[error("missing argument {index} for {function}")]
    MissingArgument { function: &'static str, index: usize },

    #[error("argument {index} of {function} is not valid hex: {value}")]
    InvalidHex {
        function: &'static str,
        index: usize,
        value: String,
    },
}

/// Errors from a challenge store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Backend-specific failure outside SQLite (used by test doubles and
    /// alternative backends).
    #[error("{0}")]
    Backend(String),
}
