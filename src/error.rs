use crate::record::{ContentRef, EventKind};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A raw ledger payload could not be normalized into an [`EventRecord`](crate::EventRecord).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("{kind} event is missing required field `{field}`")]
    MissingField {
        kind: EventKind,
        field: &'static str,
    },

    #[error("{kind} event has invalid `{field}`: {value}")]
    InvalidField {
        kind: EventKind,
        field: &'static str,
        value: String,
    },
}

/// A content-addressed storage lookup or write failed.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("no content stored under {0}")]
    NotFound(ContentRef),

    #[error("content store failure: {0}")]
    Backend(String),

    #[error("content is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// An error item on a ledger subscription stream.
///
/// Subscription errors never end the stream on their own; the board logs
/// them and keeps consuming.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("ledger transport error: {0}")]
    Transport(String),

    #[error("could not decode ledger event: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("journal error: {0}")]
    Journal(#[from] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
