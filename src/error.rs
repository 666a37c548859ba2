use thiserror::Error;

/// Failures at the payload boundary. Anything that gets past `ingest` is
/// treated as well-typed by the transform.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("match has no identifier")]
    MissingMatchId,

    #[error("participant {id} appears more than once")]
    DuplicateParticipant { id: u32 },

    #[error("expected at most two teams, found {found}")]
    TooManyTeams { found: usize },

    #[error("participant frame key '{key}' is not a participant id")]
    BadFrameKey { key: String },

    #[error("frame {index} goes back in time: {found}ms after {previous}ms")]
    UnorderedFrames {
        index: usize,
        previous: i64,
        found: i64,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("at least one checkpoint minute is required")]
    NoCheckpoints,

    #[error("minimum duration must not be negative, got {secs}s")]
    NegativeDuration { secs: i64 },

    #[error("unknown preset '{0}' (expected default, ladder or tracked)")]
    UnknownPreset(String),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}
