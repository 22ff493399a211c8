// src/error.rs

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can abort a run. None of these are retried.
#[derive(Error, Debug)]
pub enum Error {
    #[error("revision {0} not found in the local repository")]
    NotFound(String),

    #[error("repository has no commits")]
    EmptyRepository,

    #[error("unable to authenticate to the tracking service")]
    Authentication,

    #[error("tracking service rejected the request: {0}")]
    RemoteValidation(String),

    #[error("no deploy recorded for {deployment} in {environment}")]
    NoRecordedDeploy {
        deployment: String,
        environment: String,
    },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
