//! Error types for failure handling across the execution client
//!
//! One unified error hierarchy covers every failure mode a submission can hit
//! on its way from the editor to a terminal result. Categorizing errors by
//! their source (user input, transport, polling budget, configuration) lets
//! callers decide between re-prompting the user, retrying the whole
//! submission, or giving up. Provider-reported outcomes such as compile
//! errors are deliberately absent here: they travel through the normal result
//! path as data, never as an error.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Maximum number of probe requests reached")]
    PollTimeout,
    #[error("Additional files fetch failed: {0}")]
    Asset(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Parsing error: {0}")]
    Parsing(String),
    #[error("Workspace error: {0}")]
    Workspace(String),
    #[error("Submission superseded by a newer run")]
    Superseded,
    #[error("I/O error: {0}")]
    Io(String),
}

impl ClientError {
    /// HTTP-equivalent status code reported to host observers via `runError`.
    pub fn http_equivalent(&self) -> u16 {
        match self {
            ClientError::Validation(_) => 422,
            ClientError::PollTimeout => 504,
            _ => 0,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}
