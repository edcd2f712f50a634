//! Error types for the load generator.
//!
//! Every variant except [`Error::Config`] and [`Error::InvalidUrl`] is raised
//! while a run is in progress and is fatal to the whole run: the driver does
//! not retry, reassign, or isolate failing sessions.

use thiserror::Error;

/// Result type alias for benchmark operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a benchmark run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A session could not establish its connection.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A write, read, or close failed mid-session.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The peer answered the upgrade request with something unusable.
    #[error("Invalid handshake: {0}")]
    Handshake(String),

    /// Malformed frame received from the peer.
    #[error("Invalid frame: {0}")]
    Frame(String),

    /// Target URL could not be used.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Rejected run configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A session task or the aggregator went away without reporting.
    #[error("Run aborted: {0}")]
    Aborted(String),
}

impl Error {
    /// Check whether this error was raised while opening a session.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Handshake(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Aborted(err.to_string())
    }
}
