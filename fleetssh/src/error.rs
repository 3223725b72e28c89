//! Error types for fleetssh.
//!
//! Per-command and per-login problems are recorded as data inside
//! [`CommandResult`](crate::result::CommandResult); the types here cover the
//! failures that escape as `Err`.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for fleetssh operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session engine errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Worker pool errors
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Result persistence errors
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Transport layer errors (SSH connection, authentication, channel I/O).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {address}: {source}")]
    ConnectionFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key differs from the one in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Host key not present in known_hosts under strict checking
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Failed to open the interactive shell
    #[error("Failed to open shell: {0}")]
    Shell(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Whether this error was raised by a timeout guard.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }

    /// Whether this error came from the operating system's I/O layer.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            TransportError::Io(_) | TransportError::ConnectionFailed { .. }
        ) || matches!(self, TransportError::Ssh(russh::Error::IO(_)))
    }
}

/// Session engine errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The session was closed and cannot be reused
    #[error("Session already closed")]
    Closed,
}

/// Worker pool errors.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Invalid dispatcher configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Every worker went away before all results were delivered
    #[error("Results channel closed after {received} of {expected} results")]
    ResultsClosed { expected: usize, received: usize },

    /// A worker task could not be joined
    #[error("Worker {worker} failed: {message}")]
    WorkerFailed { worker: usize, message: String },
}

/// Result sink errors. Always fatal to a run.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Writing to the underlying storage failed
    #[error("Failed to write result: {0}")]
    Io(#[from] io::Error),

    /// The result could not be encoded
    #[error("Failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type alias using fleetssh's Error.
pub type Result<T> = std::result::Result<T, Error>;
