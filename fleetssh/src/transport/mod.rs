//! Transport capability consumed by the session engine.
//!
//! The engine only needs four operations: connect (authenticate and get an
//! interactive shell), send bytes, receive up to N bytes with a per-call
//! timeout, and close. [`SshConnector`] provides them over russh; tests use
//! a scripted in-memory implementation.

pub mod config;
#[cfg(test)]
pub(crate) mod mock;
mod ssh;

pub use config::{AuthMethod, Credentials, HostKeyVerification, SshOptions};
pub use ssh::{SshChannel, SshConnector};

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use crate::error::TransportError;

/// An authenticated, full-duplex byte channel to one node's shell.
pub trait ShellChannel: Send {
    /// Write all of `data` to the shell.
    fn send(&mut self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Read at most `max_bytes`, waiting no longer than `timeout`.
    ///
    /// Returns [`TransportError::Timeout`] when nothing arrives in time and
    /// [`TransportError::Disconnected`] once the peer has closed.
    fn receive(
        &mut self,
        max_bytes: usize,
        timeout: Duration,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send;

    /// Release the channel and its connection.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Opens shell channels to nodes.
pub trait Connector: Send + Sync {
    type Channel: ShellChannel + 'static;

    /// Connect to `address`, authenticate and start an interactive shell.
    ///
    /// `timeout` bounds each network operation of the attempt.
    fn connect(
        &self,
        address: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Channel, TransportError>> + Send;
}
