//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use log::{debug, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;
use tokio::time::{Instant, timeout, timeout_at};

use super::config::{AuthMethod, Credentials, HostKeyVerification, SshOptions};
use super::{Connector, ShellChannel};
use crate::error::TransportError;

/// Opens interactive shells over SSH.
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    options: SshOptions,
}

impl SshConnector {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SshOptions {
        &self.options
    }

    async fn open_session(
        &self,
        address: &str,
        credentials: &Credentials,
        io_timeout: Duration,
    ) -> Result<SshChannel, TransportError> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: self.options.inactivity_timeout,
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: address.to_string(),
            port: self.options.port,
            host_key_verification: self.options.host_key_verification.clone(),
            known_hosts_path: self.options.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        let mut session = timeout(
            io_timeout,
            client::connect(ssh_config, (address, self.options.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(io_timeout))?
        .map_err(|e| {
            // Prefer the detailed host-key error over russh's generic one
            let stored = host_key_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            stored.unwrap_or(TransportError::Ssh(e))
        })?;

        timeout(io_timeout, authenticate(&mut session, credentials))
            .await
            .map_err(|_| TransportError::Timeout(io_timeout))??;

        let channel = timeout(io_timeout, self.open_shell(&session))
            .await
            .map_err(|_| TransportError::Timeout(io_timeout))??;

        Ok(SshChannel {
            session,
            channel,
            pending: BytesMut::new(),
            closed: false,
        })
    }

    /// Open a PTY channel and start the remote shell.
    async fn open_shell(&self, session: &Handle<SshHandler>) -> Result<Channel<Msg>, TransportError> {
        let channel = session.channel_open_session().await?;

        channel
            .request_pty(
                true,
                "xterm",
                self.options.terminal_width,
                self.options.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(|e| TransportError::Shell(e.to_string()))?;

        channel
            .request_shell(true)
            .await
            .map_err(|e| TransportError::Shell(e.to_string()))?;

        Ok(channel)
    }
}

impl Connector for SshConnector {
    type Channel = SshChannel;

    async fn connect(
        &self,
        address: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<SshChannel, TransportError> {
        debug!("ssh connect to {}:{} as {}", address, self.options.port, credentials.username());
        self.open_session(address, credentials, timeout).await
    }
}

/// Authenticate with the server.
async fn authenticate(
    session: &mut Handle<SshHandler>,
    credentials: &Credentials,
) -> Result<(), TransportError> {
    let user = credentials.username();
    let success = match credentials.auth() {
        AuthMethod::Password(password) => session
            .authenticate_password(user, password.expose_secret())
            .await?
            .success(),
        AuthMethod::PrivateKey { path, passphrase } => {
            let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                .map_err(|e| TransportError::Key(e.to_string()))?;

            // Get the best RSA hash algorithm supported by the server
            let hash_alg = session.best_supported_rsa_hash().await?.flatten();

            session
                .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
                .await?
                .success()
        }
    };

    if !success {
        return Err(TransportError::AuthenticationFailed {
            user: user.to_string(),
        });
    }

    Ok(())
}

/// An interactive shell channel on an SSH connection.
pub struct SshChannel {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// The shell channel.
    channel: Channel<Msg>,

    /// Received bytes not yet handed to the caller.
    pending: BytesMut,

    closed: bool,
}

impl ShellChannel for SshChannel {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Disconnected);
        }
        self.channel.data(data).await?;
        Ok(())
    }

    async fn receive(&mut self, max_bytes: usize, timeout: Duration) -> Result<Bytes, TransportError> {
        let deadline = Instant::now() + timeout;

        while self.pending.is_empty() {
            if self.closed {
                return Err(TransportError::Disconnected);
            }
            let msg = timeout_at(deadline, self.channel.wait())
                .await
                .map_err(|_| TransportError::Timeout(timeout))?;

            match msg {
                Some(ChannelMsg::Data { data }) => self.pending.extend_from_slice(&data),
                Some(ChannelMsg::ExtendedData { data, .. }) => self.pending.extend_from_slice(&data),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Err(TransportError::Disconnected);
                }
                Some(_) => {}
            }
        }

        let n = max_bytes.max(1).min(self.pending.len());
        Ok(self.pending.split_to(n).freeze())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Err(e) = self.channel.close().await {
            debug!("channel close failed: {}", e);
        }
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: TransportError) -> bool {
        *self
            .host_key_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key for {}: {}", self.host, e);
                    }
                    Ok(true)
                }
                Err(e) => Ok(self.reject(e)),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => Ok(self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })),
                Err(e) => Ok(self.reject(e)),
            },
        }
    }
}
