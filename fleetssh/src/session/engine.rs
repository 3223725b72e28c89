//! Session protocol engine.
//!
//! Turns the unstructured byte stream of an interactive shell into
//! classified command results. Commands run strictly one at a time: write,
//! pause, read until a terminator, classify.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use tokio::time::{Instant, sleep, timeout, timeout_at};

use super::classify::classify_response;
use super::config::SessionConfig;
use crate::catalog::Role;
use crate::channel::{ResponseBuffer, split_lines};
use crate::error::{SessionError, TransportError};
use crate::job::CommandSpec;
use crate::result::{CommandError, CommandResult, ErrorKind, Outcome};
use crate::transport::{Connector, Credentials, ShellChannel};

/// Name recorded for the login step.
pub const LOGIN_COMMAND: &str = "ssh login";

/// Name recorded for the post-login prompt wait.
pub const WAIT_FOR_PROMPT_COMMAND: &str = "wait for prompt";

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticated,
    AwaitingPrompt,
    Ready,
    SendingCommand,
    AwaitingResponse,
    Closing,
    Failed,
}

/// Bytes read up to and including a terminator.
#[derive(Debug, Clone)]
pub struct Response {
    /// Everything read during this call.
    pub data: Vec<u8>,

    /// The terminator that ended the read.
    pub terminator: String,
}

impl Response {
    pub fn lines(&self) -> Vec<String> {
        split_lines(&self.data)
    }
}

/// A read that ended without reaching a terminator.
#[derive(Debug, Clone)]
pub struct ReadError {
    /// Why the read stopped.
    pub error: CommandError,

    /// Whatever arrived before it stopped.
    pub partial: Vec<u8>,
}

/// One authenticated interactive session with one node.
///
/// A session is created by [`Session::open`] and consumed by
/// [`Session::close`]; after closing it never talks to the node again.
pub struct Session<C: ShellChannel> {
    /// Live channel (None once closed).
    channel: Option<C>,

    state: SessionState,

    config: SessionConfig,

    buffer: ResponseBuffer,

    address: String,
}

impl<C: ShellChannel> Session<C> {
    /// Connect, authenticate and obtain a shell.
    ///
    /// Both arms carry the `ssh login` result to record. The connect call
    /// gets `connect_timeout` as its per-call guard; the whole attempt is
    /// abandoned at `login_timeout + grace` regardless.
    pub async fn open<K>(
        connector: &K,
        address: &str,
        credentials: &Credentials,
        config: SessionConfig,
    ) -> std::result::Result<(Self, CommandResult), CommandResult>
    where
        K: Connector<Channel = C>,
    {
        let mut result = CommandResult::issued(LOGIN_COMMAND);
        info!("Login into {} as {}", address, credentials.username());
        trace!("{}: {:?} -> {:?}", address, SessionState::Disconnected, SessionState::Connecting);

        let attempt = timeout(
            config.login_deadline(),
            connector.connect(address, credentials, config.connect_timeout),
        )
        .await;

        let error = match attempt {
            Ok(Ok(channel)) => {
                info!("Login to {} was successful", address);
                let session = Self {
                    channel: Some(channel),
                    state: SessionState::Authenticated,
                    config,
                    buffer: ResponseBuffer::new(),
                    address: address.to_string(),
                };
                return Ok((session, result));
            }
            Ok(Err(e)) if e.is_timeout() => CommandError::new(
                ErrorKind::Timeout,
                format!("Timeout while connecting to {}: {}", address, e),
            ),
            Ok(Err(e)) if e.is_io() => CommandError::new(
                ErrorKind::Io,
                format!("I/O error while connecting to {}: {}", address, e),
            ),
            Ok(Err(e)) => CommandError::new(
                ErrorKind::Connection,
                format!("Error while connecting to {}: {}", address, e),
            ),
            Err(_) => CommandError::new(
                ErrorKind::Timeout,
                format!(
                    "Login to {} aborted after {:?}",
                    address,
                    config.login_deadline()
                ),
            ),
        };

        error!("Login to {} failed: {}", address, error.message);
        result = result.with_failure(error);
        Err(result)
    }

    /// Wrap an already established shell channel.
    pub fn from_channel(channel: C, address: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            channel: Some(channel),
            state: SessionState::Authenticated,
            config,
            buffer: ResponseBuffer::new(),
            address: address.into(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether the session still holds a channel.
    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    fn set_state(&mut self, state: SessionState) {
        trace!("{}: {:?} -> {:?}", self.address, self.state, state);
        self.state = state;
    }

    /// Read until either role's prompt appears, without sending anything.
    pub async fn wait_for_prompt(&mut self) -> CommandResult {
        let mut result = CommandResult::issued(WAIT_FOR_PROMPT_COMMAND);
        info!("Waiting for prompt from {}", self.address);
        self.set_state(SessionState::AwaitingPrompt);

        let prompts = Role::all_prompts();
        match self.read_response(prompts.as_slice(), self.config.command_timeout).await {
            Ok(response) => {
                info!("Got prompt from {}", self.address);
                result.response = response.lines();
                result.terminator = Some(response.terminator);
            }
            Err(read) => {
                error!("Could not get prompt from {}: {}", self.address, read.error.message);
                result.response = split_lines(&read.partial);
                result = result.with_failure(CommandError::new(
                    ErrorKind::NoPrompt,
                    format!("Could not get prompt: {}", read.error.message),
                ));
            }
        }
        result
    }

    /// Write one command, terminated by a single carriage return.
    pub async fn send_command(&mut self, text: &str, timeout: Duration) -> std::result::Result<(), CommandError> {
        let address = self.address.clone();
        let deadline = Instant::now() + self.config.deadline_for(timeout);
        let Some(channel) = self.channel.as_mut() else {
            return Err(CommandError::new(ErrorKind::Io, SessionError::Closed.to_string()));
        };

        let line = normalize_command(text);
        debug!("> Sending to {}: {:?}", address, line);
        self.state = SessionState::SendingCommand;

        let sent = timeout_at(deadline, tokio::time::timeout(timeout, channel.send(line.as_bytes()))).await;
        let error = match sent {
            Ok(Ok(Ok(()))) => {
                debug!("< Sending to {} done", address);
                return Ok(());
            }
            Ok(Ok(Err(e))) => transport_error(&e),
            Ok(Err(_)) | Err(_) => CommandError::new(ErrorKind::Timeout, "timeout"),
        };

        error!("Error while sending to {}: {}", address, error.message);
        self.set_state(SessionState::Failed);
        Err(CommandError::new(
            error.kind,
            format!("Error while sending command: {}", error.message),
        ))
    }

    /// Read until any terminator appears in the accumulated output.
    ///
    /// Each receive call is bounded by `timeout`; the whole read, including
    /// the initial quiescence pause, is bounded by `timeout + grace`.
    pub async fn read_response<S>(
        &mut self,
        terminators: &[S],
        timeout: Duration,
    ) -> std::result::Result<Response, ReadError>
    where
        S: AsRef<str> + Sync,
    {
        let deadline = Instant::now() + self.config.deadline_for(timeout);
        let Self {
            channel,
            buffer,
            config,
            address,
            ..
        } = self;

        let Some(channel) = channel.as_mut() else {
            return Err(ReadError {
                error: CommandError::new(ErrorKind::Io, SessionError::Closed.to_string()),
                partial: Vec::new(),
            });
        };

        debug!(
            "> Waiting for response from {}; terminators: {:?}",
            address,
            terminators.iter().map(AsRef::as_ref).collect::<Vec<_>>()
        );
        buffer.clear();
        let chunk = config.read_chunk;
        let quiescence = config.quiescence;

        let read = async {
            sleep(quiescence).await;
            loop {
                let bytes = channel.receive(chunk, timeout).await?;
                buffer.extend(&bytes);
                if let Some(index) = buffer.find_terminator(terminators) {
                    return Ok::<usize, TransportError>(index);
                }
            }
        };

        let outcome = timeout_at(deadline, read).await;
        let partial = buffer.take();

        let error = match outcome {
            Ok(Ok(index)) => {
                let terminator = terminators[index].as_ref().to_string();
                debug!("< Found a match in the response from {}: {:?}", address, terminator);
                self.state = SessionState::Ready;
                return Ok(Response {
                    data: partial,
                    terminator,
                });
            }
            Ok(Err(e)) => transport_error(&e),
            Err(_) => CommandError::new(ErrorKind::Timeout, "timeout"),
        };

        error!("< Error while reading response from {}: {}", address, error.message);
        self.set_state(SessionState::Failed);
        Err(ReadError { error, partial })
    }

    /// Send a command, read its response and classify the outcome.
    pub async fn send_and_classify(&mut self, spec: &CommandSpec) -> CommandResult {
        let result = CommandResult::issued(&spec.command);

        if let Err(error) = self.send_command(&spec.command, spec.timeout).await {
            return result.with_failure(error);
        }

        let result = match self.read_response(spec.terminators.as_slice(), spec.timeout).await {
            Ok(response) => {
                let classification = classify_response(
                    &response.data,
                    &self.config.success_marker,
                    &self.config.failure_marker,
                    &spec.error_message(),
                );
                CommandResult {
                    outcome: classification.outcome,
                    response: response.lines(),
                    terminator: Some(response.terminator),
                    error: classification.error,
                    ..result
                }
            }
            Err(read) => CommandResult {
                response: split_lines(&read.partial),
                ..result.with_failure(CommandError::new(
                    read.error.kind,
                    format!("Response error: {}", read.error.message),
                ))
            },
        };

        match result.outcome {
            Outcome::Success => debug!("{} on {}: success", spec.command, self.address),
            Outcome::Failure => warn!(
                "{} on {}: failure ({})",
                spec.command,
                self.address,
                result.error.as_ref().map(|e| e.message.as_str()).unwrap_or_default()
            ),
            Outcome::Ambiguous => info!("{} on {}: no explicit result", spec.command, self.address),
        }
        result
    }

    /// Log out and release the transport.
    ///
    /// Closing an already closed session does nothing.
    pub async fn close(&mut self) {
        if self.channel.is_none() {
            return;
        }

        info!("Exiting from {}", self.address);
        let failed = self.state == SessionState::Failed;
        self.set_state(SessionState::Closing);

        if !failed {
            let logout = self.config.logout_command.clone();
            if let Err(e) = self.send_command(&logout, self.config.command_timeout).await {
                debug!("logout from {} failed: {}", self.address, e.message);
            }
            sleep(self.config.settle).await;
        }

        if let Some(mut channel) = self.channel.take() {
            match timeout(self.config.connect_timeout, channel.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Closing channel to {} failed: {}", self.address, e),
                Err(_) => warn!("Closing channel to {} timed out", self.address),
            }
        }
        self.set_state(SessionState::Disconnected);
    }
}

impl<C: ShellChannel> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .field("state", &self.state)
            .field("open", &self.channel.is_some())
            .finish()
    }
}

impl<C: ShellChannel> Drop for Session<C> {
    fn drop(&mut self) {
        if self.channel.is_some() {
            warn!("Session to {} dropped without close()", self.address);
        }
    }
}

/// Append a carriage return unless the command already ends with one.
pub fn normalize_command(text: &str) -> Cow<'_, str> {
    if text.ends_with('\r') {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("{}\r", text))
    }
}

fn transport_error(e: &TransportError) -> CommandError {
    if e.is_timeout() {
        CommandError::new(ErrorKind::Timeout, "timeout")
    } else {
        CommandError::new(ErrorKind::Io, e.to_string())
    }
}
