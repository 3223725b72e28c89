//! Scripted in-memory transport for tests.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Bytes, BytesMut};

use super::{Connector, Credentials, ShellChannel};
use crate::error::TransportError;

/// What a channel does when it has nothing scripted to return.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Stall {
    /// Honour the per-call timeout.
    Timeout,
    /// Never return, ignoring the per-call timeout.
    Hang,
    /// Keep returning a byte of noise every 100ms.
    Drip,
}

/// How `connect` behaves.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ConnectBehaviour {
    Succeed,
    RejectAuth,
    IoError,
    Hang,
}

/// Scripted behaviour of one node.
#[derive(Debug, Clone)]
pub(crate) struct Script {
    pub greeting: Vec<u8>,
    pub replies: Vec<(String, Vec<u8>)>,
    pub stall: Stall,
    pub connect: ConnectBehaviour,
    pub fail_sends: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            greeting: b"Welcome\r\nOSmon> ".to_vec(),
            replies: Vec::new(),
            stall: Stall::Timeout,
            connect: ConnectBehaviour::Succeed,
            fail_sends: false,
        }
    }
}

impl Script {
    /// Reply to commands starting with `prefix`.
    pub fn reply(mut self, prefix: &str, bytes: &[u8]) -> Self {
        self.replies.push((prefix.to_string(), bytes.to_vec()));
        self
    }

    pub fn stall(mut self, stall: Stall) -> Self {
        self.stall = stall;
        self
    }

    pub fn connect(mut self, behaviour: ConnectBehaviour) -> Self {
        self.connect = behaviour;
        self
    }

    pub fn fail_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }
}

/// Every call made against the mock transport.
#[derive(Debug, Default)]
pub(crate) struct Calls {
    pub connects: Vec<String>,
    pub sent: Vec<Vec<u8>>,
    pub receives: usize,
    pub closes: usize,
}

impl Calls {
    pub fn total(&self) -> usize {
        self.connects.len() + self.sent.len() + self.receives + self.closes
    }

    pub fn sent_text(&self) -> Vec<String> {
        self.sent
            .iter()
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Calls>>);

impl CallLog {
    pub fn with<R>(&self, f: impl FnOnce(&mut Calls) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }
}

/// Connector handing out scripted channels, keyed by address.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedConnector {
    default: Script,
    nodes: HashMap<String, Script>,
    pub log: CallLog,
}

impl ScriptedConnector {
    pub fn new(default: Script) -> Self {
        Self {
            default,
            ..Default::default()
        }
    }

    pub fn node(mut self, address: &str, script: Script) -> Self {
        self.nodes.insert(address.to_string(), script);
        self
    }
}

impl Connector for ScriptedConnector {
    type Channel = ScriptedChannel;

    async fn connect(
        &self,
        address: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<ScriptedChannel, TransportError> {
        self.log.with(|c| c.connects.push(address.to_string()));
        let script = self.nodes.get(address).unwrap_or(&self.default).clone();

        match script.connect {
            ConnectBehaviour::Succeed => {}
            ConnectBehaviour::RejectAuth => {
                tokio::time::sleep(timeout / 10).await;
                return Err(TransportError::AuthenticationFailed {
                    user: credentials.username().to_string(),
                });
            }
            ConnectBehaviour::IoError => {
                return Err(TransportError::ConnectionFailed {
                    address: address.to_string(),
                    source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
                });
            }
            ConnectBehaviour::Hang => std::future::pending::<()>().await,
        }

        let mut pending = BytesMut::new();
        pending.extend_from_slice(&script.greeting);
        Ok(ScriptedChannel {
            script,
            pending,
            log: self.log.clone(),
        })
    }
}

pub(crate) struct ScriptedChannel {
    script: Script,
    pending: BytesMut,
    log: CallLog,
}

impl ShellChannel for ScriptedChannel {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.log.with(|c| c.sent.push(data.to_vec()));
        if self.script.fail_sends {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "broken pipe",
            )));
        }

        let text = String::from_utf8_lossy(data);
        let text = text.trim_end_matches('\r');
        if let Some((_, reply)) = self
            .script
            .replies
            .iter()
            .find(|(prefix, _)| text.starts_with(prefix.as_str()))
        {
            self.pending.extend_from_slice(reply);
        }
        Ok(())
    }

    async fn receive(&mut self, max_bytes: usize, timeout: Duration) -> Result<Bytes, TransportError> {
        self.log.with(|c| c.receives += 1);
        if !self.pending.is_empty() {
            let n = max_bytes.max(1).min(self.pending.len());
            return Ok(self.pending.split_to(n).freeze());
        }

        match self.script.stall {
            Stall::Timeout => {
                tokio::time::sleep(timeout).await;
                Err(TransportError::Timeout(timeout))
            }
            Stall::Hang => {
                std::future::pending::<()>().await;
                Err(TransportError::Disconnected)
            }
            Stall::Drip => {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(Bytes::from_static(b"."))
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.log.with(|c| c.closes += 1);
        Ok(())
    }
}
