//! Work descriptions handed to the dispatcher.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::Role;
use crate::transport::Credentials;

/// One target node: a name and a network address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeDescriptor {
    name: String,
    address: String,
}

impl NodeDescriptor {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// A command ready to be sent: text, the terminators that end its read,
/// and how long to wait for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Command text as given by the caller.
    pub command: String,

    /// Substrings that end the response read.
    pub terminators: Vec<String>,

    /// Per-call I/O timeout for this command.
    pub timeout: Duration,

    /// Error description used when the node reports failure.
    pub error_message: Option<String>,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>, terminators: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            terminators,
            timeout,
            error_message: None,
        }
    }

    /// Override the failure description.
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// The failure description, defaulting to `Failure for <command>`.
    pub fn error_message(&self) -> String {
        self.error_message
            .clone()
            .unwrap_or_else(|| format!("Failure for {}", self.command))
    }
}

/// One login → batch → logout cycle to run against a node.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    /// Label recorded in the session result.
    pub label: String,

    /// Login credentials.
    pub credentials: Credentials,

    /// Role whose allow-list and prompt apply.
    pub role: Role,

    /// Raw command lines, run in order.
    pub commands: Vec<String>,
}

impl SessionSpec {
    /// Create a session; the role follows from the login user.
    pub fn new(label: impl Into<String>, credentials: Credentials) -> Self {
        let role = Role::for_user(credentials.username());
        Self {
            label: label.into(),
            credentials,
            role,
            commands: Vec::new(),
        }
    }

    /// Override the role derived from the user.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Append one command line.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    /// Append several command lines.
    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
        self
    }
}

/// One unit of work: a node plus the sessions to run on it.
#[derive(Debug, Clone)]
pub struct Job {
    node: NodeDescriptor,
    sessions: Vec<SessionSpec>,
}

impl Job {
    pub fn new(node: NodeDescriptor, sessions: Vec<SessionSpec>) -> Self {
        Self { node, sessions }
    }

    pub fn node(&self) -> &NodeDescriptor {
        &self.node
    }

    pub fn sessions(&self) -> &[SessionSpec] {
        &self.sessions
    }

    /// Build one job per node, each running the same sessions.
    pub fn for_nodes<I>(nodes: I, sessions: &[SessionSpec]) -> Vec<Job>
    where
        I: IntoIterator<Item = NodeDescriptor>,
    {
        nodes
            .into_iter()
            .map(|node| Job::new(node, sessions.to_vec()))
            .collect()
    }
}
