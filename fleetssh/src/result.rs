//! Structured records produced by running jobs.
//!
//! These are the values written to the result sink. Every failure that
//! happens while talking to a node is captured here as data.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::job::NodeDescriptor;

/// Tri-state outcome of a single command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The node reported explicit success.
    Success,
    /// The node reported explicit failure, or communication broke down.
    Failure,
    /// A prompt came back without any explicit result marker.
    Ambiguous,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Ambiguous => "ambiguous",
        };
        f.write_str(s)
    }
}

/// Category of a recorded command problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Login could not establish or authenticate the transport.
    Connection,
    /// The transport failed while sending or receiving.
    Io,
    /// No terminator arrived before the deadline.
    Timeout,
    /// The command is not in the role's allow-list.
    UnknownCommand,
    /// The node answered with the failure marker.
    Rejected,
    /// A prompt arrived but no result marker did.
    NoExplicitResult,
    /// A terminator matched but neither a marker nor a prompt was seen.
    UnexpectedResponse,
    /// The prompt never showed up after login.
    NoPrompt,
    /// The processing function failed outside the protocol engine.
    Worker,
}

/// A recorded problem attached to a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CommandError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether this error leaves the session channel in an unknown state.
    pub fn is_communication(&self) -> bool {
        matches!(self.kind, ErrorKind::Io | ErrorKind::Timeout)
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Result of one command (or of the login / prompt-wait steps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// The command as given by the caller.
    pub command: String,

    /// When the command was issued.
    pub issued_at: DateTime<Local>,

    /// Classified outcome.
    pub outcome: Outcome,

    /// Raw response, split into lines.
    pub response: Vec<String>,

    /// The terminator that ended the read, if one matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminator: Option<String>,

    /// Description of what went wrong, if anything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

impl CommandResult {
    /// Start a result for `command`, stamped with the current time.
    pub fn issued(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            issued_at: Local::now(),
            outcome: Outcome::Success,
            response: Vec::new(),
            terminator: None,
            error: None,
        }
    }

    /// A failed result carrying `error`.
    pub fn failure(command: impl Into<String>, error: CommandError) -> Self {
        Self::issued(command).with_failure(error)
    }

    pub(crate) fn with_failure(mut self, error: CommandError) -> Self {
        self.outcome = Outcome::Failure;
        self.error = Some(error);
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Failure
    }

    pub fn is_ambiguous(&self) -> bool {
        self.outcome == Outcome::Ambiguous
    }

    /// Whether this result means the channel can no longer be trusted.
    pub fn is_communication_failure(&self) -> bool {
        self.outcome == Outcome::Failure
            && self.error.as_ref().is_some_and(CommandError::is_communication)
    }
}

/// Everything that happened during one login → logout cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    /// Node name.
    pub node: String,

    /// Node network address.
    pub address: String,

    /// Session label from the job.
    pub session: String,

    /// User the session logged in as.
    pub user: String,

    /// When the session started.
    pub started_at: DateTime<Local>,

    /// Login, prompt wait and batch results, in execution order.
    pub commands: Vec<CommandResult>,

    /// Number of batch commands completed before a communication failure
    /// cut the session short. `None` when the batch ran to the end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted_after: Option<usize>,
}

impl SessionResult {
    pub fn new(node: &NodeDescriptor, session: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            node: node.name().to_string(),
            address: node.address().to_string(),
            session: session.into(),
            user: user.into(),
            started_at: Local::now(),
            commands: Vec::new(),
            aborted_after: None,
        }
    }

    /// Whether the login step succeeded.
    pub fn logged_in(&self) -> bool {
        self.commands.first().is_some_and(CommandResult::is_success)
    }
}

/// Everything that happened while running one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Node name.
    pub node: String,

    /// Node network address.
    pub address: String,

    /// One entry per attempted session.
    pub sessions: Vec<SessionResult>,

    /// Set when the processing function itself failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

impl JobResult {
    pub fn new(node: &NodeDescriptor) -> Self {
        Self {
            node: node.name().to_string(),
            address: node.address().to_string(),
            sessions: Vec::new(),
            error: None,
        }
    }

    /// A best-effort result for a job whose processing function broke.
    pub fn failed(node: &NodeDescriptor, message: impl Into<String>) -> Self {
        Self {
            error: Some(CommandError::new(ErrorKind::Worker, message)),
            ..Self::new(node)
        }
    }

    /// Iterate over every command result in every session.
    pub fn commands(&self) -> impl Iterator<Item = &CommandResult> {
        self.sessions.iter().flat_map(|s| s.commands.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serializes_as_three_states() {
        let encoded: Vec<String> = [Outcome::Success, Outcome::Failure, Outcome::Ambiguous]
            .iter()
            .map(|o| serde_json::to_string(o).unwrap())
            .collect();
        assert_eq!(encoded, vec!["\"success\"", "\"failure\"", "\"ambiguous\""]);
    }

    #[test]
    fn test_communication_failure_detection() {
        let timeout = CommandResult::failure("uptime", CommandError::new(ErrorKind::Timeout, "timeout"));
        assert!(timeout.is_communication_failure());

        let rejected =
            CommandResult::failure("uptime", CommandError::new(ErrorKind::Rejected, "Failure for uptime"));
        assert!(rejected.is_failure());
        assert!(!rejected.is_communication_failure());
    }

    #[test]
    fn test_failed_job_result_keeps_node() {
        let node = NodeDescriptor::new("SIU5", "10.1.6.29");
        let result = JobResult::failed(&node, "panicked");
        assert_eq!(result.node, "SIU5");
        assert_eq!(result.address, "10.1.6.29");
        assert!(result.sessions.is_empty());
        assert_eq!(result.error.unwrap().kind, ErrorKind::Worker);
    }

    #[test]
    fn test_optional_fields_omitted() {
        let result = CommandResult::issued("uptime");
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("error").is_none());
        assert!(json.get("terminator").is_none());
        assert_eq!(json["outcome"], "success");
    }
}
