//! Role-keyed command allow-lists.
//!
//! Before any I/O happens, every command is checked against the allow-list
//! of the session's role. The eligibility key is the first
//! whitespace-delimited token of the command, compared case-insensitively.
//! Unknown commands fail fast with zero transport calls.

pub mod builtin;
mod role;

pub use role::{ELEVATED_PROMPT, ELEVATED_USER, Role, STANDARD_PROMPT};

use std::time::Duration;

use indexmap::{IndexMap, IndexSet};
use log::warn;

use crate::job::CommandSpec;
use crate::result::{CommandError, CommandResult, ErrorKind};

/// Whether a command changes node state.
///
/// Mutating commands are only flagged; they are sent exactly like
/// read-only ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Mutating,
    ReadOnly,
}

/// The allow-list of one role.
#[derive(Debug, Clone, Default)]
pub struct RoleCommands {
    mutating: IndexSet<String>,
    read_only: IndexSet<String>,
}

impl RoleCommands {
    /// Add a command keyword, moving it out of the other set if present.
    pub fn insert(&mut self, kind: CommandKind, keyword: &str) {
        let keyword = keyword.to_lowercase();
        match kind {
            CommandKind::Mutating => {
                self.read_only.shift_remove(&keyword);
                self.mutating.insert(keyword);
            }
            CommandKind::ReadOnly => {
                self.mutating.shift_remove(&keyword);
                self.read_only.insert(keyword);
            }
        }
    }

    /// Look up an already-lowercased keyword.
    pub fn kind_of(&self, keyword: &str) -> Option<CommandKind> {
        if self.mutating.contains(keyword) {
            Some(CommandKind::Mutating)
        } else if self.read_only.contains(keyword) {
            Some(CommandKind::ReadOnly)
        } else {
            None
        }
    }

    /// Number of known keywords.
    pub fn len(&self) -> usize {
        self.mutating.len() + self.read_only.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keywords, mutating ones first.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.mutating
            .iter()
            .chain(self.read_only.iter())
            .map(String::as_str)
    }
}

/// Mapping from role to the commands that role may run.
#[derive(Debug, Clone, Default)]
pub struct CommandCatalog {
    roles: IndexMap<Role, RoleCommands>,
}

impl CommandCatalog {
    /// Create an empty catalog. Every command is unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in node command set.
    pub fn builtin() -> Self {
        builtin::catalog()
    }

    /// Add a command keyword to a role.
    pub fn with_command(mut self, role: Role, kind: CommandKind, keyword: &str) -> Self {
        self.roles.entry(role).or_default().insert(kind, keyword);
        self
    }

    /// Add several keywords of the same kind to a role.
    pub fn with_commands(mut self, role: Role, kind: CommandKind, keywords: &[&str]) -> Self {
        let commands = self.roles.entry(role).or_default();
        for keyword in keywords {
            commands.insert(kind, keyword);
        }
        self
    }

    /// The allow-list for a role, if any.
    pub fn role(&self, role: Role) -> Option<&RoleCommands> {
        self.roles.get(&role)
    }

    /// Classify a command line under `role`.
    ///
    /// Returns `None` when the command's first token is not allowed.
    pub fn classify(&self, role: Role, command: &str) -> Option<CommandKind> {
        let keyword = eligibility_key(command)?;
        self.roles.get(&role)?.kind_of(&keyword)
    }

    /// Turn a command line into a sendable [`CommandSpec`], or the
    /// failure result recorded for an unknown command.
    pub fn prepare(
        &self,
        role: Role,
        command: &str,
        timeout: Duration,
    ) -> std::result::Result<CommandSpec, CommandResult> {
        match self.classify(role, command) {
            Some(_) => Ok(CommandSpec::new(
                command,
                vec![role.prompt().to_string()],
                timeout,
            )),
            None => {
                warn!("Command {} is unknown for the {} role", command, role);
                Err(CommandResult::failure(
                    command,
                    CommandError::new(
                        ErrorKind::UnknownCommand,
                        format!("Command {} is unknown", command),
                    ),
                ))
            }
        }
    }
}

/// First whitespace-delimited token, lowercased.
fn eligibility_key(command: &str) -> Option<String> {
    command.split_whitespace().next().map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_is_case_insensitive() {
        let catalog = CommandCatalog::builtin();
        assert_eq!(
            catalog.classify(Role::Standard, "getMOAttribute STN=0"),
            Some(CommandKind::ReadOnly)
        );
        assert_eq!(
            catalog.classify(Role::Standard, "SETMOATTRIBUTE STN=0 x 1"),
            Some(CommandKind::Mutating)
        );
    }

    #[test]
    fn test_unknown_command_fails_fast() {
        let catalog = CommandCatalog::builtin();
        let result = catalog
            .prepare(Role::Standard, "foobar args", Duration::from_secs(15))
            .unwrap_err();

        assert!(result.is_failure());
        let error = result.error.unwrap();
        assert_eq!(error.kind, ErrorKind::UnknownCommand);
        assert!(error.message.contains("unknown"));
        assert!(error.message.contains("foobar"));
    }

    #[test]
    fn test_role_isolation() {
        let catalog = CommandCatalog::builtin();

        // standard-only command under the elevated role
        assert!(catalog.classify(Role::Standard, "uptime").is_some());
        assert!(catalog.classify(Role::Elevated, "uptime").is_none());

        // elevated-only command under the standard role
        assert!(catalog.classify(Role::Elevated, "ls -l /tmp").is_some());
        assert!(catalog.classify(Role::Standard, "ls -l /tmp").is_none());
    }

    #[test]
    fn test_prepare_uses_role_prompt() {
        let catalog = CommandCatalog::builtin();
        let spec = catalog
            .prepare(Role::Elevated, "grep foo /var/log/messages", Duration::from_secs(3))
            .unwrap();
        assert_eq!(spec.terminators, vec!["[root]# ".to_string()]);
        assert_eq!(spec.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_with_command_is_additive() {
        let catalog = CommandCatalog::new()
            .with_command(Role::Standard, CommandKind::ReadOnly, "Uptime")
            .with_command(Role::Standard, CommandKind::Mutating, "uptime");

        assert_eq!(
            catalog.classify(Role::Standard, "uptime"),
            Some(CommandKind::Mutating)
        );
        assert_eq!(catalog.role(Role::Standard).unwrap().len(), 1);
        assert!(catalog.role(Role::Elevated).is_none());
    }

    #[test]
    fn test_blank_command_is_unknown() {
        let catalog = CommandCatalog::builtin();
        assert!(catalog.classify(Role::Standard, "   ").is_none());
    }
}
