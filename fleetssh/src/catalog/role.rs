//! Session roles and their prompts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prompt printed by the node's standard command shell.
pub const STANDARD_PROMPT: &str = "OSmon> ";

/// Prompt printed by the node's elevated (root) shell.
pub const ELEVATED_PROMPT: &str = "[root]# ";

/// Login user that opens an elevated session.
pub const ELEVATED_USER: &str = "root";

/// The role a session runs under.
///
/// The role selects which allow-list a command is checked against and
/// which prompt terminates its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular management login.
    Standard,
    /// Root shell with a small set of diagnostic commands.
    Elevated,
}

impl Role {
    /// Derive the role from the login user.
    pub fn for_user(user: &str) -> Self {
        if user == ELEVATED_USER {
            Role::Elevated
        } else {
            Role::Standard
        }
    }

    /// The prompt this role's shell prints when it is ready.
    pub fn prompt(&self) -> &'static str {
        match self {
            Role::Standard => STANDARD_PROMPT,
            Role::Elevated => ELEVATED_PROMPT,
        }
    }

    /// Prompts of every role, in checking order.
    pub fn all_prompts() -> [&'static str; 2] {
        [STANDARD_PROMPT, ELEVATED_PROMPT]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Standard => f.write_str("standard"),
            Role::Elevated => f.write_str("elevated"),
        }
    }
}
