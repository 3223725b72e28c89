//! Built-in command set for site integration unit nodes.
//!
//! The elevated (root) shell only allows read-only diagnostics. The
//! standard shell allows the managed-object commands; `setMOAttribute`,
//! `createMO` and `deleteMO` are flagged as mutating.

use super::{CommandCatalog, CommandKind, Role};

const ELEVATED_COMMANDS: &[&str] = &["grep", "ls"];

const STANDARD_MUTATING: &[&str] = &["setmoattribute", "createmo", "deletemo"];

const STANDARD_READ_ONLY: &[&str] = &[
    "uptime",
    "debug",
    "sysinfo",
    "pboot",
    "gettime",
    "getmoattribute",
    "starttransaction",
    "endtransaction",
    "commit",
    "subscribe",
    "unsubscribe",
    "getsubscriptionstatus",
    "gettransactionstatus",
    "checkconsistency",
    "gettransactionid",
    "dump",
    "getcounters",
    "getalarmlist",
    "changepwdrs",
    "startsession",
    "backup",
    "endsession",
    "uselocalsftp",
];

/// Create the built-in catalog.
pub fn catalog() -> CommandCatalog {
    CommandCatalog::new()
        .with_commands(Role::Elevated, CommandKind::ReadOnly, ELEVATED_COMMANDS)
        .with_commands(Role::Standard, CommandKind::Mutating, STANDARD_MUTATING)
        .with_commands(Role::Standard, CommandKind::ReadOnly, STANDARD_READ_ONLY)
}
