//! Session protocol engine and the per-job runner built on it.

mod classify;
mod config;
mod engine;
mod runner;

pub use classify::{Classification, NO_EXPLICIT_RESULT, UNEXPECTED_RESPONSE, classify_response};
pub use config::{FAILURE_MARKER, SUCCESS_MARKER, SessionConfig};
pub use engine::{
    LOGIN_COMMAND, ReadError, Response, Session, SessionState, WAIT_FOR_PROMPT_COMMAND, normalize_command,
};
pub use runner::SessionProcessor;
