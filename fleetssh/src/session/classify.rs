//! Tri-state classification of a completed response.
//!
//! Checks run in a fixed order: success marker, failure marker, a known
//! prompt, anything else. A response holding both markers is a success.

use crate::catalog::Role;
use crate::channel::contains;
use crate::result::{CommandError, ErrorKind, Outcome};

/// Description recorded when a prompt arrives without a result marker.
pub const NO_EXPLICIT_RESULT: &str = "prompt reached but no explicit result";

/// Description recorded when a terminator matched but nothing recognisable did.
pub const UNEXPECTED_RESPONSE: &str = "unknown response before the prompt";

/// Outcome and error description of one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub outcome: Outcome,
    pub error: Option<CommandError>,
}

/// Classify the bytes of a read that reached one of its terminators.
pub fn classify_response(
    data: &[u8],
    success_marker: &str,
    failure_marker: &str,
    error_message: &str,
) -> Classification {
    if contains(data, success_marker) {
        return Classification {
            outcome: Outcome::Success,
            error: None,
        };
    }

    if contains(data, failure_marker) {
        return Classification {
            outcome: Outcome::Failure,
            error: Some(CommandError::new(ErrorKind::Rejected, error_message)),
        };
    }

    if Role::all_prompts().iter().any(|p| contains(data, p)) {
        return Classification {
            outcome: Outcome::Ambiguous,
            error: Some(CommandError::new(ErrorKind::NoExplicitResult, NO_EXPLICIT_RESULT)),
        };
    }

    Classification {
        outcome: Outcome::Ambiguous,
        error: Some(CommandError::new(
            ErrorKind::UnexpectedResponse,
            UNEXPECTED_RESPONSE,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::config::{FAILURE_MARKER, SUCCESS_MARKER};

    fn classify(data: &[u8]) -> Classification {
        classify_response(data, SUCCESS_MARKER, FAILURE_MARKER, "Failure for uptime")
    }

    #[test]
    fn test_success_beats_failure() {
        let c = classify(b"OperationFailed\r\nOperationSucceeded\r\nOSmon> ");
        assert_eq!(c.outcome, Outcome::Success);
        assert!(c.error.is_none());
    }

    #[test]
    fn test_failure_uses_caller_message() {
        let c = classify(b"OperationFailed\r\nOSmon> ");
        assert_eq!(c.outcome, Outcome::Failure);
        assert_eq!(
            c.error,
            Some(CommandError::new(ErrorKind::Rejected, "Failure for uptime"))
        );
    }

    #[test]
    fn test_prompt_without_marker_is_ambiguous() {
        for data in [&b"up 3 days\r\nOSmon> "[..], &b"file.txt\r\n[root]# "[..]] {
            let c = classify(data);
            assert_eq!(c.outcome, Outcome::Ambiguous);
            assert_eq!(c.error.unwrap().kind, ErrorKind::NoExplicitResult);
        }
    }

    #[test]
    fn test_unrecognised_content() {
        let c = classify(b"Password expired, continue? ");
        assert_eq!(c.outcome, Outcome::Ambiguous);
        assert_eq!(c.error.unwrap().kind, ErrorKind::UnexpectedResponse);
    }
}
