//! Sanitized descriptions of unexpected failures.
//!
//! Only `Display` output of the error chain reaches the log, never a
//! `Debug` dump of handler state.

use std::any::Any;
use std::error::Error;

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    };
    sanitize(message)
}

/// Join an error and its sources into one line.
pub(crate) fn describe_error(error: &(dyn Error + 'static)) -> String {
    let mut description = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        description.push_str(": ");
        description.push_str(&cause.to_string());
        source = cause.source();
    }
    sanitize(&description)
}

/// Collapse line breaks so one defect is one log line.
fn sanitize(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("query failed")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_error_chain_is_joined() {
        let error = Outer(std::io::Error::other("connection reset"));
        assert_eq!(describe_error(&error), "query failed: connection reset");
    }

    #[test]
    fn test_panic_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("line one\nline two"));
        assert_eq!(panic_message(payload.as_ref()), "line one | line two");

        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
