use std::fmt;
use std::time::Duration;

use serde_json::Value;

/// Categories of poll failures.
///
/// All kinds are treated the same by the poller; the kind only shapes logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollErrorKind {
    /// Connection or transport failure
    Transport,
    /// Non-success HTTP status
    HttpStatus,
    /// Poll exceeded the configured timeout
    Timeout,
    /// Response body could not be decoded
    Parse,
}

impl fmt::Display for PollErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollErrorKind::Transport => write!(f, "transport"),
            PollErrorKind::HttpStatus => write!(f, "http_status"),
            PollErrorKind::Timeout => write!(f, "timeout"),
            PollErrorKind::Parse => write!(f, "parse"),
        }
    }
}

/// A failed poll attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollError {
    /// Error category
    pub kind: PollErrorKind,
    /// One-line summary suitable for logs
    pub message: String,
    /// Optional additional details (e.g., raw response body)
    pub details: Option<String>,
}

impl PollError {
    pub fn new(kind: PollErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn transport(err: &reqwest::Error) -> Self {
        Self::new(PollErrorKind::Transport, format!("Request failed: {err}"))
    }

    /// Creates an HTTP status error, pulling the first Cloudflare error
    /// message out of the body when there is one.
    pub fn http_status(status: u16, body: &str) -> Self {
        let body = body.trim();
        let details = (!body.is_empty()).then(|| body.to_string());

        if let Ok(json) = serde_json::from_str::<Value>(body)
            && let Some(msg) = json
                .get("errors")
                .and_then(Value::as_array)
                .and_then(|errors| errors.first())
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
        {
            return Self {
                kind: PollErrorKind::HttpStatus,
                message: format!("Unexpected response {status}: {msg}"),
                details,
            };
        }

        Self {
            kind: PollErrorKind::HttpStatus,
            message: format!("Unexpected response {status}"),
            details,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(PollErrorKind::Parse, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            PollErrorKind::Timeout,
            format!("Status poll timed out after {} seconds", after.as_secs()),
        )
    }
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PollError {}
