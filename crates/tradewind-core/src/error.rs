//! Error types for tradewind.

use std::fmt;

use thiserror::Error;

/// Result type alias using tradewind's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Which side of a requested pairing already holds a live conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyParty {
    /// The requesting user is already paired.
    Initiator,
    /// The order owner is already paired with someone else.
    Counterpart,
}

impl fmt::Display for BusyParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusyParty::Initiator => write!(
                f,
                "You already have an active trade conversation. End it with `/trade-end` first."
            ),
            BusyParty::Counterpart => write!(
                f,
                "The order creator is currently in another trade conversation. Try again later."
            ),
        }
    }
}

/// Core error type for tradewind operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// No live submission for this user
    #[error("Submission not found for user {0}")]
    SubmissionNotFound(String),

    /// No live conversation for this user
    #[error("Conversation not found for user {0}")]
    ConversationNotFound(String),

    /// Uniqueness or exclusivity violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Pairing refused because one party is already paired
    #[error("{0}")]
    Busy(BusyParty),

    /// Operation attempted in the wrong workflow state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Messaging backend failed
    #[error("Messaging error: {0}")]
    Messaging(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors the user can recover from by retrying or resubmitting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::SubmissionNotFound(_)
                | Error::ConversationNotFound(_)
                | Error::Conflict(_)
                | Error::Busy(_)
                | Error::InvalidInput(_)
                | Error::InvalidState(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("port 42".to_string());
        assert_eq!(err.to_string(), "Not found: port 42");
    }

    #[test]
    fn test_error_display_submission_not_found() {
        let err = Error::SubmissionNotFound("1234".to_string());
        assert_eq!(err.to_string(), "Submission not found for user 1234");
    }

    #[test]
    fn test_error_display_conversation_not_found() {
        let err = Error::ConversationNotFound("1234".to_string());
        assert_eq!(err.to_string(), "Conversation not found for user 1234");
    }

    #[test]
    fn test_error_display_busy_initiator() {
        let err = Error::Busy(BusyParty::Initiator);
        assert!(err
            .to_string()
            .starts_with("You already have an active trade conversation"));
    }

    #[test]
    fn test_error_display_busy_counterpart() {
        let err = Error::Busy(BusyParty::Counterpart);
        assert!(err
            .to_string()
            .starts_with("The order creator is currently in another trade conversation"));
    }

    #[test]
    fn test_error_display_conflict() {
        let err = Error::Conflict("item 'Cannon' already exists".to_string());
        assert_eq!(err.to_string(), "Conflict: item 'Cannon' already exists");
    }

    #[test]
    fn test_error_display_invalid_state() {
        let err = Error::InvalidState("port not confirmed".to_string());
        assert_eq!(err.to_string(), "Invalid state: port not confirmed");
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::SubmissionNotFound("u".into()).is_recoverable());
        assert!(Error::Busy(BusyParty::Counterpart).is_recoverable());
        assert!(Error::InvalidInput("x".into()).is_recoverable());
        assert!(!Error::Messaging("down".into()).is_recoverable());
        assert!(!Error::Internal("bug".into()).is_recoverable());
    }
}
