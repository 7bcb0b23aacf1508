//! Error types for the bot.

use thiserror::Error;

use crate::models::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// Text carries a retweet marker but no `": "` after it.
    #[error("malformed attribution in text: {text}")]
    MalformedAttribution { text: String },
}

/// Remote failures, already classified by the client implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("message exceeds length limit: {0}")]
    MessageTooLong(String),

    #[error("temporarily unable to perform relationship action: {0}")]
    RelationshipRestricted(String),

    /// Token revoked or account locked. Nothing can succeed after this.
    #[error("credentials invalid or account locked: {0}")]
    CredentialRevoked(String),

    #[error("remote error: {0}")]
    Other(String),
}

/// Remote error code for "status is over 140 characters".
const STATUS_TOO_LONG_CODE: u32 = 186;

impl RemoteError {
    /// Classifies a raw remote failure. Meant for `RemoteClient`
    /// implementations so the engine never inspects message text.
    pub fn classify(code: Option<u32>, message: impl Into<String>) -> Self {
        let message = message.into();
        if code == Some(STATUS_TOO_LONG_CODE) || message.contains("over 140 characters") {
            RemoteError::MessageTooLong(message)
        } else if message.contains("unable to follow more people at this time") {
            RemoteError::RelationshipRestricted(message)
        } else if message.contains("Invalid or expired token")
            || message.contains("this account is temporarily locked")
        {
            RemoteError::CredentialRevoked(message)
        } else {
            RemoteError::Other(message)
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, RemoteError::CredentialRevoked(_))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot io error for {key}: {source}")]
    Io {
        key: String,
        source: std::io::Error,
    },

    #[error("snapshot encoding error for {key}: {source}")]
    Encoding {
        key: String,
        source: serde_json::Error,
    },

    #[error("snapshot store unavailable for {key}: {reason}")]
    Unavailable { key: String, reason: String },

    /// The caller asked to change a record that was never stored.
    #[error("unknown identifier {id} in {key}")]
    UnknownIdentifier { key: String, id: UserId },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("invalid {policy} policy: {reason}")]
    Policy {
        policy: &'static str,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("unable to retweet something after {attempts} tries")]
    Exhausted { attempts: u32 },

    #[error("no search queries to pick from")]
    NoQueries,

    #[error("no user found for query {0:?}")]
    UserNotFound(String),

    #[error("post source failed: {0:#}")]
    Source(anyhow::Error),
}

impl EngineError {
    /// Fatal errors must stop every flow, not just the one that hit them.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Remote(e) if e.is_fatal())
    }
}
