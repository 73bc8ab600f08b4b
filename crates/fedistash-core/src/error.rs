//! Error types for the fedistash crates.
//!
//! This module provides a unified error type with explicit variants for
//! transport, authentication, protocol, and archive storage errors, plus the
//! two distinguished conditions of the merge engine: a lost resume point and
//! an exhausted rate-limit budget.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::RecordId;

/// The unified error type for fedistash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (DNS, TLS, connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (missing secret, revoked authorization).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Protocol errors (remote API errors, unexpected responses).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Archive storage errors (missing file, refused backup, I/O).
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Input validation errors (bad account name, bad collection name).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// The newest archived record was not found anywhere in the live feed,
    /// so an incremental fetch has no safe place to stop.
    #[error(
        "resume point {id} no longer exists in the live feed \
         (was it deleted?); re-run with --no-stopping to force a full fetch"
    )]
    ResumePointLost { id: RecordId },

    /// Rate-limit retries were exhausted.
    #[error("rate limited by the server{}", reset_hint(.reset))]
    RateLimited { reset: Option<DateTime<Utc>> },
}

fn reset_hint(reset: &Option<DateTime<Utc>>) -> String {
    match reset {
        Some(at) => format!(", limit resets at {}", at.to_rfc3339()),
        None => String::new(),
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No stored access token for the account.
    #[error("no access token found at {}; run 'fedistash login' first", .path.display())]
    MissingCredentials { path: PathBuf },

    /// The stored token no longer carries the scopes the operation needs.
    #[error("authorization revoked or insufficient scope: {message}")]
    Revoked { message: String },

    /// The server rejected the token outright.
    #[error("invalid or expired access token")]
    InvalidToken,

    /// Reading or writing a secret file failed.
    #[error("could not access secret file {}: {source}", .path.display())]
    SecretFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Protocol-level errors from API responses.
#[derive(Debug)]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// Error description from the server, if present.
    pub message: Option<String>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(status: u16, message: Option<String>) -> Self {
        Self { status, message }
    }

    /// Check if this is a missing-record error.
    pub fn is_not_found(&self) -> bool {
        self.status == 404 || self.status == 410
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        self.status == 401 || self.status == 403
    }

    /// Check if the server is asking us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Archive storage errors.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The required archive file does not exist yet.
    #[error("no archive at {}; run 'fedistash archive' first", .path.display())]
    Missing { path: PathBuf },

    /// A save would destroy the only backup and the caller declined.
    #[error("refusing to overwrite existing backup {}", .path.display())]
    BackupRefused { path: PathBuf },

    /// Filesystem error while reading or writing the archive.
    #[error("archive I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The archive file is not valid JSON in the expected shape.
    #[error("archive is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid account identifier.
    #[error("invalid account '{value}': {reason}")]
    Account { value: String, reason: String },

    /// Invalid collection name.
    #[error("invalid collection '{value}': expected statuses, favourites, bookmarks, or mentions")]
    Collection { value: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_display() {
        let err = ProtocolError::new(429, Some("Too many requests".to_string()));
        assert_eq!(err.to_string(), "HTTP 429: Too many requests");
        assert!(err.is_rate_limited());
        assert!(!err.is_not_found());
    }

    #[test]
    fn missing_archive_message_names_path() {
        let err = Error::Archive(ArchiveError::Missing {
            path: PathBuf::from("example.org.user.alice.json"),
        });
        assert!(err.to_string().contains("example.org.user.alice.json"));
    }

    #[test]
    fn rate_limited_includes_reset() {
        let reset = "2024-05-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let err = Error::RateLimited { reset: Some(reset) };
        assert!(err.to_string().contains("2024-05-01"));
    }
}
