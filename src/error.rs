//! Error types for contactsync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for contactsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,
    UnsupportedSchema,

    // Not Found (exit 3)
    ContactNotFound,
    GroupNotFound,

    // Validation (exit 4)
    InvalidArgument,

    // Provider / sync (exit 6)
    ProviderError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::UnsupportedSchema => "UNSUPPORTED_SCHEMA",
            Self::ContactNotFound => "CONTACT_NOT_FOUND",
            Self::GroupNotFound => "GROUP_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::ProviderError => "PROVIDER_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized
            | Self::AlreadyInitialized
            | Self::DatabaseError
            | Self::UnsupportedSchema => 2,
            Self::ContactNotFound | Self::GroupNotFound => 3,
            Self::InvalidArgument => 4,
            Self::ProviderError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether re-running the same pass can succeed without changing input.
    ///
    /// Passes are idempotent, so a busy database or a flaky provider read
    /// is worth retrying. Validation and not-found errors are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::DatabaseError | Self::ProviderError | Self::IoError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in contactsync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `csync init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Contact not found: {id}")]
    ContactNotFound { id: i64 },

    #[error("Could not load all contacts for merging (missing: {})", join_ids(missing))]
    ContactsNotFound { missing: Vec<i64> },

    #[error("Group not found: {id}")]
    GroupNotFound { id: i64 },

    #[error("Database schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: i32, supported: i32 },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Contact provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::UnsupportedSchema { .. } => ErrorCode::UnsupportedSchema,
            Self::ContactNotFound { .. } | Self::ContactsNotFound { .. } => {
                ErrorCode::ContactNotFound
            }
            Self::GroupNotFound { .. } => ErrorCode::GroupNotFound,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Provider(_) => ErrorCode::ProviderError,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `csync init` to create the local replica database".to_string())
            }

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::ContactNotFound { id } => Some(format!(
                "No contact with ID {id}. Use `csync contacts list` to see local contacts."
            )),

            Self::ContactsNotFound { .. } => Some(
                "Run `csync sync` first, then `csync duplicates` to get current contact IDs."
                    .to_string(),
            ),

            Self::GroupNotFound { id } => Some(format!(
                "No group with ID {id}. Use `csync groups list` to see available groups."
            )),

            Self::UnsupportedSchema { .. } => Some(
                "This database was written by a newer release. Upgrade csync or point --db at another file."
                    .to_string(),
            ),

            Self::Provider(_) => Some(
                "Check the snapshot path (--snapshot or CONTACTSYNC_SNAPSHOT). Nothing was written."
                    .to_string(),
            ),

            Self::InvalidArgument(msg) => {
                if msg.contains("merge") {
                    Some("Usage: csync merge <id> <id> [...] [--target <id>]".to_string())
                } else {
                    None
                }
            }

            Self::Database(_) | Self::Io(_) | Self::Json(_) | Self::Config(_) | Self::Other(_) => {
                None
            }
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
