//! Error types for the conversion queue store.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 4=validation, 7=config, etc.)
//! - Recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Repository operations never surface these to callers; they resolve
//! to `success = false` instead. The CLI and schema bootstrap use them
//! directly.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for conversion queue operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    DatabaseError,
    UnsupportedVersion,
    VersionMismatch,
    ExecutorError,

    // Validation (exit 4)
    InvalidArgument,

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
            Self::DatabaseError => "DATABASE_ERROR",
            Self::UnsupportedVersion => "UNSUPPORTED_VERSION",
            Self::VersionMismatch => "VERSION_MISMATCH",
            Self::ExecutorError => "EXECUTOR_ERROR",
            Self::InvalidArgument => "INVALID_ARGUMENT",
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
            | Self::DatabaseError
            | Self::UnsupportedVersion
            | Self::VersionMismatch
            | Self::ExecutorError => 2,
            Self::InvalidArgument => 4,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying with corrected input may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::InvalidArgument | Self::DatabaseError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in conversion queue operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database not found at {path}")]
    NotInitialized { path: PathBuf },

    #[error("Database version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Database is recorded at version {recorded}, not {requested}")]
    VersionMismatch { recorded: u32, requested: u32 },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized { .. } => ErrorCode::NotInitialized,
            Self::UnsupportedVersion { .. } => ErrorCode::UnsupportedVersion,
            Self::VersionMismatch { .. } => ErrorCode::VersionMismatch,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Executor(_) => ErrorCode::ExecutorError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
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

    /// Recovery hint, if one exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized { .. } => {
                Some("Run `convq migrate` to create the database".to_string())
            }
            Self::UnsupportedVersion { .. } => Some(
                "The database was written by a newer release. Upgrade convq; downgrades are not supported."
                    .to_string(),
            ),
            Self::VersionMismatch { .. } => Some(
                "Run `convq migrate` without --from; the recorded version is used automatically"
                    .to_string(),
            ),
            Self::Config(msg) if msg.contains("batch") => Some(format!(
                "Batch size must be a positive integer no larger than {}",
                crate::config::MAX_BATCH_SIZE
            )),
            _ => None,
        }
    }

    /// Structured JSON representation for machine consumption.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_json_includes_hint() {
        let err = Error::UnsupportedVersion {
            found: 40,
            supported: 35,
        };
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "UNSUPPORTED_VERSION");
        assert_eq!(json["error"]["exit_code"], 2);
        assert!(json["error"]["hint"].is_string());
    }

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::InvalidArgument("x".into()).exit_code(), 4);
        assert_eq!(Error::Config("x".into()).exit_code(), 7);
        assert_eq!(Error::Other("x".into()).exit_code(), 1);
        assert_eq!(
            Error::VersionMismatch {
                recorded: 35,
                requested: 9
            }
            .exit_code(),
            2
        );
    }
}
