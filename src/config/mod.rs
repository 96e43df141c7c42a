//! Configuration management.
//!
//! Resolves where the queue database lives and how large insert batches
//! are. Command-line flags win over environment variables, which win over
//! built-in defaults.

use crate::error::{Error, Result};
use crate::storage::codec::COLUMNS;
use crate::storage::DEFAULT_BATCH_SIZE;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Environment variable overriding the database path.
pub const DB_ENV: &str = "CONVQ_DB";

/// Environment variable overriding the insert batch size.
pub const BATCH_SIZE_ENV: &str = "CONVQ_BATCH_SIZE";

/// Highest number of `?` parameters SQLite accepts in one statement.
pub const MAX_BOUND_PARAMETERS: usize = 32_766;

/// Largest batch whose multi-row `INSERT` stays within [`MAX_BOUND_PARAMETERS`].
pub const MAX_BATCH_SIZE: usize = MAX_BOUND_PARAMETERS / COLUMNS.len();

/// Global data directory, `~/.convq/`.
#[must_use]
pub fn global_convq_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".convq"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. `explicit_path` (the `--db` flag)
/// 2. `CONVQ_DB` environment variable
/// 3. `~/.convq/data/conversion_queue.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(db_path) = std::env::var(DB_ENV) {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_convq_dir().map(|dir| dir.join("data").join("conversion_queue.db"))
}

/// Resolve the insert batch size.
///
/// Priority: `explicit` (the `--batch-size` flag), then `CONVQ_BATCH_SIZE`,
/// then [`DEFAULT_BATCH_SIZE`].
///
/// # Errors
///
/// Returns `Error::Config` if the chosen value is zero, not a number, or
/// larger than [`MAX_BATCH_SIZE`].
pub fn resolve_batch_size(explicit: Option<usize>) -> Result<NonZeroUsize> {
    if let Some(size) = explicit {
        return parse_batch_size(&size.to_string());
    }

    match std::env::var(BATCH_SIZE_ENV) {
        Ok(value) if !value.trim().is_empty() => parse_batch_size(&value),
        _ => Ok(DEFAULT_BATCH_SIZE),
    }
}

fn parse_batch_size(value: &str) -> Result<NonZeroUsize> {
    let size = value
        .trim()
        .parse::<NonZeroUsize>()
        .map_err(|_| Error::Config(format!("Invalid batch size '{value}'")))?;

    if size.get() > MAX_BATCH_SIZE {
        return Err(Error::Config(format!(
            "Invalid batch size '{value}': at most {MAX_BATCH_SIZE} rows fit in one insert"
        )));
    }

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_db_path_wins() {
        let path = Path::new("/tmp/queue.db");
        assert_eq!(resolve_db_path(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn test_explicit_batch_size() {
        assert_eq!(resolve_batch_size(Some(7)).unwrap().get(), 7);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let err = resolve_batch_size(Some(0)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_batch_size_is_capped_by_bound_parameter_limit() {
        assert_eq!(MAX_BATCH_SIZE, 2978);
        assert_eq!(resolve_batch_size(Some(2978)).unwrap().get(), 2978);

        let err = resolve_batch_size(Some(3000)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_parse_batch_size_trims() {
        assert_eq!(parse_batch_size(" 25 ").unwrap().get(), 25);
        assert!(parse_batch_size("many").is_err());
    }
}
