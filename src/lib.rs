//! Conversion queue: a persistent, versioned store for deferred ad conversions.
//!
//! # Architecture
//!
//! - [`model`] - Queue item types and validation
//! - [`storage`] - Transactions, migrations, codec and the queue repository
//! - [`diagnostics`] - Sink for dropped records
//! - [`config`] - Database path and batch size resolution
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod storage;

pub use error::{Error, Result};

/// Global quiet flag for `--quiet`.
///
/// When set, commands print nothing on success. Avoids threading a
/// `quiet` bool through every handler signature.
pub static QUIET: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

/// Check if quiet mode is active.
#[inline]
pub fn is_quiet() -> bool {
    QUIET.load(std::sync::atomic::Ordering::Relaxed)
}
