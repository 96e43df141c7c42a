//! SQLite storage layer for the conversion queue.
//!
//! This module provides the persistence layer with:
//! - Transactions built as plain data and applied atomically by an executor
//! - A forward-only, versioned migration engine
//! - A positional record codec shared by every read and write
//!
//! # Submodules
//!
//! - [`codec`] - Queue item <-> column tuple
//! - [`conversion_queue`] - Queue repository
//! - [`executor`] - Transaction executors (SQLite, async handle)
//! - [`migrations`] - Version -> transform registry
//! - [`schema`] - Table creation and upgrade driver
//! - [`table_util`] - Rebuild helpers (copy, rename, drop, index)
//! - [`time`] - POSIX <-> storage epoch
//! - [`transaction`] - Commands and transactions

pub mod codec;
pub mod conversion_queue;
pub mod executor;
pub mod migrations;
pub mod schema;
pub mod table_util;
pub mod time;
pub mod transaction;

pub use conversion_queue::{ConversionQueue, KeyedQueueResult, QueueResult, DEFAULT_BATCH_SIZE};
pub use executor::{Database, SqliteExecutor, TransactionExecutor};
pub use schema::{initialize, InitializeOutcome, DATABASE_VERSION};
pub use transaction::{Command, CommandResponse, CommandType, Transaction};
