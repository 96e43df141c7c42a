//! Schema creation and upgrade driver.
//!
//! A fresh database gets the current `conversion_queue` schema directly.
//! An existing one is walked forward one version at a time, each step in
//! its own transaction together with the version bump, so a version is
//! recorded if and only if its transform committed.

use crate::error::{Error, Result};
use crate::storage::codec::TABLE_NAME;
use crate::storage::executor::TransactionExecutor;
use crate::storage::migrations::{has_migration, migrate};
use crate::storage::table_util::create_table_index;
use crate::storage::transaction::{column_int64, ColumnType, Command, Transaction};
use rusqlite::types::Value;
use tracing::info;

/// Schema version written by this release.
pub const DATABASE_VERSION: u32 = 35;

/// Current `conversion_queue` table.
///
/// `process_at` holds storage-epoch microseconds (see [`crate::storage::time`]).
pub const CREATE_TABLE_SQL: &str = r"
CREATE TABLE conversion_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    ad_type TEXT,
    campaign_id TEXT,
    creative_set_id TEXT NOT NULL,
    creative_instance_id TEXT NOT NULL,
    advertiser_id TEXT,
    segment TEXT,
    type TEXT NOT NULL,
    verifiable_conversion_id TEXT,
    verifiable_advertiser_public_key TEXT,
    process_at TIMESTAMP NOT NULL,
    was_processed INTEGER DEFAULT 0
);
";

const CREATE_VERSION_TABLE_SQL: &str =
    "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);";

/// What [`initialize`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializeOutcome {
    /// No schema existed; the current one was created.
    Created,
    /// The schema was walked forward from `from`.
    Migrated { from: u32, to: u32 },
    /// Already at [`DATABASE_VERSION`].
    UpToDate,
}

/// Append the commands creating the current table and its indexes.
#[must_use]
pub fn create(transaction: Transaction) -> Transaction {
    let transaction = transaction.with_command(Command::execute(CREATE_TABLE_SQL));
    let transaction = create_table_index(transaction, TABLE_NAME, &["creative_instance_id", "process_at"]);
    create_table_index(transaction, TABLE_NAME, &["was_processed", "process_at"])
}

/// Append the commands recording `version` as the persisted version.
#[must_use]
pub fn set_version(transaction: Transaction, version: u32) -> Transaction {
    transaction
        .with_command(Command::execute(CREATE_VERSION_TABLE_SQL))
        .with_command(Command::execute("DELETE FROM schema_version;"))
        .with_command(Command::run(
            "INSERT INTO schema_version (version) VALUES (?);",
            vec![Value::Integer(i64::from(version))],
        ))
}

/// Persisted schema version, or `None` for a fresh database.
///
/// # Errors
///
/// Returns an error if the executor fails or the stored version is out of range.
pub fn current_version<E: TransactionExecutor>(executor: &mut E) -> Result<Option<u32>> {
    let transaction = Transaction::new()
        .with_command(Command::execute(CREATE_VERSION_TABLE_SQL))
        .with_command(Command::read(
            "SELECT version FROM schema_version LIMIT 1;",
            Vec::new(),
            vec![ColumnType::Int],
        ));

    let response = executor.execute(&transaction)?;

    response
        .records
        .first()
        .map(|record| {
            let version = column_int64(record, 0);
            u32::try_from(version)
                .map_err(|_| Error::Other(format!("Invalid stored schema version {version}")))
        })
        .transpose()
}

/// Create or upgrade the schema to [`DATABASE_VERSION`].
///
/// Must complete before any repository traffic.
///
/// # Errors
///
/// Returns `Error::UnsupportedVersion` if the database is newer than this
/// release, or the executor's error if a step fails. Steps that committed
/// before the failure stay committed.
pub fn initialize<E: TransactionExecutor>(executor: &mut E) -> Result<InitializeOutcome> {
    match current_version(executor)? {
        None => {
            info!(version = DATABASE_VERSION, "Creating conversion queue schema");
            executor.execute(&set_version(create(Transaction::new()), DATABASE_VERSION))?;
            Ok(InitializeOutcome::Created)
        }
        Some(version) if version == DATABASE_VERSION => Ok(InitializeOutcome::UpToDate),
        Some(version) => upgrade(executor, version),
    }
}

/// Adopt a database at a known legacy version and walk it forward to
/// [`DATABASE_VERSION`].
///
/// Only for databases that have no recorded version, or whose recorded
/// version equals `from_version`. Replaying transforms below the recorded
/// version would rebuild (and for version 10, empty) a live table.
///
/// # Errors
///
/// Returns `Error::VersionMismatch` if a different version is recorded,
/// `Error::UnsupportedVersion` if `from_version` is newer than this release,
/// or the executor's error if a step fails.
pub fn migrate_from<E: TransactionExecutor>(
    executor: &mut E,
    from_version: u32,
) -> Result<InitializeOutcome> {
    if let Some(recorded) = current_version(executor)? {
        if recorded != from_version {
            return Err(Error::VersionMismatch {
                recorded,
                requested: from_version,
            });
        }
    }

    upgrade(executor, from_version)
}

fn upgrade<E: TransactionExecutor>(executor: &mut E, from_version: u32) -> Result<InitializeOutcome> {
    if from_version > DATABASE_VERSION {
        return Err(Error::UnsupportedVersion {
            found: from_version,
            supported: DATABASE_VERSION,
        });
    }

    if from_version == DATABASE_VERSION {
        return Ok(InitializeOutcome::UpToDate);
    }

    for to_version in (from_version + 1)..=DATABASE_VERSION {
        executor.execute(&set_version(migrate(Transaction::new(), to_version), to_version))?;

        if has_migration(to_version) {
            info!(version = to_version, "Migrated conversion queue");
        }
    }

    Ok(InitializeOutcome::Migrated {
        from: from_version,
        to: DATABASE_VERSION,
    })
}
