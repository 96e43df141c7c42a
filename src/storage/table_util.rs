//! Structural table operations used by migrations.
//!
//! SQLite has no general in-place column rename/retype, so schema changes
//! rebuild the table: create a temporary table, copy columns across, drop
//! the old table and rename the temporary one into place.

use crate::storage::transaction::{Command, Transaction};

/// Drop a table if it exists.
#[must_use]
pub fn drop_table(transaction: Transaction, table_name: &str) -> Transaction {
    transaction.with_command(Command::execute(format!("DROP TABLE IF EXISTS {table_name};")))
}

/// Rename a table.
#[must_use]
pub fn rename_table(transaction: Transaction, from: &str, to: &str) -> Transaction {
    transaction.with_command(Command::execute(format!("ALTER TABLE {from} RENAME TO {to};")))
}

/// Copy identically-named columns between tables.
#[must_use]
pub fn copy_table_columns(
    transaction: Transaction,
    from: &str,
    to: &str,
    columns: &[&str],
    should_drop: bool,
) -> Transaction {
    copy_table_columns_renamed(transaction, from, to, columns, columns, should_drop)
}

/// Copy `from_columns` of `from` into `to_columns` of `to`, position by position.
///
/// Source columns not listed are discarded; destination columns not listed
/// take their declared default.
///
/// # Panics
///
/// Panics if the column lists differ in length. The lists are compile-time
/// constants in every migration.
#[must_use]
pub fn copy_table_columns_renamed(
    transaction: Transaction,
    from: &str,
    to: &str,
    from_columns: &[&str],
    to_columns: &[&str],
    should_drop: bool,
) -> Transaction {
    assert_eq!(
        from_columns.len(),
        to_columns.len(),
        "column mapping must be one-to-one"
    );

    let transaction = transaction.with_command(Command::execute(format!(
        "INSERT INTO {to} ({}) SELECT {} FROM {from};",
        to_columns.join(", "),
        from_columns.join(", ")
    )));

    if should_drop {
        drop_table(transaction, from)
    } else {
        transaction
    }
}

/// Name of the index covering `columns` on `table_name`.
#[must_use]
pub fn index_name(table_name: &str, columns: &[&str]) -> String {
    format!("{table_name}_{}_index", columns.join("_"))
}

/// Create an index named after its table and columns.
#[must_use]
pub fn create_table_index(transaction: Transaction, table_name: &str, columns: &[&str]) -> Transaction {
    transaction.with_command(Command::execute(format!(
        "CREATE INDEX IF NOT EXISTS {} ON {table_name} ({});",
        index_name(table_name, columns),
        columns.join(", ")
    )))
}

/// Drop an index if it exists.
#[must_use]
pub fn drop_table_index(transaction: Transaction, index_name: &str) -> Transaction {
    transaction.with_command(Command::execute(format!("DROP INDEX IF EXISTS {index_name};")))
}
