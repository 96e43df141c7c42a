//! Transaction executors.
//!
//! The repository and migration engine only build [`Transaction`]s; an
//! executor applies them atomically. [`SqliteExecutor`] does so against a
//! rusqlite connection, and [`Database`] moves that work onto tokio's
//! blocking pool so callers never block on SQLite.

use crate::error::{Error, Result};
use crate::storage::transaction::{ColumnType, CommandResponse, CommandType, Record, Transaction};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Applies a transaction as one atomic unit.
///
/// Implementations must either commit every command or none of them.
pub trait TransactionExecutor: Send + 'static {
    /// Run all commands in order, returning the records of the last `Read`.
    ///
    /// # Errors
    ///
    /// Returns an error if any command fails; nothing is committed in that case.
    fn execute(&mut self, transaction: &Transaction) -> Result<CommandResponse>;
}

/// SQLite-backed executor.
#[derive(Debug)]
pub struct SqliteExecutor {
    conn: Connection,
}

impl SqliteExecutor {
    /// Open a database at the given path with the default 5 second busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Underlying connection, for inspection.
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl TransactionExecutor for SqliteExecutor {
    fn execute(&mut self, transaction: &Transaction) -> Result<CommandResponse> {
        debug!(commands = transaction.len(), "Running transaction");

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut response = CommandResponse::default();

        for command in transaction.commands() {
            match command.kind {
                CommandType::Execute => tx.execute_batch(&command.sql)?,
                CommandType::Run => {
                    tx.execute(&command.sql, params_from_iter(command.bindings.iter()))?;
                }
                CommandType::Read => {
                    let mut stmt = tx.prepare(&command.sql)?;
                    let column_count = stmt.column_count();
                    let records = stmt
                        .query_map(params_from_iter(command.bindings.iter()), |row| {
                            (0..column_count)
                                .map(|index| {
                                    let value: Value = row.get(index)?;
                                    Ok(normalize(value, command.record_bindings.get(index)))
                                })
                                .collect::<rusqlite::Result<Record>>()
                        })?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    response.records = records;
                }
            }
        }

        // Dropping `tx` on any `?` above rolls everything back.
        tx.commit()?;

        Ok(response)
    }
}

/// Replace `NULL` with the zero value of the declared column type.
fn normalize(value: Value, column_type: Option<&ColumnType>) -> Value {
    match (value, column_type) {
        (Value::Null, Some(ColumnType::Text)) => Value::Text(String::new()),
        (Value::Null, Some(ColumnType::Int | ColumnType::Int64 | ColumnType::Bool)) => {
            Value::Integer(0)
        }
        (value, _) => value,
    }
}

/// Shared, clonable handle that applies transactions one at a time.
pub struct Database<E: TransactionExecutor> {
    executor: Arc<Mutex<E>>,
}

impl<E: TransactionExecutor> Clone for Database<E> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<E: TransactionExecutor> Database<E> {
    #[must_use]
    pub fn new(executor: E) -> Self {
        Self {
            executor: Arc::new(Mutex::new(executor)),
        }
    }

    /// Run a transaction on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns the executor's error, or `Error::Executor` if the worker
    /// could not run the transaction.
    pub async fn run(&self, transaction: Transaction) -> Result<CommandResponse> {
        let executor = Arc::clone(&self.executor);

        tokio::task::spawn_blocking(move || {
            let mut executor = executor
                .lock()
                .map_err(|_| Error::Executor("executor lock poisoned".to_string()))?;
            executor.execute(&transaction)
        })
        .await
        .map_err(|e| Error::Executor(e.to_string()))?
    }

    /// Run a closure with exclusive access to the executor on the current thread.
    ///
    /// Used for start-up work such as schema upgrades that must finish before
    /// any queued traffic.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or `Error::Executor` if the lock is poisoned.
    pub fn with_executor<R>(&self, f: impl FnOnce(&mut E) -> Result<R>) -> Result<R> {
        let mut executor = self
            .executor
            .lock()
            .map_err(|_| Error::Executor("executor lock poisoned".to_string()))?;
        f(&mut *executor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::transaction::Command;

    #[test]
    fn test_commits_all_commands() {
        let mut executor = SqliteExecutor::open_memory().unwrap();
        let tx = Transaction::new()
            .with_command(Command::execute("CREATE TABLE t (a TEXT, b INTEGER);"))
            .with_command(Command::run(
                "INSERT INTO t (a, b) VALUES (?, ?), (?, ?);",
                vec![
                    Value::Text("x".into()),
                    Value::Integer(1),
                    Value::Null,
                    Value::Null,
                ],
            ))
            .with_command(Command::read(
                "SELECT a, b FROM t ORDER BY rowid;",
                vec![],
                vec![ColumnType::Text, ColumnType::Int],
            ));

        let response = executor.execute(&tx).unwrap();
        assert_eq!(
            response.records,
            vec![
                vec![Value::Text("x".into()), Value::Integer(1)],
                vec![Value::Text(String::new()), Value::Integer(0)],
            ]
        );
    }

    #[test]
    fn test_failure_rolls_back_everything() {
        let mut executor = SqliteExecutor::open_memory().unwrap();
        executor
            .execute(&Transaction::new().with_command(Command::execute("CREATE TABLE t (a TEXT NOT NULL);")))
            .unwrap();

        let tx = Transaction::new()
            .with_command(Command::run("INSERT INTO t (a) VALUES (?);", vec![Value::Text("kept?".into())]))
            .with_command(Command::run("INSERT INTO t (a) VALUES (?);", vec![Value::Null]));
        assert!(executor.execute(&tx).is_err());

        let count: i64 = executor
            .conn()
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_database_runs_on_blocking_pool() {
        let db = Database::new(SqliteExecutor::open_memory().unwrap());
        db.run(Transaction::new().with_command(Command::execute("CREATE TABLE t (a INTEGER);")))
            .await
            .unwrap();

        let response = db
            .run(Transaction::new().with_command(Command::read(
                "SELECT COUNT(*) FROM t;",
                vec![],
                vec![ColumnType::Int],
            )))
            .await
            .unwrap();
        assert_eq!(response.records, vec![vec![Value::Integer(0)]]);
    }
}
