//! Transactions as plain data.
//!
//! A [`Transaction`] is an ordered list of [`Command`]s that an executor
//! applies atomically: every command commits or none do. Building one does
//! no I/O. Builders take the transaction by value and hand it back, so a
//! half-built transaction is never shared between helpers.

use rusqlite::types::Value;

/// How an executor should run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    /// DDL or literal SQL without parameters.
    Execute,
    /// Parameterized DML.
    Run,
    /// Query whose rows are returned as records.
    Read,
}

/// Declared type of a column returned by a `Read` command.
///
/// Executors use it to normalize `NULL`s so decoders can read columns
/// positionally without special-casing legacy rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Int,
    Int64,
    Bool,
}

/// A positional row returned by a `Read` command.
pub type Record = Vec<Value>;

/// A single SQL command.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandType,
    pub sql: String,
    /// Positional parameters for `Run` and `Read` commands.
    pub bindings: Vec<Value>,
    /// Column types for `Read` commands, in select order.
    pub record_bindings: Vec<ColumnType>,
}

impl Command {
    /// Literal SQL with no parameters.
    #[must_use]
    pub fn execute(sql: impl Into<String>) -> Self {
        Self {
            kind: CommandType::Execute,
            sql: sql.into(),
            bindings: Vec::new(),
            record_bindings: Vec::new(),
        }
    }

    /// Parameterized statement that returns no rows.
    #[must_use]
    pub fn run(sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        Self {
            kind: CommandType::Run,
            sql: sql.into(),
            bindings,
            record_bindings: Vec::new(),
        }
    }

    /// Query returning rows typed by `record_bindings`.
    #[must_use]
    pub fn read(
        sql: impl Into<String>,
        bindings: Vec<Value>,
        record_bindings: Vec<ColumnType>,
    ) -> Self {
        Self {
            kind: CommandType::Read,
            sql: sql.into(),
            bindings,
            record_bindings,
        }
    }
}

/// An ordered, append-only list of commands applied as one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    commands: Vec<Command>,
}

impl Transaction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one command.
    #[must_use]
    pub fn with_command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Append several commands in order.
    #[must_use]
    pub fn with_commands(mut self, commands: impl IntoIterator<Item = Command>) -> Self {
        self.commands.extend(commands);
        self
    }

    /// Append every command of `other` after this transaction's commands.
    #[must_use]
    pub fn extend(self, other: Transaction) -> Self {
        self.with_commands(other.commands)
    }

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

/// Result of a committed transaction.
///
/// Holds the records of the last `Read` command, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandResponse {
    pub records: Vec<Record>,
}

/// Build `count` row placeholders of `parameters` bound values each,
/// e.g. `(?, ?), (?, ?)`.
#[must_use]
pub fn build_binding_parameter_placeholders(parameters: usize, count: usize) -> String {
    let row = format!("({})", vec!["?"; parameters].join(", "));
    vec![row; count].join(", ")
}

/// Read a text column, treating `NULL` and non-text values as empty.
#[must_use]
pub fn column_string(record: &[Value], index: usize) -> String {
    match record.get(index) {
        Some(Value::Text(text)) => text.clone(),
        _ => String::new(),
    }
}

/// Read an integer column, treating `NULL` and non-integer values as zero.
#[must_use]
pub fn column_int64(record: &[Value], index: usize) -> i64 {
    match record.get(index) {
        Some(Value::Integer(value)) => *value,
        _ => 0,
    }
}

/// Read a boolean column stored as an integer.
#[must_use]
pub fn column_bool(record: &[Value], index: usize) -> bool {
    column_int64(record, index) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preserves_order() {
        let first = Transaction::new().with_command(Command::execute("A"));
        let second = Transaction::new()
            .with_command(Command::execute("B"))
            .with_command(Command::execute("C"));

        let combined = first.extend(second);

        let sql: Vec<&str> = combined.commands().iter().map(|c| c.sql.as_str()).collect();
        assert_eq!(sql, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(build_binding_parameter_placeholders(2, 3), "(?, ?), (?, ?), (?, ?)");
        assert_eq!(build_binding_parameter_placeholders(3, 1), "(?, ?, ?)");
        assert_eq!(build_binding_parameter_placeholders(3, 0), "");
    }

    #[test]
    fn test_column_helpers_default_on_null() {
        let record = vec![Value::Null, Value::Text("x".into()), Value::Integer(7)];
        assert_eq!(column_string(&record, 0), "");
        assert_eq!(column_string(&record, 1), "x");
        assert_eq!(column_int64(&record, 0), 0);
        assert_eq!(column_int64(&record, 2), 7);
        assert!(column_bool(&record, 2));
        assert!(!column_bool(&record, 9));
    }
}
