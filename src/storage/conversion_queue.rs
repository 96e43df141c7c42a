//! Conversion queue repository.
//!
//! Every operation builds one [`Transaction`], hands it to the executor and
//! resolves exactly once with a success flag and any items. Errors never
//! escape: executor failures resolve as `success = false`, and invalid
//! records are dropped and reported to the [`DiagnosticSink`] while the
//! rest of the batch goes through.

use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::model::ConversionQueueItem;
use crate::storage::codec::{self, column_list, COLUMNS, RECORD_BINDINGS, TABLE_NAME};
use crate::storage::executor::{Database, TransactionExecutor};
use crate::storage::transaction::{
    build_binding_parameter_placeholders, Command, CommandResponse, Transaction,
};
use rusqlite::types::Value;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::error;

/// Rows per `INSERT`, bounding the number of bound parameters per statement.
pub const DEFAULT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(50) {
    Some(size) => size,
    None => unreachable!(),
};

/// Outcome of a read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueResult {
    pub success: bool,
    pub items: Vec<ConversionQueueItem>,
}

impl QueueResult {
    fn failed() -> Self {
        Self::default()
    }
}

/// Outcome of a lookup by creative instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyedQueueResult {
    pub success: bool,
    pub creative_instance_id: String,
    pub items: Vec<ConversionQueueItem>,
}

/// Repository over the `conversion_queue` table.
pub struct ConversionQueue<E: TransactionExecutor> {
    database: Database<E>,
    sink: Arc<dyn DiagnosticSink>,
    batch_size: NonZeroUsize,
}

impl<E: TransactionExecutor> Clone for ConversionQueue<E> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            sink: Arc::clone(&self.sink),
            batch_size: self.batch_size,
        }
    }
}

impl<E: TransactionExecutor> ConversionQueue<E> {
    /// Repository reporting defects through `tracing`.
    #[must_use]
    pub fn new(database: Database<E>) -> Self {
        Self::with_sink(database, Arc::new(TracingSink))
    }

    #[must_use]
    pub fn with_sink(database: Database<E>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            database,
            sink,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: NonZeroUsize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn table_name(&self) -> &'static str {
        TABLE_NAME
    }

    #[must_use]
    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }

    /// Insert `items`, dropping invalid ones.
    pub async fn save(&self, items: &[ConversionQueueItem]) -> bool {
        if items.is_empty() {
            return true;
        }

        let transaction = build_save_transaction(items, self.batch_size, self.sink.as_ref());
        if transaction.is_empty() {
            return true;
        }

        self.run(transaction, "save").await.is_some()
    }

    /// Remove every row for the item's creative instance.
    pub async fn delete(&self, item: &ConversionQueueItem) -> bool {
        let transaction = build_delete_transaction(&item.creative_instance_id);
        self.run(transaction, "delete").await.is_some()
    }

    /// Flag unprocessed rows for the item's creative instance as processed.
    ///
    /// Rows that were already processed are left alone; calling this twice
    /// is harmless.
    pub async fn mark_as_processed(&self, item: &ConversionQueueItem) -> bool {
        let transaction = build_mark_as_processed_transaction(&item.creative_instance_id);
        self.run(transaction, "mark as processed").await.is_some()
    }

    /// Every item, earliest `process_at` first.
    pub async fn get_all(&self) -> QueueResult {
        self.read(build_get_all_transaction(), "get all").await
    }

    /// The earliest unprocessed item, if any.
    pub async fn get_next(&self) -> QueueResult {
        self.read(build_get_next_transaction(), "get next").await
    }

    /// Items for one creative instance, earliest `process_at` first.
    ///
    /// An empty id fails without touching the database.
    pub async fn get_for_creative_instance_id(&self, creative_instance_id: &str) -> KeyedQueueResult {
        if creative_instance_id.is_empty() {
            return KeyedQueueResult::default();
        }

        let result = self
            .read(
                build_get_for_creative_instance_id_transaction(creative_instance_id),
                "get for creative instance id",
            )
            .await;

        KeyedQueueResult {
            success: result.success,
            creative_instance_id: creative_instance_id.to_string(),
            items: result.items,
        }
    }

    async fn read(&self, transaction: Transaction, operation: &str) -> QueueResult {
        let Some(response) = self.run(transaction, operation).await else {
            return QueueResult::failed();
        };

        let items = response
            .records
            .iter()
            .filter_map(|record| codec::decode(record, self.sink.as_ref()))
            .collect();

        QueueResult {
            success: true,
            items,
        }
    }

    async fn run(&self, transaction: Transaction, operation: &str) -> Option<CommandResponse> {
        match self.database.run(transaction).await {
            Ok(response) => Some(response),
            Err(e) => {
                error!(operation, error = %e, "Failed to {operation} conversion queue");
                None
            }
        }
    }
}

/// One multi-row `INSERT` per batch of valid items, all in one transaction.
///
/// Invalid items are reported to `sink` and left out.
#[must_use]
pub fn build_save_transaction(
    items: &[ConversionQueueItem],
    batch_size: NonZeroUsize,
    sink: &dyn DiagnosticSink,
) -> Transaction {
    let rows: Vec<Vec<Value>> = items
        .iter()
        .filter_map(|item| codec::encode(item, sink))
        .collect();

    let commands = rows.chunks(batch_size.get()).map(|batch| {
        let sql = format!(
            "INSERT INTO {TABLE_NAME} ({}) VALUES {};",
            column_list(),
            build_binding_parameter_placeholders(COLUMNS.len(), batch.len())
        );
        Command::run(sql, batch.concat())
    });

    Transaction::new().with_commands(commands)
}

#[must_use]
pub fn build_delete_transaction(creative_instance_id: &str) -> Transaction {
    Transaction::new().with_command(Command::run(
        format!("DELETE FROM {TABLE_NAME} WHERE creative_instance_id = ?;"),
        vec![Value::Text(creative_instance_id.to_string())],
    ))
}

#[must_use]
pub fn build_mark_as_processed_transaction(creative_instance_id: &str) -> Transaction {
    Transaction::new().with_command(Command::run(
        format!(
            "UPDATE {TABLE_NAME} SET was_processed = 1 \
             WHERE was_processed = 0 AND creative_instance_id = ?;"
        ),
        vec![Value::Text(creative_instance_id.to_string())],
    ))
}

#[must_use]
pub fn build_get_all_transaction() -> Transaction {
    select(
        format!(
            "SELECT {} FROM {TABLE_NAME} ORDER BY process_at ASC;",
            column_list()
        ),
        Vec::new(),
    )
}

#[must_use]
pub fn build_get_next_transaction() -> Transaction {
    select(
        format!(
            "SELECT {} FROM {TABLE_NAME} WHERE was_processed = 0 ORDER BY process_at ASC LIMIT 1;",
            column_list()
        ),
        Vec::new(),
    )
}

#[must_use]
pub fn build_get_for_creative_instance_id_transaction(creative_instance_id: &str) -> Transaction {
    select(
        format!(
            "SELECT {} FROM {TABLE_NAME} WHERE creative_instance_id = ? ORDER BY process_at ASC;",
            column_list()
        ),
        vec![Value::Text(creative_instance_id.to_string())],
    )
}

fn select(sql: String, bindings: Vec<Value>) -> Transaction {
    Transaction::new().with_command(Command::read(sql, bindings, RECORD_BINDINGS.to_vec()))
}
