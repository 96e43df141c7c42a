//! Queue command implementations (save, list, next, get, mark-processed, delete).

use crate::config::{resolve_batch_size, resolve_db_path};
use crate::error::{Error, Result};
use crate::model::ConversionQueueItem;
use crate::storage::schema::initialize;
use crate::storage::{ConversionQueue, Database, SqliteExecutor};
use colored::Colorize;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Output for save.
#[derive(Serialize)]
struct SaveOutput {
    submitted: usize,
    saved: usize,
    dropped: usize,
}

/// Output for list/next/get.
#[derive(Serialize)]
struct ListOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    creative_instance_id: Option<&'a str>,
    items: &'a [ConversionQueueItem],
    count: usize,
}

/// Output for mark-processed/delete.
#[derive(Serialize)]
struct MutateOutput<'a> {
    creative_instance_id: &'a str,
    action: &'a str,
}

/// Open the queue at the resolved path, upgrading its schema first.
fn open_queue(
    db_path: Option<&PathBuf>,
    batch_size: Option<usize>,
) -> Result<ConversionQueue<SqliteExecutor>> {
    let db_path = resolve_db_path(db_path.map(|p| p.as_path()))
        .ok_or_else(|| Error::Config("Could not determine database path".to_string()))?;

    if !db_path.exists() {
        return Err(Error::NotInitialized { path: db_path });
    }

    let batch_size = resolve_batch_size(batch_size)?;

    let mut executor = SqliteExecutor::open(&db_path)?;
    initialize(&mut executor)?;

    Ok(ConversionQueue::new(Database::new(executor)).with_batch_size(batch_size))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(Error::Io)
}

/// Key-only item used to address rows by creative instance.
fn key_item(creative_instance_id: &str) -> ConversionQueueItem {
    ConversionQueueItem::new("", creative_instance_id)
}

fn read_items(file: &Path) -> Result<Vec<ConversionQueueItem>> {
    let content = if file == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(file)?
    };

    Ok(serde_json::from_str(&content)?)
}

/// Execute the save command.
///
/// # Errors
///
/// Returns an error if the input cannot be read or the transaction fails.
pub fn save(
    file: &Path,
    db_path: Option<&PathBuf>,
    batch_size: Option<usize>,
    json: bool,
) -> Result<()> {
    let items = read_items(file)?;
    let queue = open_queue(db_path, batch_size)?;

    let saved = items.iter().filter(|item| item.is_valid()).count();
    if !runtime()?.block_on(queue.save(&items)) {
        return Err(Error::Executor("Failed to save conversion queue items".to_string()));
    }

    if crate::is_quiet() {
        return Ok(());
    }

    let output = SaveOutput {
        submitted: items.len(),
        saved,
        dropped: items.len() - saved,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else if output.dropped > 0 {
        println!(
            "Saved {} item(s), {}",
            output.saved,
            format!("dropped {} invalid", output.dropped).yellow()
        );
    } else {
        println!("Saved {} item(s)", output.saved);
    }

    Ok(())
}

/// Execute the list command.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the read fails.
pub fn list(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let queue = open_queue(db_path, None)?;
    let result = runtime()?.block_on(queue.get_all());
    if !result.success {
        return Err(Error::Executor("Failed to get conversion queue".to_string()));
    }

    print_items(None, &result.items, json)
}

/// Execute the next command.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the read fails.
pub fn next(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let queue = open_queue(db_path, None)?;
    let result = runtime()?.block_on(queue.get_next());
    if !result.success {
        return Err(Error::Executor("Failed to get next conversion".to_string()));
    }

    print_items(None, &result.items, json)
}

/// Execute the get command.
///
/// # Errors
///
/// Returns an error for an empty id, or if the read fails.
pub fn get(creative_instance_id: &str, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    if creative_instance_id.is_empty() {
        return Err(Error::InvalidArgument(
            "creative instance id must not be empty".to_string(),
        ));
    }

    let queue = open_queue(db_path, None)?;
    let result = runtime()?.block_on(queue.get_for_creative_instance_id(creative_instance_id));
    if !result.success {
        return Err(Error::Executor(format!(
            "Failed to get conversion queue for {creative_instance_id}"
        )));
    }

    print_items(Some(&result.creative_instance_id), &result.items, json)
}

/// Execute the mark-processed command.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn mark_processed(creative_instance_id: &str, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let queue = open_queue(db_path, None)?;
    if !runtime()?.block_on(queue.mark_as_processed(&key_item(creative_instance_id))) {
        return Err(Error::Executor("Failed to mark conversion as processed".to_string()));
    }

    print_mutation(creative_instance_id, "marked_processed", json)
}

/// Execute the delete command.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete(creative_instance_id: &str, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let queue = open_queue(db_path, None)?;
    if !runtime()?.block_on(queue.delete(&key_item(creative_instance_id))) {
        return Err(Error::Executor("Failed to delete conversion".to_string()));
    }

    print_mutation(creative_instance_id, "deleted", json)
}

fn print_mutation(creative_instance_id: &str, action: &str, json: bool) -> Result<()> {
    if crate::is_quiet() {
        return Ok(());
    }

    if json {
        let output = MutateOutput {
            creative_instance_id,
            action,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{}: {creative_instance_id}", action.replace('_', " "));
    }

    Ok(())
}

fn print_items(
    creative_instance_id: Option<&str>,
    items: &[ConversionQueueItem],
    json: bool,
) -> Result<()> {
    if crate::is_quiet() {
        return Ok(());
    }

    if json {
        let output = ListOutput {
            creative_instance_id,
            items,
            count: items.len(),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No queued conversions.");
        return Ok(());
    }

    for item in items {
        let process_at = item
            .process_at
            .map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
        let status = if item.was_processed {
            "processed".dimmed()
        } else {
            "pending".green()
        };

        println!(
            "{}  {}  {}  {}  {}",
            process_at,
            status,
            item.creative_instance_id.bold(),
            item.action_type,
            item.ad_type.as_str()
        );
    }

    Ok(())
}
