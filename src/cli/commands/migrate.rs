//! Migrate command: create or upgrade the queue database.

use crate::config::resolve_db_path;
use crate::error::{Error, Result};
use crate::storage::schema::{initialize, migrate_from};
use crate::storage::{InitializeOutcome, SqliteExecutor, DATABASE_VERSION};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct MigrateOutput {
    path: String,
    outcome: &'static str,
    from_version: Option<u32>,
    version: u32,
}

/// Execute the migrate command.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or a migration step fails.
pub fn execute(from: Option<u32>, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(|p| p.as_path()))
        .ok_or_else(|| Error::Config("Could not determine database path".to_string()))?;

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut executor = SqliteExecutor::open(&db_path)?;
    let outcome = match from {
        Some(version) => migrate_from(&mut executor, version)?,
        None => initialize(&mut executor)?,
    };

    let (label, from_version) = match outcome {
        InitializeOutcome::Created => ("created", None),
        InitializeOutcome::Migrated { from, .. } => ("migrated", Some(from)),
        InitializeOutcome::UpToDate => ("up_to_date", None),
    };

    if crate::is_quiet() {
        return Ok(());
    }

    if json {
        let output = MigrateOutput {
            path: db_path.display().to_string(),
            outcome: label,
            from_version,
            version: DATABASE_VERSION,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        match outcome {
            InitializeOutcome::Created => {
                println!("Created {} at schema {DATABASE_VERSION}", db_path.display());
            }
            InitializeOutcome::Migrated { from, to } => {
                println!("Migrated {} from schema {from} to {to}", db_path.display());
            }
            InitializeOutcome::UpToDate => {
                println!("{} is up to date (schema {DATABASE_VERSION})", db_path.display());
            }
        }
    }

    Ok(())
}
