//! Versioned schema transforms for the `conversion_queue` table.
//!
//! Each entry of [`MIGRATIONS`] turns the schema of version `N - 1` into the
//! schema of version `N`. Versions without an entry leave this table
//! untouched. Transforms are forward-only, and each must be applied exactly
//! once: the version counter in `schema_version` is what guarantees that,
//! not the SQL.

use crate::model::ConversionActionType;
use crate::storage::codec::TABLE_NAME;
use crate::storage::table_util::{
    copy_table_columns, copy_table_columns_renamed, create_table_index, drop_table,
    drop_table_index, rename_table,
};
use crate::storage::time::{EPOCH_OFFSET_SECONDS, MICROSECONDS_PER_SECOND};
use crate::storage::transaction::{Command, Transaction};

const TEMP_TABLE_NAME: &str = "conversion_queue_temp";

type Migrate = fn(Transaction) -> Transaction;

/// Registered transforms, ascending by target version.
const MIGRATIONS: &[(u32, Migrate)] = &[
    (10, migrate_to_v10),
    (11, migrate_to_v11),
    (17, migrate_to_v17),
    (21, migrate_to_v21),
    (26, migrate_to_v26),
    (28, migrate_to_v28),
    (29, migrate_to_v29),
    (30, migrate_to_v30),
    (35, migrate_to_v35),
];

/// Append the transform registered for `to_version`, if any.
#[must_use]
pub fn migrate(transaction: Transaction, to_version: u32) -> Transaction {
    match MIGRATIONS.binary_search_by_key(&to_version, |(version, _)| *version) {
        Ok(index) => (MIGRATIONS[index].1)(transaction),
        Err(_) => transaction,
    }
}

/// Whether `version` changes this table.
#[must_use]
pub fn has_migration(version: u32) -> bool {
    MIGRATIONS.iter().any(|(v, _)| *v == version)
}

fn migrate_to_v10(transaction: Transaction) -> Transaction {
    // Recreate from scratch; earlier migrations could leave a broken table.
    drop_table(transaction, TABLE_NAME).with_command(Command::execute(
        "CREATE TABLE conversion_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            campaign_id TEXT,
            creative_set_id TEXT NOT NULL,
            creative_instance_id TEXT NOT NULL,
            advertiser_id TEXT,
            conversion_id TEXT,
            timestamp TIMESTAMP NOT NULL
        );",
    ))
}

fn migrate_to_v11(transaction: Transaction) -> Transaction {
    // New `advertiser_public_key` column.
    let transaction = transaction.with_command(Command::execute(
        "CREATE TABLE conversion_queue_temp (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            campaign_id TEXT,
            creative_set_id TEXT NOT NULL,
            creative_instance_id TEXT NOT NULL,
            advertiser_id TEXT,
            conversion_id TEXT,
            advertiser_public_key TEXT,
            timestamp TIMESTAMP NOT NULL
        );",
    ));

    let columns = [
        "campaign_id",
        "creative_set_id",
        "creative_instance_id",
        "advertiser_id",
        "conversion_id",
        "timestamp",
    ];

    let transaction = copy_table_columns(transaction, TABLE_NAME, TEMP_TABLE_NAME, &columns, true);
    rename_table(transaction, TEMP_TABLE_NAME, TABLE_NAME)
}

fn migrate_to_v17(transaction: Transaction) -> Transaction {
    create_table_index(transaction, TABLE_NAME, &["creative_instance_id"])
}

fn migrate_to_v21(transaction: Transaction) -> Transaction {
    // New `ad_type` and `was_processed` columns.
    let transaction = transaction.with_command(Command::execute(
        "CREATE TABLE conversion_queue_temp (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            ad_type TEXT,
            campaign_id TEXT,
            creative_set_id TEXT NOT NULL,
            creative_instance_id TEXT NOT NULL,
            advertiser_id TEXT,
            conversion_id TEXT,
            advertiser_public_key TEXT,
            timestamp TIMESTAMP NOT NULL,
            was_processed INTEGER DEFAULT 0
        );",
    ));

    let columns = [
        "campaign_id",
        "creative_set_id",
        "creative_instance_id",
        "advertiser_id",
        "conversion_id",
        "advertiser_public_key",
        "timestamp",
    ];

    let transaction = copy_table_columns(transaction, TABLE_NAME, TEMP_TABLE_NAME, &columns, true);
    let transaction = rename_table(transaction, TEMP_TABLE_NAME, TABLE_NAME);

    // Legacy rows were all notification ads.
    transaction.with_command(Command::execute(
        "UPDATE conversion_queue SET ad_type = 'ad_notification' WHERE ad_type IS NULL;",
    ))
}

fn migrate_to_v26(transaction: Transaction) -> Transaction {
    // New `segment` column.
    let transaction = transaction.with_command(Command::execute(
        "CREATE TABLE conversion_queue_temp (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            ad_type TEXT,
            campaign_id TEXT,
            creative_set_id TEXT NOT NULL,
            creative_instance_id TEXT NOT NULL,
            advertiser_id TEXT,
            segment TEXT,
            conversion_id TEXT,
            advertiser_public_key TEXT,
            timestamp TIMESTAMP NOT NULL,
            was_processed INTEGER DEFAULT 0
        );",
    ));

    let columns = [
        "ad_type",
        "campaign_id",
        "creative_set_id",
        "creative_instance_id",
        "advertiser_id",
        "conversion_id",
        "advertiser_public_key",
        "timestamp",
        "was_processed",
    ];

    let transaction = copy_table_columns(transaction, TABLE_NAME, TEMP_TABLE_NAME, &columns, true);
    rename_table(transaction, TEMP_TABLE_NAME, TABLE_NAME)
}

fn migrate_to_v28(transaction: Transaction) -> Transaction {
    // `timestamp` becomes `process_at`.
    let transaction = transaction.with_command(Command::execute(
        "CREATE TABLE conversion_queue_temp (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            ad_type TEXT,
            campaign_id TEXT,
            creative_set_id TEXT NOT NULL,
            creative_instance_id TEXT NOT NULL,
            advertiser_id TEXT,
            segment TEXT,
            conversion_id TEXT,
            advertiser_public_key TEXT,
            process_at TIMESTAMP NOT NULL,
            was_processed INTEGER DEFAULT 0
        );",
    ));

    let from_columns = [
        "ad_type",
        "campaign_id",
        "creative_set_id",
        "creative_instance_id",
        "advertiser_id",
        "segment",
        "conversion_id",
        "advertiser_public_key",
        "timestamp",
        "was_processed",
    ];

    let to_columns = [
        "ad_type",
        "campaign_id",
        "creative_set_id",
        "creative_instance_id",
        "advertiser_id",
        "segment",
        "conversion_id",
        "advertiser_public_key",
        "process_at",
        "was_processed",
    ];

    let transaction = copy_table_columns_renamed(
        transaction,
        TABLE_NAME,
        TEMP_TABLE_NAME,
        &from_columns,
        &to_columns,
        true,
    );
    rename_table(transaction, TEMP_TABLE_NAME, TABLE_NAME)
}

fn migrate_to_v29(transaction: Transaction) -> Transaction {
    // POSIX seconds -> storage epoch microseconds.
    transaction.with_command(Command::execute(format!(
        "UPDATE conversion_queue SET process_at = (CAST(process_at AS INT64) + {EPOCH_OFFSET_SECONDS}) * {MICROSECONDS_PER_SECOND};"
    )))
}

fn migrate_to_v30(transaction: Transaction) -> Transaction {
    // New `type` column; `conversion_id` and `advertiser_public_key` gain a
    // `verifiable_` prefix.
    let transaction = transaction.with_command(Command::execute(format!(
        "CREATE TABLE conversion_queue_temp (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            ad_type TEXT,
            campaign_id TEXT,
            creative_set_id TEXT NOT NULL,
            creative_instance_id TEXT NOT NULL,
            advertiser_id TEXT,
            segment TEXT,
            type TEXT NOT NULL DEFAULT '{}',
            verifiable_conversion_id TEXT,
            verifiable_advertiser_public_key TEXT,
            process_at TIMESTAMP NOT NULL,
            was_processed INTEGER DEFAULT 0
        );",
        ConversionActionType::ViewThrough.as_str()
    )));

    let from_columns = [
        "ad_type",
        "campaign_id",
        "creative_set_id",
        "creative_instance_id",
        "advertiser_id",
        "segment",
        "conversion_id",
        "advertiser_public_key",
        "process_at",
        "was_processed",
    ];

    let to_columns = [
        "ad_type",
        "campaign_id",
        "creative_set_id",
        "creative_instance_id",
        "advertiser_id",
        "segment",
        "verifiable_conversion_id",
        "verifiable_advertiser_public_key",
        "process_at",
        "was_processed",
    ];

    let transaction = copy_table_columns_renamed(
        transaction,
        TABLE_NAME,
        TEMP_TABLE_NAME,
        &from_columns,
        &to_columns,
        true,
    );
    rename_table(transaction, TEMP_TABLE_NAME, TABLE_NAME)
}

fn migrate_to_v35(transaction: Transaction) -> Transaction {
    let transaction = drop_table_index(transaction, "conversion_queue_creative_instance_id_index");

    // Serves lookups by creative instance.
    let transaction = create_table_index(transaction, TABLE_NAME, &["creative_instance_id", "process_at"]);

    // Serves `get_next`.
    create_table_index(transaction, TABLE_NAME, &["was_processed", "process_at"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::executor::{SqliteExecutor, TransactionExecutor};
    use rusqlite::Connection;

    fn apply(executor: &mut SqliteExecutor, versions: std::ops::RangeInclusive<u32>) {
        for version in versions {
            let tx = migrate(Transaction::new(), version);
            executor.execute(&tx).expect("Migration should apply");
        }
    }

    fn columns(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM pragma_table_info('conversion_queue') ORDER BY cid")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn indexes(conn: &Connection) -> Vec<String> {
        conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'index' AND tbl_name = 'conversion_queue' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
    }

    #[test]
    fn test_registered_versions_are_ascending() {
        let versions: Vec<u32> = MIGRATIONS.iter().map(|(version, _)| *version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(versions, sorted);
        assert_eq!(versions, vec![10, 11, 17, 21, 26, 28, 29, 30, 35]);
    }

    #[test]
    fn test_unregistered_version_is_noop() {
        assert!(migrate(Transaction::new(), 12).is_empty());
        assert!(!has_migration(34));
        assert!(has_migration(29));
    }

    #[test]
    fn test_full_upgrade_yields_final_schema() {
        let mut executor = SqliteExecutor::open_memory().unwrap();
        apply(&mut executor, 1..=35);

        assert_eq!(
            columns(executor.conn()),
            vec![
                "id",
                "ad_type",
                "campaign_id",
                "creative_set_id",
                "creative_instance_id",
                "advertiser_id",
                "segment",
                "type",
                "verifiable_conversion_id",
                "verifiable_advertiser_public_key",
                "process_at",
                "was_processed",
            ]
        );
        assert_eq!(
            indexes(executor.conn()),
            vec![
                "conversion_queue_creative_instance_id_process_at_index",
                "conversion_queue_was_processed_process_at_index",
            ]
        );
    }

    #[test]
    fn test_v11_rebuild_preserves_listed_columns() {
        let mut executor = SqliteExecutor::open_memory().unwrap();
        apply(&mut executor, 10..=10);
        executor
            .conn()
            .execute(
                "INSERT INTO conversion_queue
                 (campaign_id, creative_set_id, creative_instance_id, advertiser_id, conversion_id, timestamp)
                 VALUES ('c', 's', 'i', 'a', 'conv', 1600000000)",
                [],
            )
            .unwrap();

        apply(&mut executor, 11..=11);

        let row: (String, String, String, String, String, Option<String>, i64) = executor
            .conn()
            .query_row(
                "SELECT campaign_id, creative_set_id, creative_instance_id, advertiser_id,
                        conversion_id, advertiser_public_key, timestamp
                 FROM conversion_queue",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .unwrap();

        assert_eq!(
            row,
            (
                "c".to_string(),
                "s".to_string(),
                "i".to_string(),
                "a".to_string(),
                "conv".to_string(),
                None,
                1_600_000_000
            )
        );
    }

    #[test]
    fn test_v21_backfills_ad_type() {
        let mut executor = SqliteExecutor::open_memory().unwrap();
        apply(&mut executor, 10..=20);
        executor
            .conn()
            .execute(
                "INSERT INTO conversion_queue (creative_set_id, creative_instance_id, timestamp)
                 VALUES ('s', 'i', 1600000000)",
                [],
            )
            .unwrap();

        apply(&mut executor, 21..=21);

        let (ad_type, was_processed): (String, i64) = executor
            .conn()
            .query_row("SELECT ad_type, was_processed FROM conversion_queue", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(ad_type, "ad_notification");
        assert_eq!(was_processed, 0);
    }

    #[test]
    fn test_legacy_row_survives_to_final_schema() {
        let mut executor = SqliteExecutor::open_memory().unwrap();
        apply(&mut executor, 10..=26);
        executor
            .conn()
            .execute(
                "INSERT INTO conversion_queue
                 (ad_type, campaign_id, creative_set_id, creative_instance_id, advertiser_id,
                  segment, conversion_id, advertiser_public_key, timestamp, was_processed)
                 VALUES ('new_tab_page_ad', 'c', 's', 'i', 'a', 'sports', 'conv', 'key', 1700000000, 1)",
                [],
            )
            .unwrap();

        apply(&mut executor, 27..=35);

        let row: (String, String, String, String, i64, i64) = executor
            .conn()
            .query_row(
                "SELECT ad_type, type, verifiable_conversion_id, verifiable_advertiser_public_key,
                        process_at, was_processed
                 FROM conversion_queue",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .unwrap();

        assert_eq!(
            row,
            (
                "new_tab_page_ad".to_string(),
                "view".to_string(),
                "conv".to_string(),
                "key".to_string(),
                13_344_473_600_000_000,
                1
            )
        );
    }

    #[test]
    fn test_v29_converts_posix_to_storage_epoch() {
        let mut executor = SqliteExecutor::open_memory().unwrap();
        apply(&mut executor, 10..=28);
        executor
            .conn()
            .execute(
                "INSERT INTO conversion_queue (creative_set_id, creative_instance_id, process_at)
                 VALUES ('s', 'i', 0)",
                [],
            )
            .unwrap();

        apply(&mut executor, 29..=29);

        let process_at: i64 = executor
            .conn()
            .query_row("SELECT process_at FROM conversion_queue", [], |row| row.get(0))
            .unwrap();
        assert_eq!(process_at, EPOCH_OFFSET_SECONDS * MICROSECONDS_PER_SECOND);
    }

    #[test]
    fn test_v35_replaces_index_set() {
        let mut executor = SqliteExecutor::open_memory().unwrap();
        apply(&mut executor, 10..=34);
        assert_eq!(
            indexes(executor.conn()),
            Vec::<String>::new(),
            "rebuilds drop the v17 index with the old table"
        );

        apply(&mut executor, 35..=35);
        assert_eq!(indexes(executor.conn()).len(), 2);
    }

    #[test]
    fn test_failed_transform_leaves_table_untouched() {
        let mut executor = SqliteExecutor::open_memory().unwrap();
        apply(&mut executor, 10..=10);

        // A stray temp table makes the v11 rebuild fail at its first step.
        executor
            .conn()
            .execute_batch("CREATE TABLE conversion_queue_temp (x TEXT);")
            .unwrap();
        assert!(executor.execute(&migrate(Transaction::new(), 11)).is_err());

        assert!(!columns(executor.conn()).contains(&"advertiser_public_key".to_string()));
    }
}
