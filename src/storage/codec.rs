//! Record codec for the `conversion_queue` table.
//!
//! Column order is positional and shared by every `INSERT` and `SELECT`
//! the repository issues; [`COLUMNS`] is the single source for it.

use crate::diagnostics::{Defect, DefectOrigin, DiagnosticSink};
use crate::model::{AdType, ConversionActionType, ConversionQueueItem, VerifiableConversion};
use crate::storage::time::{from_storage_timestamp, to_storage_timestamp_or_null};
use crate::storage::transaction::{
    column_bool, column_int64, column_string, ColumnType,
};
use rusqlite::types::Value;

pub const TABLE_NAME: &str = "conversion_queue";

/// Bound/selected columns, in codec order.
pub const COLUMNS: [&str; 11] = [
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
];

/// Column types matching [`COLUMNS`].
pub const RECORD_BINDINGS: [ColumnType; 11] = [
    ColumnType::Text,
    ColumnType::Text,
    ColumnType::Text,
    ColumnType::Text,
    ColumnType::Text,
    ColumnType::Text,
    ColumnType::Text,
    ColumnType::Text,
    ColumnType::Text,
    ColumnType::Int64,
    ColumnType::Bool,
];

/// Comma-separated [`COLUMNS`] for SQL.
#[must_use]
pub fn column_list() -> String {
    COLUMNS.join(", ")
}

/// Encode an item into its column values.
///
/// Invalid items are refused and reported to `sink`.
pub fn encode(item: &ConversionQueueItem, sink: &dyn DiagnosticSink) -> Option<Vec<Value>> {
    if let Some(reason) = item.validation_failure() {
        sink.report(&Defect {
            origin: DefectOrigin::Encode,
            table: TABLE_NAME,
            reason: reason.to_string(),
            creative_instance_id: non_empty(&item.creative_instance_id),
        });
        return None;
    }

    let (verifiable_id, verifiable_key) = item
        .verifiable
        .as_ref()
        .map_or((String::new(), String::new()), |v| {
            (v.id.clone(), v.advertiser_public_key_base64.clone())
        });

    Some(vec![
        Value::Text(item.ad_type.as_str().to_string()),
        Value::Text(item.campaign_id.clone()),
        Value::Text(item.creative_set_id.clone()),
        Value::Text(item.creative_instance_id.clone()),
        Value::Text(item.advertiser_id.clone()),
        Value::Text(item.segment.clone()),
        Value::Text(item.action_type.as_str().to_string()),
        Value::Text(verifiable_id),
        Value::Text(verifiable_key),
        Value::Integer(to_storage_timestamp_or_null(item.process_at)),
        Value::Integer(i64::from(item.was_processed)),
    ])
}

/// Decode a row selected in [`COLUMNS`] order.
///
/// Rows that do not form a valid item are reported to `sink` and yield `None`.
pub fn decode(record: &[Value], sink: &dyn DiagnosticSink) -> Option<ConversionQueueItem> {
    let creative_instance_id = column_string(record, 3);

    let report = |reason: String| {
        sink.report(&Defect {
            origin: DefectOrigin::Decode,
            table: TABLE_NAME,
            reason,
            creative_instance_id: non_empty(&creative_instance_id),
        });
    };

    if record.len() != COLUMNS.len() {
        report(format!(
            "expected {} columns, found {}",
            COLUMNS.len(),
            record.len()
        ));
        return None;
    }

    let action_type_value = column_string(record, 6);
    let Some(action_type) = ConversionActionType::parse(&action_type_value) else {
        report(format!("unknown conversion action type '{action_type_value}'"));
        return None;
    };

    let verifiable = VerifiableConversion {
        id: column_string(record, 7),
        advertiser_public_key_base64: column_string(record, 8),
    };

    let item = ConversionQueueItem {
        ad_type: AdType::from_str_lossy(&column_string(record, 0)),
        campaign_id: column_string(record, 1),
        creative_set_id: column_string(record, 2),
        creative_instance_id: creative_instance_id.clone(),
        advertiser_id: column_string(record, 4),
        segment: column_string(record, 5),
        action_type,
        verifiable: verifiable.is_valid().then_some(verifiable),
        process_at: from_storage_timestamp(column_int64(record, 9)),
        was_processed: column_bool(record, 10),
    };

    if let Some(reason) = item.validation_failure() {
        report(reason.to_string());
        return None;
    }

    Some(item)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
