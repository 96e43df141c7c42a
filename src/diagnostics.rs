//! Side channel for record-level defects.
//!
//! Invalid queue items are dropped rather than failing the surrounding
//! operation. Each drop is reported here so the defect stays observable.
//! Reporting returns nothing and must not influence control flow.

use std::sync::Mutex;

/// Where a defective record was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefectOrigin {
    /// Item refused before being bound into an insert.
    Encode,
    /// Row read from storage that does not decode to a valid item.
    Decode,
}

impl DefectOrigin {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Encode => "encode",
            Self::Decode => "decode",
        }
    }
}

/// A dropped record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defect {
    pub origin: DefectOrigin,
    pub table: &'static str,
    pub reason: String,
    /// Key of the offending record, when it had one.
    pub creative_instance_id: Option<String>,
}

/// Receiver for record-level defects.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, defect: &Defect);
}

/// Default sink: logs each defect as a warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, defect: &Defect) {
        tracing::warn!(
            origin = defect.origin.as_str(),
            table = defect.table,
            creative_instance_id = defect.creative_instance_id.as_deref().unwrap_or(""),
            reason = %defect.reason,
            "Dropped invalid conversion queue item"
        );
    }
}

/// Sink that keeps every defect in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    defects: Mutex<Vec<Defect>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the defects reported so far.
    #[must_use]
    pub fn defects(&self) -> Vec<Defect> {
        self.defects
            .lock()
            .map(|defects| defects.clone())
            .unwrap_or_default()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, defect: &Defect) {
        if let Ok(mut defects) = self.defects.lock() {
            defects.push(defect.clone());
        }
    }
}
