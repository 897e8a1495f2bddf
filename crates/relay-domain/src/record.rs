/// Decoded sensor payload: group key → nested field map, as published under
/// the telemetry topic hierarchy.
pub type SensorMessage = serde_json::Map<String, serde_json::Value>;

/// Flat record of destination slot → value, ready for the upload sink.
///
/// Contains only slots that were actually present in the source message; an
/// empty record is never enqueued.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputRecord {
    pub slots: serde_json::Map<String, serde_json::Value>,
}

impl OutputRecord {
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Queue element: an output record plus provenance used for log attribution.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedRecord {
    pub topic: String,
    pub received_at: chrono::DateTime<chrono::Utc>,
    pub record: OutputRecord,
}
