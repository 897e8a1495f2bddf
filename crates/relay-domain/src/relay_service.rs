use tracing::{debug, warn};

use crate::decode::decode;
use crate::mapping::{map_fields, FieldMapping};
use crate::queue::RecordQueue;
use crate::record::QueuedRecord;

/// Subscription handler: decodes each delivered message, applies the field
/// mapping, and enqueues non-empty records.
///
/// Runs on the transport's delivery context, so `handle_message` performs no
/// blocking work; the enqueue is a plain channel send.
pub struct RelayService {
    mapping: FieldMapping,
    queue: RecordQueue,
}

impl RelayService {
    pub fn new(mapping: FieldMapping, queue: RecordQueue) -> Self {
        Self { mapping, queue }
    }

    /// Handle one delivered message. Decode failures are expected under
    /// malformed upstream data and only logged; they never propagate.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) {
        let message = match decode(payload) {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    topic = %topic,
                    payload_size = payload.len(),
                    error = %err,
                    "dropping undecodable payload"
                );
                return;
            }
        };

        let record = map_fields(&message, &self.mapping);
        if record.is_empty() {
            debug!(topic = %topic, "no mapped fields in payload, nothing to relay");
            return;
        }

        debug!(topic = %topic, slot_count = record.len(), "enqueueing record");
        self.queue.enqueue(QueuedRecord {
            topic: topic.to_string(),
            received_at: chrono::Utc::now(),
            record,
        });
    }
}
