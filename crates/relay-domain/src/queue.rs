use tokio::sync::mpsc;
use tracing::warn;

use crate::record::QueuedRecord;

/// Create the relay queue: an unbounded FIFO between the subscription
/// handler (producer side) and the uplink worker (consumer side).
pub fn record_queue() -> (RecordQueue, RecordQueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RecordQueue { tx }, RecordQueueReceiver { rx })
}

/// Producer handle. Cloneable; `enqueue` never blocks the caller.
#[derive(Clone)]
pub struct RecordQueue {
    tx: mpsc::UnboundedSender<QueuedRecord>,
}

impl RecordQueue {
    /// Push a record onto the queue. Only fails if the consumer half is
    /// gone, in which case the record is dropped with a log entry.
    pub fn enqueue(&self, queued: QueuedRecord) {
        if let Err(err) = self.tx.send(queued) {
            warn!(topic = %err.0.topic, "relay queue closed, dropping record");
        }
    }
}

/// Consumer handle, held by the single uplink worker.
pub struct RecordQueueReceiver {
    rx: mpsc::UnboundedReceiver<QueuedRecord>,
}

impl RecordQueueReceiver {
    /// Wait for the next record in FIFO order. Returns `None` once every
    /// producer handle has been dropped and the queue is drained.
    pub async fn dequeue(&mut self) -> Option<QueuedRecord> {
        self.rx.recv().await
    }
}
