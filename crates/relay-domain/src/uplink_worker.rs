use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::queue::RecordQueueReceiver;
use crate::sink::RecordSink;

/// The single long-lived upload task.
///
/// Dequeues one record at a time, submits it to the sink, and waits the
/// quiescence interval before the next dequeue. The fixed wait applies
/// regardless of submission outcome and caps the submission rate at one
/// record per interval. A failed submission drops the record after the one
/// attempt; it never terminates the loop.
pub struct UplinkWorker {
    queue: RecordQueueReceiver,
    sink: Arc<dyn RecordSink>,
    interval: Duration,
}

impl UplinkWorker {
    pub fn new(queue: RecordQueueReceiver, sink: Arc<dyn RecordSink>, interval: Duration) -> Self {
        Self {
            queue,
            sink,
            interval,
        }
    }

    /// Run until cancelled or until the queue closes. Cancellation is
    /// observed at the dequeue point and during the cooldown wait.
    pub async fn run(mut self, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!(interval_secs = self.interval.as_secs(), "starting uplink worker");

        loop {
            let queued = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, stopping uplink worker");
                    break;
                }
                queued = self.queue.dequeue() => match queued {
                    Some(queued) => queued,
                    None => {
                        info!("relay queue closed, stopping uplink worker");
                        break;
                    }
                },
            };

            let queued_ms = (chrono::Utc::now() - queued.received_at).num_milliseconds();
            match self.sink.submit(&queued.record).await {
                Ok(()) => info!(
                    topic = %queued.topic,
                    slot_count = queued.record.len(),
                    queued_ms,
                    "record submitted"
                ),
                Err(err) => warn!(
                    topic = %queued.topic,
                    error = %err,
                    "submission failed, dropping record"
                ),
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("shutdown requested during cooldown, stopping uplink worker");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::queue::record_queue;
    use crate::record::{OutputRecord, QueuedRecord};
    use crate::sink::{MockRecordSink, RecordSink};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Sink that records the (paused) clock at each submission.
    #[derive(Default)]
    struct RecordingSink {
        submissions: Mutex<Vec<(tokio::time::Instant, OutputRecord)>>,
    }

    #[async_trait]
    impl RecordSink for RecordingSink {
        async fn submit(&self, record: &OutputRecord) -> crate::error::RelayResult<()> {
            self.submissions
                .lock()
                .unwrap()
                .push((tokio::time::Instant::now(), record.clone()));
            Ok(())
        }
    }

    fn queued(value: i64) -> QueuedRecord {
        let mut record = OutputRecord::default();
        record.slots.insert("field1".to_string(), value.into());
        QueuedRecord {
            topic: "tele/device/SENSOR".to_string(),
            received_at: chrono::Utc::now(),
            record,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_submissions_are_spaced_by_the_interval() {
        let (queue, rx) = record_queue();
        for i in 0..3 {
            queue.enqueue(queued(i));
        }
        drop(queue);

        let sink = Arc::new(RecordingSink::default());
        let worker = UplinkWorker::new(rx, sink.clone(), Duration::from_secs(15));
        worker.run(CancellationToken::new()).await.unwrap();

        let submissions = sink.submissions.lock().unwrap();
        assert_eq!(submissions.len(), 3);
        for pair in submissions.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= Duration::from_secs(15));
        }
        // FIFO order survives the drain.
        for (i, (_, record)) in submissions.iter().enumerate() {
            assert_eq!(record.slots["field1"], serde_json::json!(i as i64));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_failure_does_not_stop_the_loop() {
        let (queue, rx) = record_queue();
        queue.enqueue(queued(1));
        queue.enqueue(queued(2));
        drop(queue);

        let mut sink = MockRecordSink::new();
        let mut seq = mockall::Sequence::new();
        sink.expect_submit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(RelayError::Submission("endpoint rejected".to_string())));
        sink.expect_submit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let worker = UplinkWorker::new(rx, Arc::new(sink), Duration::from_secs(15));
        worker.run(CancellationToken::new()).await.unwrap();
        // MockRecordSink verifies on drop that the second record was still
        // submitted after the failed attempt.
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_the_worker_before_submitting() {
        let (queue, rx) = record_queue();
        queue.enqueue(queued(1));

        let shutdown = CancellationToken::new();
        shutdown.cancel();

        // No expectations: any submit call fails the test.
        let sink = MockRecordSink::new();
        let worker = UplinkWorker::new(rx, Arc::new(sink), Duration::from_secs(15));
        worker.run(shutdown).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_cooldown_stops_promptly() {
        let (queue, rx) = record_queue();
        queue.enqueue(queued(1));
        queue.enqueue(queued(2));

        let shutdown = CancellationToken::new();
        let sink = Arc::new(RecordingSink::default());
        let worker = UplinkWorker::new(rx, sink.clone(), Duration::from_secs(15));

        let handle = tokio::spawn(worker.run(shutdown.clone()));

        // Let the worker submit the first record and enter its cooldown.
        while sink.submissions.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        shutdown.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(sink.submissions.lock().unwrap().len(), 1);
    }
}
