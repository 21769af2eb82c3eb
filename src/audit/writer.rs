use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::audit::sink::AccessLogSink;
use crate::model::access_log::{AccessLog, AccessResult};

/// Queues allow-records for a background worker to drain; writes
/// deny-records synchronously on the caller's task. Never returns an error
/// to the caller — a failure to persist an audit record is logged and
/// swallowed rather than failing the request it describes.
pub struct AccessLogWriter {
    sink: Arc<dyn AccessLogSink>,
    queue: Arc<Mutex<VecDeque<AccessLog>>>,
    notify: Arc<Notify>,
    capacity: usize,
}

impl AccessLogWriter {
    pub fn new(sink: Arc<dyn AccessLogSink>, capacity: usize) -> Self {
        let queue = Arc::new(Mutex::new(VecDeque::with_capacity(capacity)));
        let notify = Arc::new(Notify::new());
        tokio::spawn(Self::run(sink.clone(), queue.clone(), notify.clone()));
        Self { sink, queue, notify, capacity }
    }

    async fn run(sink: Arc<dyn AccessLogSink>, queue: Arc<Mutex<VecDeque<AccessLog>>>, notify: Arc<Notify>) {
        loop {
            notify.notified().await;
            Self::drain(&sink, &queue).await;
        }
    }

    async fn drain(sink: &Arc<dyn AccessLogSink>, queue: &Arc<Mutex<VecDeque<AccessLog>>>) {
        loop {
            let next = { queue.lock().pop_front() };
            let Some(log) = next else { break };
            if let Err(e) = sink.append(log).await {
                tracing::warn!(error = %e, "failed to write queued access log");
            }
        }
    }

    /// Record one decision. Denials are written before returning; allows are
    /// queued for the background worker and the oldest queued record is
    /// dropped if the queue is already at capacity.
    pub async fn record(&self, log: AccessLog) {
        match log.result {
            AccessResult::Denied => {
                if let Err(e) = self.sink.append(log).await {
                    tracing::error!(error = %e, "failed to write deny access log");
                }
            }
            AccessResult::Allowed => {
                let mut queue = self.queue.lock();
                if queue.len() >= self.capacity {
                    queue.pop_front();
                }
                queue.push_back(log);
                drop(queue);
                self.notify.notify_one();
            }
        }
    }

    /// Synchronously drain any queued allow-records. Used on shutdown and
    /// in tests that need deterministic visibility into the sink.
    pub async fn flush(&self) {
        Self::drain(&self.sink, &self.queue).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;

    struct RecordingSink {
        records: Mutex<Vec<AccessLog>>,
    }

    #[async_trait]
    impl AccessLogSink for RecordingSink {
        async fn append(&self, log: AccessLog) -> Result<()> {
            self.records.lock().push(log);
            Ok(())
        }
    }

    #[tokio::test]
    async fn deny_record_is_visible_immediately() {
        let sink = Arc::new(RecordingSink { records: Mutex::new(Vec::new()) });
        let writer = AccessLogWriter::new(sink.clone(), 4);
        writer
            .record(AccessLog::denied("u1", "collection:widgets", None, "collection:widgets:read", "no grant"))
            .await;
        assert_eq!(sink.records.lock().len(), 1);
    }

    #[tokio::test]
    async fn allow_queue_evicts_oldest_when_over_capacity() {
        let sink = Arc::new(RecordingSink { records: Mutex::new(Vec::new()) });
        let writer = AccessLogWriter::new(sink.clone(), 2);
        for i in 0..5 {
            writer
                .record(AccessLog::allowed(format!("u{i}"), "collection:widgets", None, "collection:widgets:read"))
                .await;
        }
        writer.flush().await;
        let seen = sink.records.lock();
        assert!(seen.len() <= 2);
    }
}
