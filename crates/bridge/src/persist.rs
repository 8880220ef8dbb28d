use std::sync::Arc;

use shared::domain::ChatId;
use storage::{store_timestamp, KeyValueStore};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tracing::{debug, warn};

#[derive(Debug)]
struct TimestampUpdate {
    session: String,
    chat_id: ChatId,
    timestamp: i64,
}

/// Queue in front of the persistence store. Recording never waits on the
/// store; a single background task drains the queue in order.
#[derive(Clone)]
pub struct TimestampWriter {
    tx: mpsc::Sender<TimestampUpdate>,
}

impl TimestampWriter {
    /// The task ends once every writer clone is dropped and the queue is empty.
    pub fn spawn(store: Arc<dyn KeyValueStore>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(drain(store, rx));
        (Self { tx }, task)
    }

    pub fn record(&self, session: &str, chat_id: &ChatId, timestamp: i64) {
        let update = TimestampUpdate {
            session: session.to_string(),
            chat_id: chat_id.clone(),
            timestamp,
        };

        match self.tx.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(update)) => warn!(
                session = %update.session,
                chat_id = %update.chat_id,
                timestamp = update.timestamp,
                "persist: queue full, dropping timestamp update"
            ),
            Err(TrySendError::Closed(update)) => warn!(
                session = %update.session,
                chat_id = %update.chat_id,
                "persist: writer stopped, dropping timestamp update"
            ),
        }
    }
}

async fn drain(store: Arc<dyn KeyValueStore>, mut rx: mpsc::Receiver<TimestampUpdate>) {
    while let Some(update) = rx.recv().await {
        if let Err(error) = store_timestamp(
            store.as_ref(),
            &update.session,
            &update.chat_id,
            update.timestamp,
        )
        .await
        {
            warn!(
                session = %update.session,
                chat_id = %update.chat_id,
                error = %format!("{error:#}"),
                "persist: failed to save timestamp"
            );
        }
    }
    debug!("persist: writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use storage::{load_timestamps, MemoryStore};

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }
        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("disk full"))
        }
        async fn scan_prefix(&self, _prefix: &str) -> Result<Vec<(String, String)>> {
            Ok(Vec::new())
        }
        async fn remove_prefix(&self, _prefix: &str) -> Result<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn writes_in_order_and_stops_when_dropped() {
        let store = Arc::new(MemoryStore::new());
        let (writer, task) = TimestampWriter::spawn(store.clone(), 16);
        let chat = ChatId::new("120363000000000001@g.us");

        writer.record("me", &chat, 10);
        writer.record("me", &chat, 20);
        drop(writer);
        task.await.expect("writer task");

        let timestamps = load_timestamps(store.as_ref(), "me").await.expect("load");
        assert_eq!(timestamps.get(&chat), Some(&20));
    }

    #[tokio::test]
    async fn store_failures_do_not_stop_the_writer() {
        let (writer, task) = TimestampWriter::spawn(Arc::new(BrokenStore), 4);
        writer.record("me", &ChatId::new("a@g.us"), 1);
        writer.record("me", &ChatId::new("b@g.us"), 2);
        drop(writer);
        task.await.expect("writer survives store errors");
    }

    #[tokio::test]
    async fn recording_after_shutdown_is_harmless() {
        let (writer, task) = TimestampWriter::spawn(Arc::new(MemoryStore::new()), 1);
        task.abort();
        let _ = task.await;
        writer.record("me", &ChatId::new("a@g.us"), 1);
    }
}
