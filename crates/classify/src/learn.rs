use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::store::{KeywordStore, MerchantStore, NewKeywordMapping, NewMerchant, StoreError};

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// One unit of learning work. Usage bumps ride the same queue as new
/// records so the pipeline never blocks on a store write.
#[derive(Debug, Clone)]
pub enum LearnEntry {
    Merchant(NewMerchant),
    Keyword(NewKeywordMapping),
    MerchantUsed(i64),
    KeywordUsed(i64),
}

enum Msg {
    Entry(LearnEntry),
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget writeback queue: a bounded channel drained by one
/// worker task. Failures are logged, never surfaced to classification.
pub struct LearnQueue {
    tx: mpsc::Sender<Msg>,
}

impl LearnQueue {
    pub fn spawn<K, M>(keywords: Arc<K>, merchants: Arc<M>, capacity: usize) -> Self
    where
        K: KeywordStore + 'static,
        M: MerchantStore + 'static,
    {
        let (tx, mut rx) = mpsc::channel(capacity);
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match msg {
                    Msg::Entry(entry) => apply(keywords.as_ref(), merchants.as_ref(), entry).await,
                    Msg::Flush(ack) => {
                        // Entries are processed in order, so everything
                        // enqueued before the flush has been applied.
                        let _ = ack.send(());
                    }
                }
            }
        });
        LearnQueue { tx }
    }

    /// Non-blocking enqueue. A full queue drops the entry with a
    /// warning; learning is best-effort.
    pub fn enqueue(&self, entry: LearnEntry) {
        if let Err(e) = self.tx.try_send(Msg::Entry(entry)) {
            warn!("learn queue full, dropping entry: {e}");
        }
    }

    /// Wait until the worker has applied everything enqueued so far.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Msg::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

async fn apply<K: KeywordStore, M: MerchantStore>(keywords: &K, merchants: &M, entry: LearnEntry) {
    match entry {
        LearnEntry::Merchant(merchant) => {
            let name = merchant.name.clone();
            match merchants.create(merchant).await {
                Ok(created) => debug!(merchant = %created.name, "learned merchant"),
                Err(StoreError::Duplicate(_)) => debug!(merchant = %name, "merchant already known"),
                Err(e) => warn!(merchant = %name, "failed to learn merchant: {e}"),
            }
        }
        LearnEntry::Keyword(mapping) => {
            let keyword = mapping.keyword.clone();
            match keywords.create(mapping).await {
                Ok(created) => debug!(keyword = %created.keyword, "learned keyword mapping"),
                Err(StoreError::Duplicate(_)) => debug!(keyword = %keyword, "already mapped"),
                Err(e) => warn!(keyword = %keyword, "failed to learn keyword: {e}"),
            }
        }
        LearnEntry::MerchantUsed(id) => {
            if let Err(e) = merchants.increment_usage(id).await {
                warn!(id, "failed to bump merchant usage: {e}");
            }
        }
        LearnEntry::KeywordUsed(id) => {
            if let Err(e) = keywords.increment_usage(id).await {
                warn!(id, "failed to bump keyword usage: {e}");
            }
        }
    }
}
