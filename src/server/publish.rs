//! Background write-back of processed artifacts.
//!
//! Successful GET responses return to the client before the processed bytes
//! reach the object store; the upload runs on a bounded background queue.
//! When the queue is full the write-back is dropped with a warning rather
//! than blocking the response path, and pending jobs are dropped on
//! shutdown. The local cache is populated synchronously by [`Source::put`],
//! so same-process reads hit immediately either way.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::warn;

use crate::source::{ObjectStore, Source};

/// Default queue depth for pending write-backs.
pub const DEFAULT_PUBLISH_CAPACITY: usize = 64;

struct PublishJob<S> {
    source: Arc<Source<S>>,
    key: String,
    data: Bytes,
    content_type: &'static str,
}

/// Bounded queue of asynchronous publishes, drained by one worker task.
pub struct PublishQueue<S> {
    tx: mpsc::Sender<PublishJob<S>>,
}

impl<S> Clone for PublishQueue<S> {
    fn clone(&self) -> Self {
        PublishQueue {
            tx: self.tx.clone(),
        }
    }
}

impl<S: ObjectStore> PublishQueue<S> {
    /// Start the queue and its worker task.
    pub fn new(capacity: usize) -> PublishQueue<S> {
        let (tx, mut rx) = mpsc::channel::<PublishJob<S>>(capacity);

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if let Err(e) = job.source.put(&job.key, job.data, job.content_type).await {
                    // Failures after a successful response are never
                    // surfaced to the client.
                    warn!("background publish of '{}' failed: {}", job.key, e);
                }
            }
        });

        PublishQueue { tx }
    }

    /// Queue a publish, dropping it with a warning when the queue is full.
    pub fn enqueue(
        &self,
        source: Arc<Source<S>>,
        key: String,
        data: Bytes,
        content_type: &'static str,
    ) {
        let job = PublishJob {
            source,
            key: key.clone(),
            data,
            content_type,
        };

        if self.tx.try_send(job).is_err() {
            warn!("publish queue full, dropping write-back for '{}'", key);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
