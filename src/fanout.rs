//! Best-effort delivery of samples to every subscriber
//!
//! Each subscriber gets its own bounded queue. Delivery never waits: a full
//! queue loses that one sample, a closed queue is dropped from the set.
//! Ingestion is never held up by a slow or vanished consumer.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::types::TelemetrySample;

/// Subscriber set owned by the driver task.
#[derive(Debug, Default)]
pub struct Fanout {
    subscribers: Vec<mpsc::Sender<Arc<TelemetrySample>>>,
    dropped: u64,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber with a queue of `capacity` samples.
    pub fn subscribe(&mut self, capacity: usize) -> mpsc::Receiver<Arc<TelemetrySample>> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.add(tx);
        rx
    }

    /// Register the sending half of a channel created elsewhere.
    pub fn add(&mut self, subscriber: mpsc::Sender<Arc<TelemetrySample>>) {
        self.subscribers.push(subscriber);
        debug!(subscribers = self.subscribers.len(), "Subscriber added");
    }

    /// Offer a sample to every subscriber present right now.
    ///
    /// Returns how many subscribers accepted it.
    pub fn broadcast(&mut self, sample: Arc<TelemetrySample>) -> usize {
        let mut delivered = 0;
        let mut dropped = 0;

        self.subscribers.retain(|tx| match tx.try_send(Arc::clone(&sample)) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                dropped += 1;
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Subscriber closed, removing");
                false
            }
        });

        if dropped > 0 {
            self.dropped += dropped;
            trace!(dropped, "Slow subscribers skipped a sample");
        }
        delivered
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Samples skipped because a subscriber queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
