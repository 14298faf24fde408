//! Fan-out of monitor events to any number of subscribers.
//!
//! Built on a bounded `tokio::sync::broadcast` ring: publishing never waits
//! for consumers. A subscriber that falls behind loses its oldest undelivered
//! events and the loss is counted, both per subscription and bus-wide.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::Stream;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{trace, warn};

use super::MonitorEvent;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Invalid capacity (must be at least 1)")]
    InvalidCapacity,
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MonitorEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    /// Creates a bus where each subscriber buffers at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Result<Self, EventError> {
        if capacity == 0 {
            return Err(EventError::InvalidCapacity);
        }
        let (tx, _) = broadcast::channel(capacity);
        Ok(Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Publishes to every current subscriber. Returns how many received it;
    /// zero subscribers is not an error.
    #[inline]
    pub fn publish(&self, event: MonitorEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!("No subscribers for monitor event");
                0
            }
        }
    }

    /// Attaches a subscriber that sees events published from now on.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            dropped: 0,
            bus_dropped: Arc::clone(&self.dropped),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Events lost to slow subscribers across all subscriptions.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Ordered, at-most-once view of the bus. Dropping it unsubscribes.
pub struct Subscription {
    rx: broadcast::Receiver<MonitorEvent>,
    dropped: u64,
    bus_dropped: Arc<AtomicU64>,
}

impl Subscription {
    /// Waits for the next event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<MonitorEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv). `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<MonitorEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Events this subscriber missed because it fell behind.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn into_stream(self) -> impl Stream<Item = MonitorEvent> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            let event = sub.recv().await?;
            Some((event, sub))
        })
    }

    fn record_lag(&mut self, skipped: u64) {
        warn!(skipped, "Subscriber lagged, oldest events dropped");
        self.dropped += skipped;
        self.bus_dropped.fetch_add(skipped, Ordering::Relaxed);
    }
}
