//! Typed multicast event streams.
//!
//! An [`EventSource`] is owned by whoever produces events; every call to
//! [`EventSource::events`] returns an independent [`EventStream`] that sees
//! each event fired after it was created. Dropping the stream unsubscribes.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

const CAPACITY: usize = 256;

/// Producer side.
pub struct EventSource<T: Clone> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone> EventSource<T> {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CAPACITY);
        Self { tx }
    }

    /// Deliver `value` to every live subscriber. Without subscribers the
    /// event is dropped.
    pub fn fire(&self, value: T) {
        let _ = self.tx.send(value);
    }

    pub fn events(&self) -> EventStream<T> {
        EventStream { first: None, rx: self.tx.subscribe() }
    }

    /// Like [`events`](Self::events), but `current` is yielded first.
    pub fn events_starting_with(&self, current: T) -> EventStream<T> {
        EventStream { first: Some(current), rx: self.tx.subscribe() }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// A cheap handle that can only subscribe. It does not keep the source
    /// alive: once the source is dropped its streams end.
    pub fn subscriber(&self) -> EventSubscriber<T> {
        EventSubscriber { tx: self.tx.downgrade() }
    }
}

impl<T: Clone> Default for EventSource<T> {
    fn default() -> Self { Self::new() }
}

/// Subscribe-only view of an [`EventSource`], safe to hand to other tasks.
#[derive(Clone)]
pub struct EventSubscriber<T: Clone> {
    tx: broadcast::WeakSender<T>,
}

impl<T: Clone> EventSubscriber<T> {
    /// Streams taken after the source is gone are already closed.
    pub fn events(&self) -> EventStream<T> {
        EventStream { first: None, rx: self.receiver() }
    }

    pub fn events_starting_with(&self, current: T) -> EventStream<T> {
        EventStream { first: Some(current), rx: self.receiver() }
    }

    fn receiver(&self) -> broadcast::Receiver<T> {
        match self.tx.upgrade() {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }
}

/// Consumer side.
pub struct EventStream<T: Clone> {
    first: Option<T>,
    rx:    broadcast::Receiver<T>,
}

impl<T: Clone> EventStream<T> {
    /// Wait for the next event. Returns `None` once the source is gone.
    pub async fn next(&mut self) -> Option<T> {
        if let Some(value) = self.first.take() {
            return Some(value);
        }
        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("[events] subscriber lagged, {n} events skipped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-delivered event, without waiting.
    pub fn try_next(&mut self) -> Option<T> {
        if let Some(value) = self.first.take() {
            return Some(value);
        }
        loop {
            match self.rx.try_recv() {
                Ok(value) => return Some(value),
                Err(TryRecvError::Lagged(n)) => {
                    tracing::warn!("[events] subscriber lagged, {n} events skipped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Everything delivered so far.
    pub fn drain(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
