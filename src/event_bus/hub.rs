use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::stream;
use thiserror::Error;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tokio::time::timeout;

use super::event::FlowEvent;

/// Publishing into a hub nobody is subscribed to.
#[derive(Debug, Error)]
#[error("event hub has no subscribers")]
pub struct NoSubscribers;

/// Broadcast fan-out point for lifecycle events.
///
/// Every subscriber gets its own [`EventStream`]; slow subscribers lag and
/// their missed events are counted on the hub rather than blocking
/// producers.
#[derive(Debug)]
pub struct EventHub {
    sender: Sender<FlowEvent>,
    dropped_events: AtomicUsize,
    capacity: usize,
}

impl EventHub {
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Arc::new(Self {
            sender,
            dropped_events: AtomicUsize::new(0),
            capacity,
        })
    }

    pub fn publish(&self, event: FlowEvent) -> Result<(), NoSubscribers> {
        match self.sender.send(event) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(event)) => {
                drop(event);
                Err(NoSubscribers)
            }
        }
    }

    pub fn subscribe(self: &Arc<Self>) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
            hub: Arc::clone(self),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events subscribers have missed through lag.
    pub fn dropped(&self) -> usize {
        self.dropped_events.load(Ordering::Relaxed)
    }
}

/// One subscriber's view of the hub.
///
/// Offers awaiting ([`recv`](Self::recv)), polling
/// ([`try_recv`](Self::try_recv)), bounded waits
/// ([`next_timeout`](Self::next_timeout)), and conversion into either a
/// blocking iterator or a `futures` stream.
#[derive(Debug)]
pub struct EventStream {
    receiver: Receiver<FlowEvent>,
    hub: Arc<EventHub>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Result<FlowEvent, broadcast::error::RecvError> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                self.hub
                    .dropped_events
                    .fetch_add(missed as usize, Ordering::Relaxed);
                Err(broadcast::error::RecvError::Lagged(missed))
            }
            Err(err) => Err(err),
        }
    }

    pub fn try_recv(&mut self) -> Result<FlowEvent, broadcast::error::TryRecvError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(event),
            Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                self.hub
                    .dropped_events
                    .fetch_add(missed as usize, Ordering::Relaxed);
                Err(broadcast::error::TryRecvError::Lagged(missed))
            }
            Err(err) => Err(err),
        }
    }

    pub fn into_inner(self) -> Receiver<FlowEvent> {
        self.receiver
    }

    pub fn into_blocking_iter(self) -> BlockingEventIter {
        BlockingEventIter {
            receiver: self.receiver,
            hub: self.hub,
        }
    }

    pub fn into_async_stream(self) -> impl futures_util::stream::Stream<Item = FlowEvent> {
        stream::unfold(self, |mut stream| async move {
            loop {
                match stream.recv().await {
                    Ok(event) => return Some((event, stream)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }

    pub async fn next_timeout(&mut self, duration: Duration) -> Option<FlowEvent> {
        loop {
            match timeout(duration, self.recv()).await {
                Ok(Ok(event)) => return Some(event),
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => return None,
                Err(_) => return None,
            }
        }
    }
}

/// Iterator adapter for consuming events from synchronous code.
pub struct BlockingEventIter {
    receiver: Receiver<FlowEvent>,
    hub: Arc<EventHub>,
}

impl Iterator for BlockingEventIter {
    type Item = FlowEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.receiver.blocking_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    self.hub
                        .dropped_events
                        .fetch_add(missed as usize, Ordering::Relaxed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
