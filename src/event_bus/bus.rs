use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{sync::oneshot, task};

use super::event::FlowEvent;
use super::hub::{EventHub, EventStream};
use super::sink::{EventSink, StdOutSink};

const DEFAULT_HUB_CAPACITY: usize = 1024;

/// Receives events from executors and broadcasts them to sinks and
/// subscribers.
///
/// Producers hold cheap clones of the flume sender; a background listener
/// task drains the channel, hands each event to every registered
/// [`EventSink`], and republishes it into the broadcast [`EventHub`] for
/// [`EventStream`] subscribers.
pub struct EventBus {
    sinks: Arc<Mutex<Vec<Box<dyn EventSink>>>>,
    event_channel: (flume::Sender<FlowEvent>, flume::Receiver<FlowEvent>),
    hub: Arc<EventHub>,
    listener: Arc<Mutex<Option<ListenerState>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_sink(StdOutSink::default())
    }
}

impl EventBus {
    /// Create an EventBus with a single sink.
    pub fn with_sink<T>(sink: T) -> Self
    where
        T: EventSink + 'static,
    {
        Self::with_sinks(vec![Box::new(sink)])
    }

    /// Create an EventBus with multiple sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self::with_sinks_and_capacity(sinks, DEFAULT_HUB_CAPACITY)
    }

    /// Create an EventBus with explicit subscriber buffer capacity.
    pub fn with_sinks_and_capacity(sinks: Vec<Box<dyn EventSink>>, capacity: usize) -> Self {
        Self {
            sinks: Arc::new(Mutex::new(sinks)),
            event_channel: flume::unbounded(),
            hub: EventHub::new(capacity),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Dynamically add a sink (useful for per-request streaming).
    ///
    /// # Example
    /// ```no_run
    /// use tokio::sync::mpsc;
    /// use loomflow::event_bus::{ChannelSink, EventBus};
    ///
    /// let bus = EventBus::default();
    /// bus.listen_for_events();
    ///
    /// let (tx, rx) = mpsc::unbounded_channel();
    /// bus.add_sink(ChannelSink::new(tx));
    /// // Now events go to both stdout and the channel
    /// ```
    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) {
        self.sinks.lock().push(Box::new(sink));
    }

    /// Get a clone of the sender side so producers can emit events.
    pub fn get_sender(&self) -> flume::Sender<FlowEvent> {
        self.event_channel.0.clone()
    }

    /// Subscribe to the broadcast side of the bus.
    pub fn subscribe(&self) -> EventStream {
        self.hub.subscribe()
    }

    /// The broadcast hub behind this bus, for lag accounting and direct
    /// publication.
    pub fn hub(&self) -> Arc<EventHub> {
        Arc::clone(&self.hub)
    }

    /// Spawn a background task that listens for events and broadcasts to all
    /// sinks and subscribers. Idempotent: calling multiple times has no effect.
    pub fn listen_for_events(&self) {
        let mut guard = self.listener.lock();
        if guard.is_some() {
            return; // Already listening
        }

        let receiver_clone = self.event_channel.1.clone();
        let sinks = self.sinks.clone();
        let hub = Arc::clone(&self.hub);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        // Stop acts as a flush: deliver whatever was already
                        // queued before shutting down.
                        while let Ok(event) = receiver_clone.try_recv() {
                            deliver(&sinks, &hub, event);
                        }
                        break;
                    }
                    recv = receiver_clone.recv_async() => match recv {
                        Err(e) => {
                            tracing::error!(error = %e, "event bus receiver closed");
                            break;
                        }
                        Ok(event) => deliver(&sinks, &hub, event),
                    }
                }
            }
        });

        *guard = Some(ListenerState {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the background listener task.
    pub async fn stop_listener(&self) {
        let state = {
            let mut guard = self.listener.lock();
            guard.take()
        };
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Some(state) = self.listener.lock().take() {
            let _ = state.shutdown_tx.send(());
            state.handle.abort();
        }
    }
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}

fn deliver(sinks: &Mutex<Vec<Box<dyn EventSink>>>, hub: &EventHub, event: FlowEvent) {
    {
        let mut guard = sinks.lock();
        for sink in guard.iter_mut() {
            if let Err(e) = sink.handle(&event) {
                tracing::warn!(error = %e, "event sink error");
            }
        }
    }
    // Publish failure only means nobody is subscribed.
    let _ = hub.publish(event);
}
