//! Cross-thread event aggregation.
//!
//! Worker threads publish progress events from inside the expectation step;
//! the orchestrator thread drains them with [`EventDispatcher::process_events`],
//! invoking every registered listener on itself. Listeners therefore never
//! run concurrently with each other, never run on a worker thread, and never
//! block a `publish` call.
//!
//! Events published from one thread are replayed in emission order. No order
//! is promised between events published from different threads.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Mutex;

/// Progress notification emitted during training.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// One document finished its expectation step.
    ExpectationProgress { likelihood: f64 },
    /// A maximization flush cycle completed, carrying the summed
    /// per-document log-likelihood of the flushed window.
    MaximizationProgress { likelihood: f64 },
    /// An epoch finished, carrying the total log-likelihood of the pass.
    EpochProgress { epoch: usize, likelihood: f64 },
}

impl Event {
    /// Stable string tag identifying the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ExpectationProgress { .. } => "expectation_progress",
            Event::MaximizationProgress { .. } => "maximization_progress",
            Event::EpochProgress { .. } => "epoch_progress",
        }
    }
}

type Listener = Box<dyn FnMut(&Event) + Send>;

/// Aggregates events from any thread and replays them on the draining thread.
///
/// Backed by an unbounded channel: `publish` appends without blocking and
/// without running listeners; `process_events` swaps the queue out and
/// replays it in arrival order.
pub struct EventDispatcher {
    tx: Sender<Event>,
    rx: Receiver<Event>,
    listeners: Mutex<Vec<Listener>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Queues an event. Callable from any thread.
    pub fn publish(&self, event: Event) {
        // The receiver lives as long as `self`, so the send cannot fail.
        let _ = self.tx.send(event);
    }

    /// Registers a listener invoked for every processed event.
    pub fn add_listener(&self, listener: impl FnMut(&Event) + Send + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Box::new(listener));
    }

    /// Drains every queued event and replays it to the listeners, in arrival
    /// order, on the calling thread. Intended to be called from the
    /// orchestrator thread only. Returns the number of events processed.
    pub fn process_events(&self) -> usize {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut processed = 0;
        while let Ok(event) = self.rx.try_recv() {
            for listener in listeners.iter_mut() {
                listener(&event);
            }
            processed += 1;
        }
        processed
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
