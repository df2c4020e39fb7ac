//! Priority event bus
//!
//! Queued events live in a binary heap ordered by (priority, publish
//! sequence): urgency first, stable FIFO within a level. Immediate events
//! skip the heap entirely and dispatch synchronously at publish time.
//!
//! Handlers publish through an [`EventWriter`] rather than the bus itself;
//! the bus merges writer output once the current event finishes. An
//! Immediate event written mid-dispatch therefore runs right after the
//! event that produced it, never re-entrantly inside it, and a handler can
//! never mutate the subscriber table it is being called from.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, VecDeque};

use ahash::AHashMap;
use serde::Serialize;

use crate::events::event::{Event, EventKind, EventPriority};

/// Handle returned by subscribe, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Outcome of one handler invocation; errors are isolated and counted
pub type HandlerResult = Result<(), String>;

type EventHandler = Box<dyn FnMut(&Event, &mut EventWriter) -> HandlerResult>;

/// Publish access handed to handlers during dispatch
#[derive(Default)]
pub struct EventWriter {
    pending: Vec<Event>,
}

impl EventWriter {
    /// Queue an event for publication after the current dispatch completes
    pub fn publish(&mut self, event: Event) {
        self.pending.push(event);
    }
}

/// Heap entry: sequence number breaks priority ties in publish order
struct QueuedEvent {
    seq: u64,
    event: Event,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.event.priority == other.event.priority && self.seq == other.seq
    }
}

impl Eq for QueuedEvent {}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap: lowest (priority, seq) pops first
        other
            .event
            .priority
            .cmp(&self.event.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dispatch counters and queue depths
#[derive(Debug, Clone, Default, Serialize)]
pub struct BusStats {
    pub events_published: u64,
    pub events_dispatched: u64,
    pub handlers_invoked: u64,
    pub handler_errors: u64,
    pub queue_depth: usize,
    pub immediate_depth: usize,
    pub subscribers: BTreeMap<EventKind, usize>,
}

/// Priority publish/subscribe dispatcher
#[derive(Default)]
pub struct EventBus {
    subscribers: AHashMap<EventKind, Vec<(SubscriptionId, EventHandler)>>,
    queue: BinaryHeap<QueuedEvent>,
    immediate: VecDeque<Event>,
    next_seq: u64,
    next_subscription: u64,
    published: u64,
    dispatched: u64,
    handlers_invoked: u64,
    handler_errors: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind
    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event, &mut EventWriter) -> HandlerResult + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers
            .entry(kind)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Remove a handler; false when the id is not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let mut found = false;
        self.subscribers.retain(|_, handlers| {
            let before = handlers.len();
            handlers.retain(|(sub, _)| *sub != id);
            found |= handlers.len() != before;
            !handlers.is_empty()
        });
        found
    }

    /// Publish an event
    ///
    /// Immediate priority dispatches before this call returns, along with
    /// any chain of immediates the handlers produce. Everything else waits
    /// in the heap for [`process_events`](Self::process_events).
    pub fn publish(&mut self, event: Event) {
        self.published += 1;
        if event.priority == EventPriority::Immediate {
            self.immediate.push_back(event);
            self.drain_immediate();
        } else {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.queue.push(QueuedEvent { seq, event });
        }
    }

    /// Dispatch queued events, up to `max_per_tick` heap entries
    ///
    /// Immediate events produced along the way do not count against the
    /// budget and always run before the next heap entry. Returns the total
    /// number of events dispatched.
    pub fn process_events(&mut self, max_per_tick: usize) -> usize {
        let mut dispatched = self.drain_immediate();

        let mut popped = 0;
        while popped < max_per_tick {
            let Some(next) = self.queue.pop() else {
                break;
            };
            self.dispatch(next.event);
            popped += 1;
            dispatched += 1 + self.drain_immediate();
        }

        dispatched
    }

    /// Counters and queue depths
    pub fn stats(&self) -> BusStats {
        BusStats {
            events_published: self.published,
            events_dispatched: self.dispatched,
            handlers_invoked: self.handlers_invoked,
            handler_errors: self.handler_errors,
            queue_depth: self.queue.len(),
            immediate_depth: self.immediate.len(),
            subscribers: self
                .subscribers
                .iter()
                .map(|(kind, handlers)| (*kind, handlers.len()))
                .collect(),
        }
    }

    /// Drop all queued events without dispatching them
    pub fn clear(&mut self) {
        self.queue.clear();
        self.immediate.clear();
    }

    /// Run the immediate queue to empty, returning events dispatched
    fn drain_immediate(&mut self) -> usize {
        let mut count = 0;
        while let Some(event) = self.immediate.pop_front() {
            self.dispatch(event);
            count += 1;
        }
        count
    }

    /// Deliver one event to its subscribers and merge their output
    fn dispatch(&mut self, mut event: Event) {
        let kind = event.kind();
        let mut writer = EventWriter::default();

        if let Some(handlers) = self.subscribers.get_mut(&kind) {
            for (id, handler) in handlers.iter_mut() {
                self.handlers_invoked += 1;
                if let Err(err) = handler(&event, &mut writer) {
                    self.handler_errors += 1;
                    tracing::warn!(
                        kind = ?kind,
                        subscription = id.0,
                        error = %err,
                        "event handler failed"
                    );
                }
            }
        }

        event.handled = true;
        self.dispatched += 1;

        // Writer output lands after the event it was written from;
        // immediates go to the synchronous queue, the rest to the heap.
        for produced in writer.pending {
            if produced.priority == EventPriority::Immediate {
                self.immediate.push_back(produced);
                self.published += 1;
            } else {
                self.published += 1;
                let seq = self.next_seq;
                self.next_seq += 1;
                self.queue.push(QueuedEvent {
                    seq,
                    event: produced,
                });
            }
        }
    }
}
