//! Event streaming for store changes, registration and task lifecycle
//!
//! A closed set of events fanned out over a broadcast channel. Consumers
//! subscribe to the kinds they care about.

use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Events emitted while a command line is processed
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A key was written to the store
    StoreSet { key: String, value: Value },
    /// A key was checked for a meaningful value
    StoreHas { key: String, present: bool },
    /// A key was read from the store
    StoreGet { key: String, value: Option<Value> },
    /// A key was removed from the store
    StoreDel { key: String },
    /// An updater was registered on the root application
    Register {
        name: String,
        fullname: String,
        path: PathBuf,
    },
    /// An updater is about to build a task list
    Run { updater: String, tasks: Vec<String> },
    TaskStart { updater: String, task: String },
    TaskStop {
        updater: String,
        task: String,
        duration: Duration,
    },
    TaskErr {
        updater: String,
        task: String,
        duration: Duration,
        error: String,
    },
    TaskNotFound { updater: String, task: String },
    /// The run is over; no further events follow
    Finished { ok: bool },
}

/// Discriminant of [`Event`], used to filter subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StoreSet,
    StoreHas,
    StoreGet,
    StoreDel,
    Register,
    Run,
    TaskStart,
    TaskStop,
    TaskErr,
    TaskNotFound,
    Finished,
}

impl EventKind {
    pub const STORE: [EventKind; 4] = [
        EventKind::StoreSet,
        EventKind::StoreHas,
        EventKind::StoreGet,
        EventKind::StoreDel,
    ];

    pub const TASK: [EventKind; 4] = [
        EventKind::TaskStart,
        EventKind::TaskStop,
        EventKind::TaskErr,
        EventKind::TaskNotFound,
    ];
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::StoreSet { .. } => EventKind::StoreSet,
            Event::StoreHas { .. } => EventKind::StoreHas,
            Event::StoreGet { .. } => EventKind::StoreGet,
            Event::StoreDel { .. } => EventKind::StoreDel,
            Event::Register { .. } => EventKind::Register,
            Event::Run { .. } => EventKind::Run,
            Event::TaskStart { .. } => EventKind::TaskStart,
            Event::TaskStop { .. } => EventKind::TaskStop,
            Event::TaskErr { .. } => EventKind::TaskErr,
            Event::TaskNotFound { .. } => EventKind::TaskNotFound,
            Event::Finished { .. } => EventKind::Finished,
        }
    }

    /// True for events that make the process exit non-zero
    pub fn is_failure(&self) -> bool {
        matches!(self, Event::TaskErr { .. } | Event::TaskNotFound { .. })
    }
}

/// Broadcast-based event bus shared by every component of a run
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: Event) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    /// Subscribe to the given event kinds only
    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            kinds: Some(kinds.to_vec()),
        }
    }

    /// Subscribe to every event
    pub fn subscribe_all(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            kinds: None,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// A filtered view over the event stream
pub struct Subscription {
    rx: broadcast::Receiver<Event>,
    kinds: Option<Vec<EventKind>>,
}

impl Subscription {
    fn wants(&self, event: &Event) -> bool {
        match &self.kinds {
            Some(kinds) => kinds.contains(&event.kind()),
            None => true,
        }
    }

    /// Wait for the next matching event; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    log::warn!("Event subscriber lagged, {} events dropped", n);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already queued, without waiting
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(n)) => {
                    log::warn!("Event subscriber lagged, {} events dropped", n);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// All matching events queued so far
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_filters_by_kind() {
        let bus = EventBus::new(16);
        let mut store_events = bus.subscribe(&EventKind::STORE);
        let mut all = bus.subscribe_all();

        bus.emit(Event::TaskStart {
            updater: "base".into(),
            task: "default".into(),
        });
        bus.emit(Event::StoreDel { key: "a".into() });

        assert_eq!(store_events.drain(), vec![Event::StoreDel { key: "a".into() }]);
        assert_eq!(all.drain().len(), 2);
    }

    #[test]
    fn test_recv_returns_none_when_closed() {
        tokio_test::block_on(async {
            let bus = EventBus::new(4);
            let mut sub = bus.subscribe(&[EventKind::Finished]);
            bus.emit(Event::Finished { ok: true });
            drop(bus);

            assert_eq!(sub.recv().await, Some(Event::Finished { ok: true }));
            assert_eq!(sub.recv().await, None);
        });
    }

    #[test]
    fn test_bus_is_debug() {
        let bus = EventBus::new(4);
        assert!(format!("{:?}", bus).starts_with("EventBus"));
    }

    #[test]
    fn test_failure_events() {
        let err = Event::TaskErr {
            updater: "a".into(),
            task: "t".into(),
            duration: Duration::from_millis(3),
            error: "boom".into(),
        };
        assert!(err.is_failure());
        assert!(!Event::Finished { ok: false }.is_failure());
    }
}
