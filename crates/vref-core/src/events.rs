//! Change notifications for the settings UI
//!
//! The engine and controller publish these after anything the UI renders
//! has changed, so it can redraw its selection table without polling.

use crate::types::StreamId;

/// Events published to UI subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum ReferencingEvent {
    /// Stream topology changed; matrices were rebuilt or removed
    TopologyChanged {
        streams: Vec<StreamId>,
        removed: Vec<StreamId>,
    },
    /// Selections of one stream changed (cell edit, row fill, preset)
    SelectionChanged { stream: StreamId },
    /// Global gain changed
    GlobalGainChanged { gain: f32 },
    /// A settings document was restored
    SettingsRestored { streams: Vec<StreamId> },
}

/// Default bound of each subscriber's event channel
pub const EVENT_CAPACITY: usize = 256;

/// Fan-out of [`ReferencingEvent`]s to every subscriber
///
/// Each subscriber gets its own bounded channel. Publishing never blocks:
/// a subscriber that has `capacity` unread events misses newer ones until
/// it catches up, and subscribers whose receiver was dropped are removed
/// on the next publish.
pub struct EventBus {
    capacity: usize,
    subscribers: Vec<crossbeam::channel::Sender<ReferencingEvent>>,
}

impl EventBus {
    /// Create an event bus whose per-subscriber channels hold `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            subscribers: Vec::new(),
        }
    }

    /// Get a receiver that sees every event published from now on
    pub fn subscribe(&mut self) -> crossbeam::channel::Receiver<ReferencingEvent> {
        let (sender, receiver) = crossbeam::channel::bounded(self.capacity);
        self.subscribers.push(sender);
        receiver
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Publish an event to every subscriber without blocking
    ///
    /// Returns the number of subscribers the event was delivered to.
    pub fn publish(&mut self, event: ReferencingEvent) -> usize {
        let mut delivered = 0;
        self.subscribers.retain(|sender| match sender.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(crossbeam::channel::TrySendError::Full(dropped)) => {
                log::debug!("Event subscriber lagging, dropping {:?}", dropped);
                true
            }
            Err(crossbeam::channel::TrySendError::Disconnected(_)) => false,
        });
        delivered
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}
