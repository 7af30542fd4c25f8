use crate::ipc::Event;
use tokio::sync::broadcast;

pub const BUS_CAPACITY: usize = 256;

/// Typed publish/subscribe channel for engine and session events.
/// Subscribers that fall more than `BUS_CAPACITY` events behind lose the oldest ones.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: Event) {
        // send only fails when nobody is subscribed
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
