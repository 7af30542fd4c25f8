use etude_ports::types::NoteEvent;
use parking_lot::RwLock;
use std::collections::VecDeque;

pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Chronological copy of the performance log. `through` marks how much of the
/// log it covers so a later flush removes exactly these events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PerformanceSnapshot {
    pub events: Vec<NoteEvent>,
    through: u64,
}

impl PerformanceSnapshot {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

#[derive(Debug, Default)]
struct LogState {
    entries: VecDeque<(u64, NoteEvent)>,
    next_seq: u64,
}

/// Bounded log of accepted note-ons for the current attempt. Oldest entries
/// are evicted first once the capacity is reached.
#[derive(Debug)]
pub struct PerformanceRecorder {
    capacity: usize,
    state: RwLock<LogState>,
}

impl PerformanceRecorder {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: RwLock::new(LogState {
                entries: VecDeque::with_capacity(capacity),
                next_seq: 0,
            }),
        }
    }

    pub fn record(&self, event: NoteEvent) {
        let mut state = self.state.write();
        if state.entries.len() >= self.capacity {
            state.entries.pop_front();
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.push_back((seq, event));
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let state = self.state.read();
        let mut events: Vec<NoteEvent> = state.entries.iter().map(|(_, event)| *event).collect();
        events.sort_by_key(|event| event.timestamp);
        PerformanceSnapshot {
            events,
            through: state.next_seq,
        }
    }

    /// Drops the events covered by `sent`; anything recorded afterwards stays.
    pub fn flush(&self, sent: &PerformanceSnapshot) -> usize {
        let mut state = self.state.write();
        let before = state.entries.len();
        state.entries.retain(|(seq, _)| *seq >= sent.through);
        before - state.entries.len()
    }

    pub fn clear(&self) {
        self.state.write().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PerformanceRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
