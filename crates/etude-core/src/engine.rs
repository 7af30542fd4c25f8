use crate::bus::EventBus;
use crate::dedup::{DedupOutcome, Deduplicator, DEFAULT_DEBOUNCE_MS};
use crate::ipc::Event;
use crate::recorder::{PerformanceRecorder, DEFAULT_LOG_CAPACITY};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use etude_domain_score::resolve_name;
use etude_ports::midi::{MidiMessage, RawMidiEvent};
use etude_ports::storage::SettingsDto;
use etude_ports::types::{Millis, NotationSystem, NoteEvent};
use parking_lot::Mutex;
use std::time::Instant;
use tokio::sync::broadcast;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureConfig {
    pub debounce_ms: Millis,
    pub log_capacity: usize,
    pub notation: NotationSystem,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            log_capacity: DEFAULT_LOG_CAPACITY,
            notation: NotationSystem::Letter,
        }
    }
}

impl From<&SettingsDto> for CaptureConfig {
    fn from(settings: &SettingsDto) -> Self {
        Self {
            debounce_ms: settings.debounce_ms,
            log_capacity: settings.performance_log_capacity,
            notation: settings.notation,
        }
    }
}

struct CaptureState {
    dedup: Deduplicator,
    notation: NotationSystem,
}

/// Owns the note-state tracker, the performance log and the event bus for one
/// capture session. Safe to feed from several input ports at once: every
/// message is processed under a single lock, in the order the lock is taken.
pub struct CaptureEngine {
    state: Mutex<CaptureState>,
    recorder: PerformanceRecorder,
    bus: EventBus,
    epoch: Instant,
    epoch_wall: DateTime<Utc>,
}

impl CaptureEngine {
    pub fn new(config: CaptureConfig) -> Self {
        Self::with_bus(config, EventBus::new())
    }

    pub fn with_bus(config: CaptureConfig, bus: EventBus) -> Self {
        Self {
            state: Mutex::new(CaptureState {
                dedup: Deduplicator::new(config.debounce_ms),
                notation: config.notation,
            }),
            recorder: PerformanceRecorder::new(config.log_capacity),
            bus,
            epoch: Instant::now(),
            epoch_wall: Utc::now(),
        }
    }

    pub fn ingest_raw(&self, raw: &RawMidiEvent) -> DedupOutcome {
        self.ingest(&raw.message, self.millis_at(raw.at))
    }

    pub fn ingest(&self, message: &MidiMessage, timestamp: Millis) -> DedupOutcome {
        let mut state = self.state.lock();
        let outcome = state.dedup.process(message, timestamp);

        match outcome {
            DedupOutcome::NoteOn(note) => {
                self.recorder.record(note);
                let name = display_name(note, state.notation);
                self.bus.publish(Event::NoteAccepted { note, name });
                self.bus.publish(Event::ActiveNotesUpdated {
                    pitches: state.dedup.active().pitches(),
                });
            }
            DedupOutcome::NoteOff { was_held: true, .. } => {
                self.bus.publish(Event::ActiveNotesUpdated {
                    pitches: state.dedup.active().pitches(),
                });
            }
            DedupOutcome::NoteOff { .. }
            | DedupOutcome::Duplicate { .. }
            | DedupOutcome::Ignored { .. }
            | DedupOutcome::Malformed(_) => {}
        }
        outcome
    }

    /// Forgets held pitches whose note-offs will never arrive, e.g. because
    /// the port that held them went away.
    pub fn release(&self, pitches: &[u8]) {
        let mut state = self.state.lock();
        let mut changed = false;
        for &pitch in pitches {
            changed |= state.dedup.release(pitch);
        }
        if changed {
            self.bus.publish(Event::ActiveNotesUpdated {
                pitches: state.dedup.active().pitches(),
            });
        }
    }

    pub fn active_notes(&self) -> Vec<u8> {
        self.state.lock().dedup.active().pitches()
    }

    pub fn is_held(&self, pitch: u8) -> bool {
        self.state.lock().dedup.active().is_held(pitch)
    }

    pub fn set_notation(&self, notation: NotationSystem) {
        self.state.lock().notation = notation;
    }

    pub fn notation(&self) -> NotationSystem {
        self.state.lock().notation
    }

    pub fn recorder(&self) -> &PerformanceRecorder {
        &self.recorder
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    pub fn now_millis(&self) -> Millis {
        self.millis_at(Instant::now())
    }

    pub fn millis_at(&self, at: Instant) -> Millis {
        at.saturating_duration_since(self.epoch).as_millis() as Millis
    }

    /// Wall-clock time for a capture timestamp.
    pub fn wall_clock_at(&self, timestamp: Millis) -> DateTime<Utc> {
        self.epoch_wall + ChronoDuration::milliseconds(timestamp as i64)
    }
}

impl Default for CaptureEngine {
    fn default() -> Self {
        Self::new(CaptureConfig::default())
    }
}

fn display_name(note: NoteEvent, notation: NotationSystem) -> String {
    // Accepted notes were range-checked by the deduplicator.
    resolve_name(note.pitch, notation).unwrap_or_else(|_| note.pitch.to_string())
}
