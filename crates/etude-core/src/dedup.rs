use crate::note_state::ActiveNoteSet;
use etude_ports::midi::MidiMessage;
use etude_ports::types::{Millis, NoteEvent, MIDI_DATA_MAX};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DEBOUNCE_MS: Millis = 50;

const NOTE_OFF_FIRST: u8 = 0x80; // 128
const NOTE_OFF_LAST: u8 = 0x8F; // 143
const NOTE_ON_FIRST: u8 = 0x90; // 144
const NOTE_ON_LAST: u8 = 0x9F; // 159

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteClass {
    On,
    Off,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classified {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8 },
    /// A well-formed message that is not a note message (controllers, clock, ...).
    Other { status: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MalformedReason {
    Arity(usize),
    StatusOutOfRange(u8),
    DataOutOfRange(u8),
}

#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("malformed midi message {reason:?} at {timestamp}ms")]
pub struct MalformedEvent {
    pub reason: MalformedReason,
    pub timestamp: Millis,
}

/// Last accepted message, kept to recognise double triggers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebounceState {
    pub pitch: u8,
    pub class: NoteClass,
    pub timestamp: Millis,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DedupOutcome {
    NoteOn(NoteEvent),
    NoteOff { pitch: u8, was_held: bool },
    Duplicate { pitch: u8 },
    Ignored { status: u8 },
    Malformed(MalformedEvent),
}

impl DedupOutcome {
    pub fn accepted(&self) -> bool {
        matches!(self, DedupOutcome::NoteOn(_) | DedupOutcome::NoteOff { .. })
    }
}

pub fn classify(message: &MidiMessage, timestamp: Millis) -> Result<Classified, MalformedEvent> {
    let malformed = |reason| MalformedEvent { reason, timestamp };

    // Channel pressure and program change are two bytes, sysex is longer.
    if message.len > 0 && message.bytes[0] > NOTE_ON_LAST {
        return Ok(Classified::Other {
            status: message.bytes[0],
        });
    }
    if message.len != 3 {
        return Err(malformed(MalformedReason::Arity(message.len)));
    }
    let [status, pitch, velocity] = message.bytes;
    if status <= MIDI_DATA_MAX {
        return Err(malformed(MalformedReason::StatusOutOfRange(status)));
    }
    if let Some(bad) = [pitch, velocity].into_iter().find(|b| *b > MIDI_DATA_MAX) {
        return Err(malformed(MalformedReason::DataOutOfRange(bad)));
    }

    Ok(match status {
        NOTE_ON_FIRST..=NOTE_ON_LAST if velocity > 0 => Classified::NoteOn { pitch, velocity },
        NOTE_ON_FIRST..=NOTE_ON_LAST | NOTE_OFF_FIRST..=NOTE_OFF_LAST => Classified::NoteOff { pitch },
        _ => Classified::Other { status },
    })
}

/// Classifies raw messages in arrival order, drops double triggers and
/// tracks which pitches are held.
#[derive(Debug)]
pub struct Deduplicator {
    window_ms: Millis,
    last: Option<DebounceState>,
    active: ActiveNoteSet,
}

impl Deduplicator {
    pub fn new(window_ms: Millis) -> Self {
        Self {
            window_ms,
            last: None,
            active: ActiveNoteSet::new(),
        }
    }

    pub fn process(&mut self, message: &MidiMessage, timestamp: Millis) -> DedupOutcome {
        let classified = match classify(message, timestamp) {
            Ok(classified) => classified,
            Err(err) => {
                tracing::warn!(bytes = ?&message.bytes[..message.len.min(3)], len = message.len, "dropping {}", err);
                return DedupOutcome::Malformed(err);
            }
        };

        match classified {
            Classified::NoteOn { pitch, velocity } => {
                if self.is_duplicate(pitch, timestamp) {
                    tracing::trace!(pitch, timestamp, "duplicate note-on dropped");
                    return DedupOutcome::Duplicate { pitch };
                }
                self.remember(pitch, NoteClass::On, timestamp);
                self.active.press(pitch);
                DedupOutcome::NoteOn(NoteEvent::new(pitch, velocity, timestamp))
            }
            Classified::NoteOff { pitch } => {
                self.remember(pitch, NoteClass::Off, timestamp);
                let was_held = self.active.release(pitch);
                DedupOutcome::NoteOff { pitch, was_held }
            }
            Classified::Other { status } => DedupOutcome::Ignored { status },
        }
    }

    pub fn active(&self) -> &ActiveNoteSet {
        &self.active
    }

    pub fn last_accepted(&self) -> Option<DebounceState> {
        self.last
    }

    pub fn window_ms(&self) -> Millis {
        self.window_ms
    }

    /// Drops a held pitch without a note-off. Returns true if it was held.
    pub fn release(&mut self, pitch: u8) -> bool {
        self.active.release(pitch)
    }

    fn is_duplicate(&self, pitch: u8, timestamp: Millis) -> bool {
        match self.last {
            Some(last) => {
                last.pitch == pitch
                    && last.class == NoteClass::On
                    && last.timestamp.abs_diff(timestamp) < self.window_ms
            }
            None => false,
        }
    }

    fn remember(&mut self, pitch: u8, class: NoteClass, timestamp: Millis) {
        self.last = Some(DebounceState {
            pitch,
            class,
            timestamp,
        });
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}
