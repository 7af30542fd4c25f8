use etude_ports::types::MIDI_DATA_MAX;
use serde::{Deserialize, Serialize};

const PITCH_COUNT: usize = MIDI_DATA_MAX as usize + 1;

/// Pitches currently held down. A pitch is present iff its last accepted
/// message was a note-on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveNoteSet {
    held: Vec<bool>,
    count: usize,
}

impl Default for ActiveNoteSet {
    fn default() -> Self {
        Self {
            held: vec![false; PITCH_COUNT],
            count: 0,
        }
    }
}

impl ActiveNoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the pitch was not held before.
    pub fn press(&mut self, pitch: u8) -> bool {
        let Some(slot) = self.held.get_mut(usize::from(pitch)) else {
            return false;
        };
        if *slot {
            return false;
        }
        *slot = true;
        self.count += 1;
        true
    }

    /// Returns true if the pitch was held before.
    pub fn release(&mut self, pitch: u8) -> bool {
        let Some(slot) = self.held.get_mut(usize::from(pitch)) else {
            return false;
        };
        if !*slot {
            return false;
        }
        *slot = false;
        self.count -= 1;
        true
    }

    pub fn release_all(&mut self) -> bool {
        let changed = self.count > 0;
        self.held.iter_mut().for_each(|slot| *slot = false);
        self.count = 0;
        changed
    }

    pub fn is_held(&self, pitch: u8) -> bool {
        self.held.get(usize::from(pitch)).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Held pitches in ascending order.
    pub fn pitches(&self) -> Vec<u8> {
        self.held
            .iter()
            .enumerate()
            .filter(|(_, held)| **held)
            .map(|(pitch, _)| pitch as u8)
            .collect()
    }
}
