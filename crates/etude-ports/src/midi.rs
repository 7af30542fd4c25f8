use crate::types::*;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};

/// Raw bytes of one hardware message. Only the first three bytes are kept;
/// `len` records the original arity so callers can reject malformed input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiMessage {
    pub bytes: [u8; 3],
    pub len: usize,
}

impl MidiMessage {
    pub fn from_slice(data: &[u8]) -> Self {
        let mut bytes = [0u8; 3];
        for (slot, byte) in bytes.iter_mut().zip(data.iter()) {
            *slot = *byte;
        }
        Self {
            bytes,
            len: data.len(),
        }
    }

    pub fn triple(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            bytes: [status, data1, data2],
            len: 3,
        }
    }

    pub fn status(&self) -> u8 {
        self.bytes[0]
    }
}

/// Raw input from a MIDI port, stamped on arrival.
#[derive(Clone, Copy, Debug)]
pub struct RawMidiEvent {
    pub at: Instant,
    pub message: MidiMessage,
}

#[derive(thiserror::Error, Debug)]
pub enum MidiError {
    #[error("midi input unsupported on this platform: {0}")]
    Unsupported(String),
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// MIDI input stream handle: drop closes it.
pub trait MidiInputStream: Send {
    fn close(self: Box<Self>);
}

pub type RawMidiCallback = Arc<dyn Fn(RawMidiEvent) + Send + Sync + 'static>;

pub trait MidiInputPort: Send + Sync {
    fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError>;

    /// Open input stream: implementation should invoke cb from a background thread/callback.
    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: RawMidiCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError>;
}
