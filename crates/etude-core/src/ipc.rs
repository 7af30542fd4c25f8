use crate::continuity::SessionPhase;
use etude_domain_eval::PerformanceResult;
use etude_ports::services::AnalysisDto;
use etude_ports::storage::SettingsDto;
use etude_ports::types::{DeviceId, MidiInputDevice, NotationSystem, NoteEvent, Section};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    ListMidiInputs,
    /// `None` listens on every connected input.
    SelectMidiInput { device_id: Option<DeviceId> },
    SetNotation { system: NotationSystem },
    SetSection { section: Section },
    /// On-screen keyboard input when no hardware is available.
    VirtualKey { pitch: u8, velocity: u8, down: bool },
    ClearPerformance,
    ExportDiagnostics { path: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    MidiInputsUpdated { devices: Vec<MidiInputDevice> },
    InputAttached { device_id: DeviceId },
    InputDetached { device_id: DeviceId },
    CaptureUnavailable { reason: String },
    SettingsUpdated { settings: SettingsDto },
    SectionChanged { section: Section },
    NoteAccepted { note: NoteEvent, name: String },
    ActiveNotesUpdated { pitches: Vec<u8> },
    PerformanceCleared,
    SessionStateUpdated { phase: SessionPhase },
    PerformanceScored {
        section: Section,
        result: PerformanceResult,
        analysis: Option<AnalysisDto>,
    },
}
