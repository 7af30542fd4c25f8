use crate::continuity::SessionManager;
use crate::dedup::DedupOutcome;
use crate::note_state::ActiveNoteSet;
use crate::diagnostics::{export_diagnostics, DiagnosticsReport};
use crate::engine::{CaptureConfig, CaptureEngine};
use crate::ipc::{Command, Event};
use etude_ports::midi::{MidiError, MidiInputPort, MidiInputStream, MidiMessage, RawMidiEvent};
use etude_ports::storage::{SettingsDto, StorageError, StoragePort};
use etude_ports::types::{DeviceId, MidiInputDevice, Section};
use parking_lot::Mutex;
use rtrb::{Consumer, RingBuffer};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

const INPUT_QUEUE_CAPACITY: usize = 2048;
const PORT_SCAN_INTERVAL: Duration = Duration::from_secs(1);

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("midi error: {0}")]
    Midi(#[from] MidiError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

struct AttachedInput {
    stream: Box<dyn MidiInputStream>,
    rx: Consumer<RawMidiEvent>,
    /// Pitches whose last accepted message came from this port.
    held: ActiveNoteSet,
}

/// Front door for a UI: owns the hardware ports and settings, feeds every
/// attached input into the shared [`CaptureEngine`] and answers [`Command`]s.
/// Events go out on the engine's bus.
pub struct PracticeCore {
    midi_port: Box<dyn MidiInputPort>,
    storage: Option<Box<dyn StoragePort>>,
    settings: SettingsDto,
    engine: Arc<CaptureEngine>,
    session: Option<Arc<SessionManager>>,
    inputs: HashMap<DeviceId, AttachedInput>,
    devices: Vec<MidiInputDevice>,
    capture_available: bool,
    section: Section,
    last_port_scan: Instant,
}

impl PracticeCore {
    pub fn new(midi_port: Box<dyn MidiInputPort>, storage: Option<Box<dyn StoragePort>>) -> Self {
        let settings = match storage.as_ref() {
            Some(storage) => storage.load_settings().unwrap_or_else(|err| {
                tracing::warn!("falling back to default settings: {}", err);
                SettingsDto::default()
            }),
            None => SettingsDto::default(),
        };
        Self::with_settings(midi_port, storage, settings)
    }

    pub fn with_settings(
        midi_port: Box<dyn MidiInputPort>,
        storage: Option<Box<dyn StoragePort>>,
        settings: SettingsDto,
    ) -> Self {
        let engine = Arc::new(CaptureEngine::new(CaptureConfig::from(&settings)));
        Self {
            midi_port,
            storage,
            section: settings.default_section,
            settings,
            engine,
            session: None,
            inputs: HashMap::new(),
            devices: Vec::new(),
            capture_available: true,
            last_port_scan: Instant::now(),
        }
    }

    /// Lets diagnostics include the session state.
    pub fn attach_session(&mut self, session: Arc<SessionManager>) {
        self.session = Some(session);
    }

    /// Attaches to the configured inputs. Missing hardware support is reported
    /// as [`Event::CaptureUnavailable`] and is not an error.
    pub fn start_capture(&mut self) -> Result<(), CoreError> {
        match self.sync_inputs() {
            Ok(()) => Ok(()),
            Err(MidiError::Unsupported(reason)) => {
                self.mark_unavailable(reason);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn handle_command(&mut self, cmd: Command) -> Result<(), CoreError> {
        match cmd {
            Command::ListMidiInputs => match self.midi_port.list_inputs() {
                Ok(devices) => {
                    self.devices = devices.clone();
                    self.publish(Event::MidiInputsUpdated { devices });
                }
                Err(MidiError::Unsupported(reason)) => self.mark_unavailable(reason),
                Err(err) => return Err(err.into()),
            },
            Command::SelectMidiInput { device_id } => {
                self.settings.selected_midi_in = device_id;
                self.detach_all();
                self.save_settings();
                self.start_capture()?;
                self.publish_settings();
            }
            Command::SetNotation { system } => {
                self.settings.notation = system;
                self.engine.set_notation(system);
                self.save_settings();
                self.publish_settings();
            }
            Command::SetSection { section } => {
                self.section = section;
                self.settings.default_section = section;
                self.save_settings();
                self.publish(Event::SectionChanged { section });
            }
            Command::VirtualKey {
                pitch,
                velocity,
                down,
            } => {
                self.play_virtual_key(pitch, velocity, down);
            }
            Command::ClearPerformance => {
                self.engine.recorder().clear();
                self.publish(Event::PerformanceCleared);
            }
            Command::ExportDiagnostics { path } => {
                self.export_diagnostics(Path::new(&path))?;
            }
        }
        Ok(())
    }

    /// Drains every input queue into the engine in arrival order and
    /// periodically rescans the ports. Returns the number of messages ingested.
    pub fn tick(&mut self) -> usize {
        if self.capture_available && self.last_port_scan.elapsed() >= PORT_SCAN_INTERVAL {
            self.last_port_scan = Instant::now();
            if let Err(err) = self.sync_inputs() {
                tracing::debug!("port rescan failed: {}", err);
            }
        }
        self.drain_inputs()
    }

    pub fn engine(&self) -> &Arc<CaptureEngine> {
        &self.engine
    }

    pub fn settings(&self) -> &SettingsDto {
        &self.settings
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn capture_available(&self) -> bool {
        self.capture_available
    }

    pub fn attached_inputs(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.inputs.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn shutdown(&mut self) {
        self.detach_all();
    }

    fn play_virtual_key(&mut self, pitch: u8, velocity: u8, down: bool) -> DedupOutcome {
        let message = if down {
            MidiMessage::triple(NOTE_ON, pitch, velocity)
        } else {
            MidiMessage::triple(NOTE_OFF, pitch, 0)
        };
        let outcome = self.engine.ingest(&message, self.engine.now_millis());
        self.track_held(None, outcome);
        outcome
    }

    /// Keeps the per-port held sets in step with the engine's note state.
    fn track_held(&mut self, source: Option<&DeviceId>, outcome: DedupOutcome) {
        match outcome {
            DedupOutcome::NoteOn(note) => {
                if let Some(input) = source.and_then(|id| self.inputs.get_mut(id)) {
                    input.held.press(note.pitch);
                }
            }
            // a note-off from any source releases the shared pitch
            DedupOutcome::NoteOff { pitch, .. } => {
                for input in self.inputs.values_mut() {
                    input.held.release(pitch);
                }
            }
            _ => {}
        }
    }

    fn drain_inputs(&mut self) -> usize {
        let mut pending = Vec::new();
        for (device_id, input) in self.inputs.iter_mut() {
            while let Ok(event) = input.rx.pop() {
                pending.push((device_id.clone(), event));
            }
        }
        pending.sort_by_key(|(_, event)| event.at);
        for (device_id, event) in &pending {
            let outcome = self.engine.ingest_raw(event);
            self.track_held(Some(device_id), outcome);
        }
        pending.len()
    }

    fn sync_inputs(&mut self) -> Result<(), MidiError> {
        let devices = self.midi_port.list_inputs()?;
        self.capture_available = true;

        let wanted: Vec<DeviceId> = devices
            .iter()
            .filter(|device| device.is_available)
            .filter(|device| match self.settings.selected_midi_in.as_ref() {
                Some(selected) => &device.id == selected,
                None => true,
            })
            .map(|device| device.id.clone())
            .collect();

        let gone: Vec<DeviceId> = self
            .inputs
            .keys()
            .filter(|id| !wanted.contains(id))
            .cloned()
            .collect();
        for id in gone {
            self.detach(&id);
        }

        for id in wanted {
            if self.inputs.contains_key(&id) {
                continue;
            }
            match self.attach(&id) {
                Ok(()) => {
                    tracing::info!(device = %id, "midi input attached");
                    self.publish(Event::InputAttached { device_id: id });
                }
                Err(err) => tracing::warn!(device = %id, "could not open midi input: {}", err),
            }
        }

        if devices != self.devices {
            self.devices = devices.clone();
            self.publish(Event::MidiInputsUpdated { devices });
        }
        Ok(())
    }

    fn attach(&mut self, device_id: &DeviceId) -> Result<(), MidiError> {
        let (producer, consumer) = RingBuffer::new(INPUT_QUEUE_CAPACITY);
        let producer = Arc::new(Mutex::new(producer));
        let cb = Arc::new(move |event: RawMidiEvent| {
            let _ = producer.lock().push(event);
        });

        let stream = self.midi_port.open_input(device_id, cb)?;
        self.inputs.insert(
            device_id.clone(),
            AttachedInput {
                stream,
                rx: consumer,
                held: ActiveNoteSet::new(),
            },
        );
        Ok(())
    }

    fn detach(&mut self, device_id: &DeviceId) {
        let Some(input) = self.inputs.remove(device_id) else {
            return;
        };
        input.stream.close();
        // A vanished port never sends its note-offs. Pitches also held on a
        // port that is still attached stay down.
        let orphaned: Vec<u8> = input
            .held
            .pitches()
            .into_iter()
            .filter(|pitch| !self.inputs.values().any(|other| other.held.is_held(*pitch)))
            .collect();
        self.engine.release(&orphaned);
        tracing::info!(device = %device_id, "midi input detached");
        self.publish(Event::InputDetached {
            device_id: device_id.clone(),
        });
    }

    fn detach_all(&mut self) {
        let ids: Vec<DeviceId> = self.inputs.keys().cloned().collect();
        for id in ids {
            self.detach(&id);
        }
    }

    fn mark_unavailable(&mut self, reason: String) {
        if self.capture_available {
            tracing::warn!("midi capture unavailable: {}", reason);
        }
        self.capture_available = false;
        self.publish(Event::CaptureUnavailable { reason });
    }

    fn export_diagnostics(&self, dir: &Path) -> Result<(), CoreError> {
        let midi_inputs = match self.midi_port.list_inputs() {
            Ok(devices) => devices,
            Err(MidiError::Unsupported(_)) => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        let active_notes = self.engine.active_notes();
        let performance_log = self.engine.recorder().snapshot().events;
        let session_ids = self.session.as_ref().and_then(|session| session.ids());

        export_diagnostics(
            dir,
            &DiagnosticsReport {
                settings: &self.settings,
                capture_available: self.capture_available,
                midi_inputs: &midi_inputs,
                active_notes: &active_notes,
                performance_log: &performance_log,
                session_phase: self.session.as_ref().map(|session| session.phase()),
                session_ids: session_ids.as_ref(),
            },
        )?;
        Ok(())
    }

    fn publish_settings(&self) {
        self.publish(Event::SettingsUpdated {
            settings: self.settings.clone(),
        });
    }

    fn publish(&self, event: Event) {
        self.engine.bus().publish(event);
    }

    fn save_settings(&self) {
        if let Some(storage) = self.storage.as_ref() {
            if let Err(err) = storage.save_settings(&self.settings) {
                tracing::warn!("could not save settings: {}", err);
            }
        }
    }
}

impl Drop for PracticeCore {
    fn drop(&mut self) {
        for (_, input) in self.inputs.drain() {
            input.stream.close();
        }
    }
}
