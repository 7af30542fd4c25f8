use etude_ports::midi::{
    MidiError, MidiInputPort, MidiInputStream, MidiMessage, RawMidiCallback, RawMidiEvent,
};
use etude_ports::types::{DeviceId, MidiInputDevice};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort as MidirPort};
use std::collections::HashMap;
use std::time::Instant;

pub struct MidirMidiInputPort {
    client_name: String,
}

impl MidirMidiInputPort {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn create_midi_in(&self) -> Result<MidiInput, MidiError> {
        let mut midi_in =
            MidiInput::new(&self.client_name).map_err(|e| MidiError::Unsupported(e.to_string()))?;
        // sysex, timing and active sensing are dropped by the deduplicator anyway
        midi_in.ignore(Ignore::All);
        Ok(midi_in)
    }

    /// Ids are derived from port names so they survive other ports being
    /// unplugged. Repeated names get a `#n` suffix in enumeration order.
    fn enumerate(midi_in: &MidiInput) -> Vec<(DeviceId, String, MidirPort)> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        midi_in
            .ports()
            .into_iter()
            .map(|port| {
                let name = midi_in
                    .port_name(&port)
                    .unwrap_or_else(|_| "Unknown Input".to_string());
                let count = seen.entry(name.clone()).or_insert(0);
                *count += 1;
                let id = if *count == 1 {
                    DeviceId(format!("midir:{}", name))
                } else {
                    DeviceId(format!("midir:{}#{}", name, count))
                };
                (id, name, port)
            })
            .collect()
    }
}

impl Default for MidirMidiInputPort {
    fn default() -> Self {
        Self::new("Etude")
    }
}

pub struct MidirMidiInputStream {
    connection: Option<MidiInputConnection<RawMidiCallback>>,
}

impl MidiInputStream for MidirMidiInputStream {
    fn close(mut self: Box<Self>) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
        }
    }
}

impl MidiInputPort for MidirMidiInputPort {
    fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError> {
        let midi_in = self.create_midi_in()?;
        Ok(Self::enumerate(&midi_in)
            .into_iter()
            .map(|(id, name, _)| MidiInputDevice {
                id,
                name,
                is_available: true,
            })
            .collect())
    }

    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: RawMidiCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError> {
        let midi_in = self.create_midi_in()?;

        let port = Self::enumerate(&midi_in)
            .into_iter()
            .find(|(id, _, _)| id == device_id)
            .map(|(_, _, port)| port)
            .ok_or_else(|| MidiError::DeviceNotFound(device_id.to_string()))?;

        // Stamped on arrival; the backend's own timestamp uses a per-port epoch.
        let connection = midi_in
            .connect(
                &port,
                "etude-midi-input",
                move |_stamp, message, callback| {
                    (callback)(RawMidiEvent {
                        at: Instant::now(),
                        message: MidiMessage::from_slice(message),
                    });
                },
                cb,
            )
            .map_err(|e| MidiError::DeviceUnavailable(e.to_string()))?;

        tracing::debug!(device = %device_id, "midir connection open");
        Ok(Box::new(MidirMidiInputStream {
            connection: Some(connection),
        }))
    }
}
