use serde::{Deserialize, Serialize};
use std::fmt;

pub type Millis = u64; // monotonic milliseconds since the capture epoch

pub const MIDI_DATA_MAX: u8 = 127;

/// A single accepted note-on. The wire names follow the Data Service schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteEvent {
    #[serde(rename = "note")]
    pub pitch: u8,
    pub velocity: u8,
    #[serde(rename = "time")]
    pub timestamp: Millis,
}

impl NoteEvent {
    pub fn new(pitch: u8, velocity: u8, timestamp: Millis) -> Self {
        Self {
            pitch,
            velocity,
            timestamp,
        }
    }

    pub fn is_in_range(&self) -> bool {
        self.pitch <= MIDI_DATA_MAX && self.velocity <= MIDI_DATA_MAX
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    #[default]
    Intro,
    Verse,
    Chorus,
    Bridge,
    Outro,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Intro,
        Section::Verse,
        Section::Chorus,
        Section::Bridge,
        Section::Outro,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Intro => "intro",
            Section::Verse => "verse",
            Section::Chorus => "chorus",
            Section::Bridge => "bridge",
            Section::Outro => "outro",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .iter()
            .copied()
            .find(|section| section.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown section: {}", s))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotationSystem {
    #[default]
    Letter,
    Solfege,
}

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(DeviceId);
string_id!(UserId);
string_id!(SessionId);
string_id!(ReferenceId);
string_id!(ThreadId);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiInputDevice {
    pub id: DeviceId,
    pub name: String,
    pub is_available: bool,
}
