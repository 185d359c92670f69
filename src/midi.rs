//! MIDI messages and normalised controller events
//!
//! Raw bytes from the transport are parsed into a [`MidiMessage`] and then
//! normalised into a [`MidiEvent`], the value the dispatch pipeline matches
//! mappings against.

pub mod port;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

pub use port::{ChannelSource, EventSource, MidirSource};

/// Channel voice message decoded from raw MIDI bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOff { channel: u8, note: u8, velocity: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    PolyPressure { channel: u8, note: u8, pressure: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    /// 14-bit value, center is 8192
    PitchBend { channel: u8, value: u16 },
}

impl MidiMessage {
    /// Parse a channel voice message. System messages, running status and
    /// truncated input yield `None`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;
        if !(0x80..0xF0).contains(&status) {
            return None;
        }

        let channel = status & 0x0F;
        let d1 = rest.first().map(|b| b & 0x7F);
        let d2 = rest.get(1).map(|b| b & 0x7F);

        match status & 0xF0 {
            0x80 => Some(MidiMessage::NoteOff { channel, note: d1?, velocity: d2? }),
            0x90 => {
                let (note, velocity) = (d1?, d2?);
                // Note On with velocity 0 is a Note Off by convention
                if velocity == 0 {
                    Some(MidiMessage::NoteOff { channel, note, velocity })
                } else {
                    Some(MidiMessage::NoteOn { channel, note, velocity })
                }
            }
            0xA0 => Some(MidiMessage::PolyPressure { channel, note: d1?, pressure: d2? }),
            0xB0 => Some(MidiMessage::ControlChange { channel, controller: d1?, value: d2? }),
            0xC0 => Some(MidiMessage::ProgramChange { channel, program: d1? }),
            0xD0 => Some(MidiMessage::ChannelPressure { channel, pressure: d1? }),
            0xE0 => {
                let value = ((d2? as u16) << 7) | d1? as u16;
                Some(MidiMessage::PitchBend { channel, value })
            }
            _ => None,
        }
    }

    /// Encode to wire bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::PolyPressure { channel, note, pressure } => {
                vec![0xA0 | (channel & 0x0F), note & 0x7F, pressure & 0x7F]
            }
            MidiMessage::ControlChange { channel, controller, value } => {
                vec![0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F]
            }
            MidiMessage::ProgramChange { channel, program } => {
                vec![0xC0 | (channel & 0x0F), program & 0x7F]
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                vec![0xD0 | (channel & 0x0F), pressure & 0x7F]
            }
            MidiMessage::PitchBend { channel, value } => {
                vec![0xE0 | (channel & 0x0F), (value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
            }
        }
    }
}

/// Kind of controller event a mapping can react to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NoteOn,
    NoteOff,
    ControlChange,
    ProgramChange,
    /// Anything else found in a config file. Never matches.
    #[serde(other)]
    Unknown,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NoteOn => "note_on",
            EventKind::NoteOff => "note_off",
            EventKind::ControlChange => "control_change",
            EventKind::ProgramChange => "program_change",
            EventKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hardware input occurrence, normalised to type/channel/value fields.
///
/// Fields that do not apply to the event kind are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    pub kind: EventKind,
    /// MIDI channel (0-15)
    pub channel: u8,
    pub note: u8,
    pub controller: u8,
    pub program: u8,
    pub velocity: u8,
    pub value: u8,
    pub timestamp: Instant,
}

impl MidiEvent {
    fn empty(kind: EventKind, channel: u8) -> Self {
        Self {
            kind,
            channel: channel & 0x0F,
            note: 0,
            controller: 0,
            program: 0,
            velocity: 0,
            value: 0,
            timestamp: Instant::now(),
        }
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self { note, velocity, ..Self::empty(EventKind::NoteOn, channel) }
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self { note, velocity, ..Self::empty(EventKind::NoteOff, channel) }
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self { controller, value, ..Self::empty(EventKind::ControlChange, channel) }
    }

    pub fn program_change(channel: u8, program: u8) -> Self {
        Self { program, ..Self::empty(EventKind::ProgramChange, channel) }
    }

    /// Normalise a decoded message. Message kinds the daemon does not map
    /// (pressure, pitch bend) yield `None`.
    pub fn from_message(message: &MidiMessage) -> Option<Self> {
        match *message {
            MidiMessage::NoteOn { channel, note, velocity } => Some(Self::note_on(channel, note, velocity)),
            MidiMessage::NoteOff { channel, note, velocity } => Some(Self::note_off(channel, note, velocity)),
            MidiMessage::ControlChange { channel, controller, value } => {
                Some(Self::control_change(channel, controller, value))
            }
            MidiMessage::ProgramChange { channel, program } => Some(Self::program_change(channel, program)),
            _ => None,
        }
    }

    /// Parse raw bytes straight into an event
    pub fn parse(data: &[u8]) -> Option<Self> {
        MidiMessage::parse(data).as_ref().and_then(Self::from_message)
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EventKind::NoteOn | EventKind::NoteOff => write!(
                f,
                "{} ch:{} n:{} v:{}",
                self.kind, self.channel, self.note, self.velocity
            ),
            EventKind::ControlChange => write!(
                f,
                "{} ch:{} cc:{} v:{}",
                self.kind, self.channel, self.controller, self.value
            ),
            EventKind::ProgramChange => {
                write!(f, "{} ch:{} p:{}", self.kind, self.channel, self.program)
            }
            EventKind::Unknown => write!(f, "{} ch:{}", self.kind, self.channel),
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
