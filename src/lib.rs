//! MidiDaemon - map MIDI controller events to system actions
//!
//! Events from a MIDI input are matched against configured mappings; every
//! match launches its action (volume, application start, keystrokes, audio
//! output switching) concurrently through the action registry.

pub mod actions;
pub mod config;
pub mod dispatch;
pub mod matcher;
pub mod midi;
pub mod platform;

pub use actions::{ActionError, ActionRegistry, Executor, Outcome};
pub use config::AppConfig;
pub use dispatch::{DispatchError, DispatchReport, Dispatcher, MappingFailure};
pub use midi::{EventKind, MidiEvent};
