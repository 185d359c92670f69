//! Event sources feeding the dispatch loop
//!
//! [`MidirSource`] talks to real hardware through midir. [`ChannelSource`]
//! is an in-memory source used for tests and for embedding the dispatcher
//! behind another transport.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use midir::{MidiInput, MidiInputPort};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::{format_hex, MidiEvent, MidiMessage};

/// Capacity of the queue between the transport callback and the ingestion task
pub const EVENT_QUEUE_CAPACITY: usize = 1000;

const CLIENT_NAME: &str = "MidiDaemon";

/// Transport contract consumed by the dispatcher
///
/// Note: All methods take &self so a source can be shared as `Arc<dyn EventSource>`.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Open the named input port
    async fn open(&self, port: &str) -> Result<()>;

    /// Close the port. Closing a source that is not open is a no-op.
    async fn close(&self) -> Result<()>;

    /// Take the event stream of the open port.
    ///
    /// The stream can be taken once per `open` and ends when the source closes.
    fn read_events(&self) -> Result<mpsc::Receiver<MidiEvent>>;

    /// Names of the available input ports, in enumeration order
    fn port_names(&self) -> Result<Vec<String>>;
}

/// Find an input port by case-insensitive substring match
fn find_port_by_substring(midi_in: &MidiInput, pattern: &str) -> Option<(MidiInputPort, String)> {
    let pattern = pattern.to_lowercase();
    midi_in.ports().into_iter().find_map(|port| {
        let name = midi_in.port_name(&port).ok()?;
        name.to_lowercase().contains(&pattern).then_some((port, name))
    })
}

/// Owns the midir connection on a dedicated thread.
///
/// The connection is dropped (and the port closed) when `stop_tx` fires or
/// is dropped, which also drops the callback's event sender.
struct PortThread {
    stop_tx: std::sync::mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct MidirState {
    port: Option<PortThread>,
    events: Option<mpsc::Receiver<MidiEvent>>,
}

/// Hardware MIDI input via midir
#[derive(Default)]
pub struct MidirSource {
    state: Mutex<MidirState>,
}

impl MidirSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn spawn_port_thread(
        pattern: String,
        event_tx: mpsc::Sender<MidiEvent>,
        ready_tx: oneshot::Sender<Result<String>>,
    ) -> Result<PortThread> {
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name("midi-input".to_string())
            .spawn(move || {
                let connect = || -> Result<_> {
                    let midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input")?;
                    let (port, name) = find_port_by_substring(&midi_in, &pattern)
                        .ok_or_else(|| anyhow!("Input port '{}' not found", pattern))?;

                    let conn = midi_in
                        .connect(
                            &port,
                            CLIENT_NAME,
                            move |_ts, data, _| match MidiEvent::parse(data) {
                                Some(event) => {
                                    if event_tx.try_send(event).is_err() {
                                        debug!("Event queue full or closed, dropping {}", format_hex(data));
                                    }
                                }
                                None => debug!("Ignoring MIDI message: {}", format_hex(data)),
                            },
                            (),
                        )
                        .map_err(|e| anyhow!("Failed to connect to input port '{}': {}", name, e))?;
                    Ok((conn, name))
                };

                match connect() {
                    Ok((conn, name)) => {
                        let _ = ready_tx.send(Ok(name));
                        // Park until asked to stop (or the source is dropped)
                        let _ = stop_rx.recv();
                        let _ = conn.close();
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .context("Failed to spawn MIDI input thread")?;

        Ok(PortThread { stop_tx, handle })
    }
}

#[async_trait]
impl EventSource for MidirSource {
    async fn open(&self, port: &str) -> Result<()> {
        if self.state.lock().port.is_some() {
            bail!("MIDI input already open");
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();
        let thread = Self::spawn_port_thread(port.to_string(), event_tx, ready_tx)?;

        let name = ready_rx
            .await
            .map_err(|_| anyhow!("MIDI input thread exited before reporting"))??;
        info!(port = %name, "MIDI input port opened");

        let mut state = self.state.lock();
        state.port = Some(thread);
        state.events = Some(event_rx);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let thread = {
            let mut state = self.state.lock();
            state.events = None;
            state.port.take()
        };

        let Some(thread) = thread else {
            return Ok(());
        };

        let _ = thread.stop_tx.send(());
        tokio::task::spawn_blocking(move || thread.handle.join())
            .await
            .context("Failed to join MIDI input thread")?
            .map_err(|_| anyhow!("MIDI input thread panicked"))?;

        info!("MIDI input port closed");
        Ok(())
    }

    fn read_events(&self) -> Result<mpsc::Receiver<MidiEvent>> {
        let mut state = self.state.lock();
        if state.port.is_none() {
            bail!("MIDI input is not open");
        }
        state
            .events
            .take()
            .ok_or_else(|| anyhow!("MIDI event stream already taken"))
    }

    fn port_names(&self) -> Result<Vec<String>> {
        let midi_in = MidiInput::new(&format!("{}-Scanner", CLIENT_NAME))
            .context("Failed to create MIDI input")?;

        let mut names = Vec::new();
        for port in midi_in.ports() {
            match midi_in.port_name(&port) {
                Ok(name) => names.push(name),
                Err(e) => warn!("Skipping MIDI port with unreadable name: {}", e),
            }
        }
        Ok(names)
    }
}

#[derive(Default)]
struct ChannelState {
    opened_port: Option<String>,
    sender: Option<mpsc::Sender<MidiEvent>>,
    events: Option<mpsc::Receiver<MidiEvent>>,
}

/// In-memory event source
///
/// Events are pushed with [`ChannelSource::send`] while the source is open.
/// Closing drops the internal sender, which ends the event stream.
pub struct ChannelSource {
    ports: Vec<String>,
    open_error: Option<String>,
    state: Mutex<ChannelState>,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

impl ChannelSource {
    /// Create a source advertising the given port names
    pub fn new<I, S>(ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ports: ports.into_iter().map(Into::into).collect(),
            open_error: None,
            state: Mutex::new(ChannelState::default()),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    /// Make every `open` fail with the given message
    pub fn with_open_error(mut self, message: impl Into<String>) -> Self {
        self.open_error = Some(message.into());
        self
    }

    /// Push an event into the open stream
    pub async fn send(&self, event: MidiEvent) -> Result<()> {
        let sender = self
            .state
            .lock()
            .sender
            .clone()
            .ok_or_else(|| anyhow!("Channel source is not open"))?;
        sender
            .send(event)
            .await
            .map_err(|_| anyhow!("Event stream receiver dropped"))
    }

    /// Push a message as wire bytes, normalised like hardware input.
    ///
    /// Returns `false` when the message is not a mappable event and was dropped.
    pub async fn send_message(&self, message: MidiMessage) -> Result<bool> {
        let data = message.encode();
        match MidiEvent::parse(&data) {
            Some(event) => {
                self.send(event).await?;
                Ok(true)
            }
            None => {
                debug!("Ignoring MIDI message: {}", format_hex(&data));
                Ok(false)
            }
        }
    }

    /// Port passed to the last successful `open`, while open
    pub fn opened_port(&self) -> Option<String> {
        self.state.lock().opened_port.clone()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().opened_port.is_some()
    }

    /// Number of successful opens
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of closes that actually released an open port
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn open(&self, port: &str) -> Result<()> {
        if let Some(message) = &self.open_error {
            bail!("{}", message);
        }

        let mut state = self.state.lock();
        if state.opened_port.is_some() {
            bail!("Channel source already open");
        }
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        state.opened_port = Some(port.to_string());
        state.sender = Some(tx);
        state.events = Some(rx);
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.opened_port.take().is_some() {
            state.sender = None;
            state.events = None;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn read_events(&self) -> Result<mpsc::Receiver<MidiEvent>> {
        let mut state = self.state.lock();
        if state.opened_port.is_none() {
            bail!("Channel source is not open");
        }
        state
            .events
            .take()
            .ok_or_else(|| anyhow!("Event stream already taken"))
    }

    fn port_names(&self) -> Result<Vec<String>> {
        Ok(self.ports.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::EventKind;

    #[tokio::test]
    async fn test_channel_source_stream_ends_on_close() {
        let source = ChannelSource::new(["Test Port"]);
        source.open("Test Port").await.unwrap();
        let mut events = source.read_events().unwrap();

        source.send(MidiEvent::note_on(0, 60, 100)).await.unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.note, 60);

        source.close().await.unwrap();
        assert!(events.recv().await.is_none());
        assert_eq!(source.close_count(), 1);
    }

    #[tokio::test]
    async fn test_channel_source_messages_go_through_the_wire_format() {
        let source = ChannelSource::new(["A"]);
        source.open("A").await.unwrap();
        let mut events = source.read_events().unwrap();

        let sent = source
            .send_message(MidiMessage::NoteOn { channel: 2, note: 40, velocity: 0 })
            .await
            .unwrap();
        assert!(sent);
        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::NoteOff);
        assert_eq!((event.channel, event.note), (2, 40));

        for unmapped in [
            MidiMessage::PolyPressure { channel: 0, note: 1, pressure: 2 },
            MidiMessage::ChannelPressure { channel: 0, pressure: 9 },
            MidiMessage::PitchBend { channel: 0, value: 8192 },
        ] {
            assert!(!source.send_message(unmapped).await.unwrap());
        }

        assert!(source
            .send_message(MidiMessage::ControlChange { channel: 1, controller: 7, value: 127 })
            .await
            .unwrap());
        let event = events.recv().await.unwrap();
        assert_eq!((event.kind, event.controller, event.value), (EventKind::ControlChange, 7, 127));
    }

    #[tokio::test]
    async fn test_channel_source_stream_taken_once() {
        let source = ChannelSource::new(["A"]);
        assert!(source.read_events().is_err());

        source.open("A").await.unwrap();
        assert!(source.read_events().is_ok());
        assert!(source.read_events().is_err());
    }

    #[tokio::test]
    async fn test_channel_source_close_without_open_is_noop() {
        let source = ChannelSource::new(Vec::<String>::new());
        source.close().await.unwrap();
        source.close().await.unwrap();
        assert_eq!(source.close_count(), 0);
        assert!(source.port_names().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_channel_source_open_error() {
        let source = ChannelSource::new(["A"]).with_open_error("device busy");
        let err = source.open("A").await.unwrap_err();
        assert!(err.to_string().contains("device busy"));
        assert_eq!(source.open_count(), 0);
        assert!(!source.is_open());
    }
}
