//! Dispatch loop - turns incoming MIDI events into actions
//!
//! A [`Dispatcher`] owns the lifecycle (`idle → running → stopped`), the
//! ingestion task reading the event source, and the fan-out of matched
//! mappings to the [`ActionRegistry`]. Each fan-out runs as its own task;
//! its outcome is logged and, when someone subscribed, sent as a
//! [`DispatchReport`].

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::actions::{ActionError, ActionRegistry, Outcome};
use crate::config::AppConfig;
use crate::matcher;
use crate::midi::{EventSource, MidiEvent};

/// Lifecycle failures
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher is already running")]
    AlreadyRunning,

    #[error("dispatcher has been closed")]
    Closed,

    #[error("no MIDI input ports available")]
    NoInputPorts,

    #[error("failed to open MIDI input '{port}': {source:#}")]
    PortOpen {
        port: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("MIDI transport error: {0:#}")]
    Transport(#[source] anyhow::Error),

    #[error("MIDI event stream ended unexpectedly")]
    StreamEnded,
}

/// Outcome of one fan-out task
#[derive(Debug)]
pub struct DispatchReport {
    pub mapping: String,
    pub action_type: String,
    pub result: Result<Outcome, ActionError>,
}

enum Phase {
    Idle,
    /// `start` is opening the transport
    Starting,
    Running {
        stop: CancellationToken,
        ingest: JoinHandle<()>,
    },
    Stopped,
}

/// Matching and fan-out, shared with the ingestion task
struct Core {
    config: Arc<AppConfig>,
    registry: Arc<ActionRegistry>,
    reports: Mutex<Option<mpsc::UnboundedSender<DispatchReport>>>,
}

impl Core {
    async fn dispatch(&self, event: &MidiEvent, stop: &CancellationToken) -> Vec<JoinHandle<()>> {
        if !self.config.midi.accepts_channel(event.channel) {
            debug!(event = %event, "Event on filtered channel, ignoring");
            return Vec::new();
        }

        let delay = self.config.general.action_delay();
        let mut paced = !delay.is_zero();
        let mut launched = Vec::new();

        for mapping in self.config.mappings.iter().filter(|m| m.enabled) {
            if !matcher::matches(event, &mapping.event) {
                continue;
            }
            debug!(mapping = %mapping.name, event = %event, "Event matched");

            let registry = self.registry.clone();
            let action = mapping.action.clone();
            let name = mapping.name.clone();
            let reports = self.reports.lock().clone();

            launched.push(tokio::spawn(async move {
                let result = registry.execute(&action).await;
                match &result {
                    Ok(Outcome::Spawned { pid }) => {
                        info!(mapping = %name, action = %action.action_type, pid, "✅ Action dispatched")
                    }
                    Ok(Outcome::Completed) => {
                        info!(mapping = %name, action = %action.action_type, "✅ Action dispatched")
                    }
                    Err(e) => error!(mapping = %name, action = %action.action_type, error = %e, "❌ Action failed"),
                }

                if let Some(tx) = reports {
                    let _ = tx.send(DispatchReport {
                        mapping: name,
                        action_type: action.action_type,
                        result,
                    });
                }
            }));

            // Pacing between mappings of this event; the fan-out above is not delayed.
            // Once stopped, the remaining matches of this event launch without pacing.
            if paced {
                tokio::select! {
                    _ = stop.cancelled() => paced = false,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        launched
    }
}

/// The dispatch loop
pub struct Dispatcher {
    core: Arc<Core>,
    source: Arc<dyn EventSource>,
    phase: Mutex<Phase>,
}

impl Dispatcher {
    pub fn new(config: Arc<AppConfig>, registry: Arc<ActionRegistry>, source: Arc<dyn EventSource>) -> Self {
        Self {
            core: Arc::new(Core {
                config,
                registry,
                reports: Mutex::new(None),
            }),
            source,
            phase: Mutex::new(Phase::Idle),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.phase.lock(), Phase::Running { .. })
    }

    /// Receive a report for every fan-out launched from now on.
    ///
    /// Only the latest subscriber receives reports.
    pub fn subscribe_reports(&self) -> mpsc::UnboundedReceiver<DispatchReport> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.core.reports.lock() = Some(tx);
        rx
    }

    /// Match one event against the mappings and launch the matched actions.
    ///
    /// Returns once every matched mapping has been launched (and paced);
    /// the returned handles complete when the actions do.
    pub async fn dispatch_event(&self, event: &MidiEvent) -> Vec<JoinHandle<()>> {
        self.core.dispatch(event, &CancellationToken::new()).await
    }

    fn resolve_port(&self) -> Result<String, DispatchError> {
        if let Some(port) = &self.core.config.midi.input_port {
            return Ok(port.clone());
        }

        let names = self.source.port_names().map_err(DispatchError::Transport)?;
        debug!(ports = ?names, "Available MIDI inputs");
        let first = names.into_iter().next().ok_or(DispatchError::NoInputPorts)?;
        info!(port = %first, "No input port configured, using the first one");
        Ok(first)
    }

    /// Leave `Starting` after a failed start, unless closed meanwhile
    fn abort_start(&self) {
        let mut phase = self.phase.lock();
        if matches!(*phase, Phase::Starting) {
            *phase = Phase::Idle;
        }
    }

    async fn release_source(&self) {
        if let Err(e) = self.source.close().await {
            warn!(error = %format!("{:#}", e), "Failed to close MIDI input");
        }
    }

    /// Open the input and process events until `shutdown` fires or
    /// [`close`](Self::close) is called.
    ///
    /// Fails without entering the running state when already running, when
    /// closed, or when the input cannot be opened. Returns
    /// [`DispatchError::StreamEnded`] when the transport ends the event
    /// stream on its own.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<(), DispatchError> {
        {
            let mut phase = self.phase.lock();
            match *phase {
                Phase::Idle => *phase = Phase::Starting,
                Phase::Starting | Phase::Running { .. } => return Err(DispatchError::AlreadyRunning),
                Phase::Stopped => return Err(DispatchError::Closed),
            }
        }

        let port = match self.resolve_port() {
            Ok(port) => port,
            Err(e) => {
                self.abort_start();
                return Err(e);
            }
        };

        if let Err(source) = self.source.open(&port).await {
            self.abort_start();
            return Err(DispatchError::PortOpen { port, source });
        }

        let events = match self.source.read_events() {
            Ok(events) => events,
            Err(e) => {
                self.release_source().await;
                self.abort_start();
                return Err(DispatchError::Transport(e));
            }
        };

        let stop = shutdown.child_token();
        let ingest = tokio::spawn(ingest(self.core.clone(), events, stop.clone()));

        let closed_meanwhile = {
            let mut phase = self.phase.lock();
            if matches!(*phase, Phase::Starting) {
                *phase = Phase::Running { stop: stop.clone(), ingest };
                false
            } else {
                stop.cancel();
                true
            }
        };
        if closed_meanwhile {
            self.release_source().await;
            return Err(DispatchError::Closed);
        }

        info!(
            port = %port,
            mappings = self.core.config.mappings.iter().filter(|m| m.enabled).count(),
            "🎹 Dispatch loop started"
        );

        stop.cancelled().await;

        let explicitly_closed = matches!(*self.phase.lock(), Phase::Stopped);
        self.close().await;

        if explicitly_closed || shutdown.is_cancelled() {
            Ok(())
        } else {
            Err(DispatchError::StreamEnded)
        }
    }

    /// Stop ingesting and release the input. Later calls are no-ops, and so
    /// is closing a dispatcher that never started.
    ///
    /// Actions already launched keep running.
    pub async fn close(&self) {
        let previous = {
            let mut phase = self.phase.lock();
            match *phase {
                Phase::Idle | Phase::Stopped => return,
                _ => std::mem::replace(&mut *phase, Phase::Stopped),
            }
        };

        // A start still opening the input notices and releases it itself
        let Phase::Running { stop, ingest } = previous else {
            return;
        };

        stop.cancel();
        self.release_source().await;
        if let Err(e) = ingest.await {
            warn!("Ingestion task ended abnormally: {}", e);
        }
        info!("🛑 Dispatch loop stopped");
    }
}

async fn ingest(core: Arc<Core>, mut events: mpsc::Receiver<MidiEvent>, stop: CancellationToken) {
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            received = events.recv() => match received {
                Some(event) => {
                    core.dispatch(&event, &stop).await;
                }
                None => {
                    if !stop.is_cancelled() {
                        warn!("MIDI event stream ended");
                    }
                    // Wake `start` so it can tear down
                    stop.cancel();
                    break;
                }
            }
        }
    }
    debug!("Ingestion task finished");
}

/// Wait before restart attempt `attempt` (1-based): 250ms per attempt, at most 10s
pub fn restart_delay(attempt: u32) -> Duration {
    Duration::from_millis((250 * u64::from(attempt)).min(10_000))
}

/// A mapping whose action failed validation
#[derive(Debug)]
pub struct MappingFailure {
    /// Position in `config.mappings`; names need not be unique
    pub index: usize,
    pub name: String,
    pub error: ActionError,
}

/// Validate every mapping's action against the registry.
///
/// Returns the failing mappings in configuration order.
pub async fn check_mappings(config: &AppConfig, registry: &ActionRegistry) -> Vec<MappingFailure> {
    let mut failures = Vec::new();
    for (index, mapping) in config.mappings.iter().enumerate() {
        if let Err(error) = registry.validate(&mapping.action).await {
            failures.push(MappingFailure {
                index,
                name: mapping.name.clone(),
                error,
            });
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Action, EventFilter, GeneralConfig, Mapping, MidiConfig, ALL_CHANNELS};
    use crate::midi::ChannelSource;
    use crate::platform::{ConsoleCall, ConsolePlatform, Platform};
    use crate::actions::Executor;
    use async_trait::async_trait;

    const WAIT: Duration = Duration::from_secs(2);

    /// Records every action it runs; fails for actions carrying `fail: true`
    #[derive(Default)]
    struct Recorder {
        seen: parking_lot::Mutex<Vec<Action>>,
    }

    #[async_trait]
    impl Executor for Recorder {
        fn name(&self) -> &str {
            "record"
        }

        async fn execute(&self, action: &Action) -> anyhow::Result<Outcome> {
            self.seen.lock().push(action.clone());
            if action.parameters.get("fail").and_then(|v| v.as_bool()) == Some(true) {
                anyhow::bail!("recorder asked to fail");
            }
            Ok(Outcome::Completed)
        }
    }

    fn record(tag: &str) -> Action {
        Action::new("record").with_param("tag", tag)
    }

    fn config(channel: i8, delay_ms: u64, mappings: Vec<Mapping>) -> Arc<AppConfig> {
        Arc::new(AppConfig {
            midi: MidiConfig { input_port: None, channel },
            general: GeneralConfig { action_delay_ms: delay_ms, ..GeneralConfig::default() },
            mappings,
        })
    }

    fn recorder_registry() -> (Arc<Recorder>, Arc<ActionRegistry>) {
        let recorder = Arc::new(Recorder::default());
        let registry = ActionRegistry::new();
        registry.register(recorder.clone());
        (recorder, Arc::new(registry))
    }

    async fn join_all(handles: Vec<JoinHandle<()>>) -> usize {
        let count = handles.len();
        for handle in handles {
            handle.await.unwrap();
        }
        count
    }

    async fn wait_running(dispatcher: &Dispatcher) {
        tokio::time::timeout(WAIT, async {
            while !dispatcher.is_running() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("dispatcher did not start");
    }

    #[tokio::test]
    async fn test_every_enabled_match_fires_once() {
        let filter = EventFilter::note_on(60, 0);
        let mappings = vec![
            Mapping::new("a", filter, record("a")),
            Mapping::new("b", filter, record("b")).disabled(),
            Mapping::new("c", filter, record("c")),
            Mapping::new("other note", EventFilter::note_on(61, 0), record("d")),
        ];
        let (recorder, registry) = recorder_registry();
        let dispatcher = Dispatcher::new(config(ALL_CHANNELS, 0, mappings), registry, Arc::new(ChannelSource::new(["A"])));

        let fired = join_all(dispatcher.dispatch_event(&MidiEvent::note_on(0, 60, 100)).await).await;
        assert_eq!(fired, 2);

        let mut tags: Vec<String> = recorder
            .seen
            .lock()
            .iter()
            .map(|a| a.parameters["tag"].as_str().unwrap().to_string())
            .collect();
        tags.sort();
        assert_eq!(tags, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_channel_filter() {
        let mappings = vec![Mapping::new("pc", EventFilter::program_change(3), record("pc"))];
        let (recorder, registry) = recorder_registry();
        let dispatcher = Dispatcher::new(config(2, 0, mappings.clone()), registry.clone(), Arc::new(ChannelSource::new(["A"])));

        assert_eq!(join_all(dispatcher.dispatch_event(&MidiEvent::program_change(5, 3)).await).await, 0);
        assert_eq!(join_all(dispatcher.dispatch_event(&MidiEvent::program_change(2, 3)).await).await, 1);

        let any_channel = Dispatcher::new(config(ALL_CHANNELS, 0, mappings), registry, Arc::new(ChannelSource::new(["A"])));
        for channel in 0..16 {
            join_all(any_channel.dispatch_event(&MidiEvent::program_change(channel, 3)).await).await;
        }
        assert_eq!(recorder.seen.lock().len(), 17);
    }

    #[tokio::test]
    async fn test_volume_threshold_scenario() {
        let console = Arc::new(ConsolePlatform::new());
        let registry = Arc::new(ActionRegistry::with_builtins(&Platform::console(console.clone())));
        let mappings = vec![Mapping::new(
            "Volume up",
            EventFilter::control_change(7, 64),
            Action::new("volume").with_param("direction", "up").with_param("percent", 5),
        )];
        let dispatcher = Dispatcher::new(config(ALL_CHANNELS, 0, mappings), registry, Arc::new(ChannelSource::new(["A"])));

        assert_eq!(join_all(dispatcher.dispatch_event(&MidiEvent::control_change(3, 7, 90)).await).await, 1);
        assert_eq!(console.calls(), vec![ConsoleCall::SetVolume(55)]);

        assert_eq!(join_all(dispatcher.dispatch_event(&MidiEvent::control_change(3, 7, 30)).await).await, 0);
        assert_eq!(console.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_isolated_and_reported() {
        let filter = EventFilter::control_change(1, 0);
        let mappings = vec![
            Mapping::new("missing", filter, Action::new("unknown_type")),
            Mapping::new("broken", filter, record("x").with_param("fail", true)),
            Mapping::new("fine", filter, record("y")),
        ];
        let (recorder, registry) = recorder_registry();
        let dispatcher = Dispatcher::new(config(ALL_CHANNELS, 0, mappings), registry, Arc::new(ChannelSource::new(["A"])));
        let mut reports = dispatcher.subscribe_reports();

        join_all(dispatcher.dispatch_event(&MidiEvent::control_change(0, 1, 1)).await).await;

        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(reports.recv().await.unwrap());
        }
        received.sort_by(|a, b| a.mapping.cmp(&b.mapping));

        assert_eq!(received[0].mapping, "broken");
        assert!(matches!(received[0].result, Err(ActionError::Failed { .. })));
        assert!(received[1].result.is_ok());
        assert_eq!(received[2].action_type, "unknown_type");
        let err = received[2].result.as_ref().unwrap_err();
        assert!(err.to_string().contains("unknown_type"));
        assert_eq!(recorder.seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_delay_paces_mapping_evaluation() {
        let filter = EventFilter::note_on(1, 0);
        let mappings = vec![Mapping::new("a", filter, record("a")), Mapping::new("b", filter, record("b"))];
        let (_, registry) = recorder_registry();
        let dispatcher = Dispatcher::new(config(ALL_CHANNELS, 30, mappings), registry, Arc::new(ChannelSource::new(["A"])));
        let mut reports = dispatcher.subscribe_reports();

        let started = std::time::Instant::now();
        let handles = dispatcher.dispatch_event(&MidiEvent::note_on(0, 1, 1)).await;
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(handles.len(), 2);

        // The first action did not wait for the second mapping's pacing
        assert_eq!(reports.try_recv().unwrap().mapping, "a");
    }

    #[tokio::test]
    async fn test_close_during_pacing_still_fires_every_match() {
        let source = Arc::new(ChannelSource::new(["A"]));
        let filter = EventFilter::note_on(5, 0);
        let mappings = vec![
            Mapping::new("a", filter, record("a")),
            Mapping::new("b", filter, record("b")),
            Mapping::new("c", filter, record("c")),
        ];
        let (recorder, registry) = recorder_registry();
        let dispatcher = Arc::new(Dispatcher::new(config(ALL_CHANNELS, 300, mappings), registry, source.clone()));
        let mut reports = dispatcher.subscribe_reports();

        let run = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.start(CancellationToken::new()).await }
        });
        wait_running(&dispatcher).await;

        source.send(MidiEvent::note_on(0, 5, 100)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let started = std::time::Instant::now();
        dispatcher.close().await;
        tokio::time::timeout(WAIT, run).await.unwrap().unwrap().unwrap();
        // Closing cut the pacing short
        assert!(started.elapsed() < Duration::from_millis(500));

        let mut fired = Vec::new();
        for _ in 0..3 {
            let report = tokio::time::timeout(WAIT, reports.recv()).await.unwrap().unwrap();
            fired.push(report.mapping);
        }
        fired.sort();
        assert_eq!(fired, vec!["a", "b", "c"]);
        assert_eq!(recorder.seen.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_events_flow_through_running_loop() {
        let source = Arc::new(ChannelSource::new(["Launchpad", "Other"]));
        let mappings = vec![Mapping::new("pad", EventFilter::note_on(36, 0), record("pad"))];
        let (recorder, registry) = recorder_registry();
        let dispatcher = Arc::new(Dispatcher::new(config(ALL_CHANNELS, 0, mappings), registry, source.clone()));
        let mut reports = dispatcher.subscribe_reports();
        let shutdown = CancellationToken::new();

        let run = tokio::spawn({
            let dispatcher = dispatcher.clone();
            let shutdown = shutdown.clone();
            async move { dispatcher.start(shutdown).await }
        });
        wait_running(&dispatcher).await;
        assert_eq!(source.opened_port().as_deref(), Some("Launchpad"));

        source.send(MidiEvent::note_on(0, 36, 127)).await.unwrap();
        source.send(MidiEvent::note_on(0, 37, 127)).await.unwrap();
        source.send(MidiEvent::note_on(4, 36, 1)).await.unwrap();
        for _ in 0..2 {
            let report = tokio::time::timeout(WAIT, reports.recv()).await.unwrap().unwrap();
            assert_eq!(report.mapping, "pad");
        }

        shutdown.cancel();
        tokio::time::timeout(WAIT, run).await.unwrap().unwrap().unwrap();
        assert!(!dispatcher.is_running());
        assert!(!source.is_open());
        assert_eq!(recorder.seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_start_only_one_wins() {
        let source = Arc::new(ChannelSource::new(["A"]));
        let (_, registry) = recorder_registry();
        let dispatcher = Arc::new(Dispatcher::new(config(ALL_CHANNELS, 0, vec![]), registry, source.clone()));
        let shutdown = CancellationToken::new();

        let starts: Vec<_> = (0..2)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { dispatcher.start(shutdown).await })
            })
            .collect();

        wait_running(&dispatcher).await;
        shutdown.cancel();

        let mut results = Vec::new();
        for start in starts {
            results.push(tokio::time::timeout(WAIT, start).await.unwrap().unwrap());
        }
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results.iter().filter(|r| matches!(r, Err(DispatchError::AlreadyRunning))).count(),
            1
        );
        assert_eq!(source.open_count(), 1);
    }

    #[tokio::test]
    async fn test_double_close_releases_once() {
        let source = Arc::new(ChannelSource::new(["A"]));
        let (_, registry) = recorder_registry();
        let dispatcher = Arc::new(Dispatcher::new(config(ALL_CHANNELS, 0, vec![]), registry, source.clone()));

        let run = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.start(CancellationToken::new()).await }
        });
        wait_running(&dispatcher).await;

        dispatcher.close().await;
        dispatcher.close().await;

        tokio::time::timeout(WAIT, run).await.unwrap().unwrap().unwrap();
        assert_eq!(source.close_count(), 1);
        assert!(matches!(
            dispatcher.start(CancellationToken::new()).await,
            Err(DispatchError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_close_before_start_is_noop() {
        let source = Arc::new(ChannelSource::new(["A"]));
        let (_, registry) = recorder_registry();
        let dispatcher = Dispatcher::new(config(ALL_CHANNELS, 0, vec![]), registry, source.clone());
        dispatcher.close().await;
        assert_eq!(source.close_count(), 0);
        assert!(!dispatcher.is_running());
    }

    #[tokio::test]
    async fn test_start_failures_leave_dispatcher_idle() {
        let (_, registry) = recorder_registry();

        let empty = Dispatcher::new(config(ALL_CHANNELS, 0, vec![]), registry.clone(), Arc::new(ChannelSource::new(Vec::<String>::new())));
        assert!(matches!(empty.start(CancellationToken::new()).await, Err(DispatchError::NoInputPorts)));
        assert!(!empty.is_running());
        assert!(matches!(empty.start(CancellationToken::new()).await, Err(DispatchError::NoInputPorts)));

        let busy = Dispatcher::new(
            config(ALL_CHANNELS, 0, vec![]),
            registry,
            Arc::new(ChannelSource::new(["A"]).with_open_error("device busy")),
        );
        let err = busy.start(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, DispatchError::PortOpen { ref port, .. } if port == "A"));
        assert!(err.to_string().contains("device busy"));
    }

    #[tokio::test]
    async fn test_transport_loss_ends_start_with_error() {
        let source = Arc::new(ChannelSource::new(["A"]));
        let (_, registry) = recorder_registry();
        let dispatcher = Arc::new(Dispatcher::new(config(ALL_CHANNELS, 0, vec![]), registry, source.clone()));

        let run = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.start(CancellationToken::new()).await }
        });
        wait_running(&dispatcher).await;

        // Device unplugged: the stream ends without anyone closing the dispatcher
        source.close().await.unwrap();

        let result = tokio::time::timeout(WAIT, run).await.unwrap().unwrap();
        assert!(matches!(result, Err(DispatchError::StreamEnded)));
        assert!(!dispatcher.is_running());
    }

    #[test]
    fn test_restart_delay_is_linear_then_capped() {
        assert_eq!(restart_delay(1), Duration::from_millis(250));
        assert_eq!(restart_delay(4), Duration::from_secs(1));
        assert_eq!(restart_delay(40), Duration::from_secs(10));
        assert_eq!(restart_delay(u32::MAX), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_check_mappings_reports_bad_actions() {
        let console = Arc::new(ConsolePlatform::new());
        let registry = ActionRegistry::with_builtins(&Platform::console(console));
        let mappings = vec![
            Mapping::new("ok", EventFilter::note_on(1, 0), Action::new("volume")),
            Mapping::new("bad", EventFilter::note_on(2, 0), Action::new("volume").with_param("percent", 500)),
            Mapping::new("nobody", EventFilter::note_on(3, 0), Action::new("teleport")),
        ];
        let failures = check_mappings(&config(ALL_CHANNELS, 0, mappings), &registry).await;
        let names: Vec<&str> = failures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["bad", "nobody"]);
    }

    #[tokio::test]
    async fn test_check_mappings_tells_duplicate_names_apart() {
        let registry = ActionRegistry::with_builtins(&Platform::console(Arc::new(ConsolePlatform::new())));
        let mappings = vec![
            Mapping::new("pad", EventFilter::note_on(1, 0), Action::new("volume")),
            Mapping::new("pad", EventFilter::note_on(2, 0), Action::new("volume").with_param("percent", 0)),
        ];
        let failures = check_mappings(&config(ALL_CHANNELS, 0, mappings), &registry).await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 1);
        assert!(failures[0].error.to_string().contains("percent"));
    }
}
