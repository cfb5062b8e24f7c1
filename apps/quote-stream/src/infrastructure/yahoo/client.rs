//! Quote Stream Client
//!
//! `ConnectionManager` owns one streaming session: the transport connection,
//! the connection state machine, and the wiring between inbound frames,
//! the decoder, the metrics engine, the heartbeat monitor, the reconnect
//! policy and the auto-refresh scheduler.
//!
//! # Concurrency
//!
//! All session state lives on a single driver task spawned by `connect()`.
//! The driver runs one `select!` loop over the cancellation token, the
//! heartbeat and refresh timers, the control command queue and the current
//! connection phase. Public methods never block: they enqueue a command or
//! flip a flag.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ─connect()─► Connecting ─open─► Open ─lost─► Closing ─► Reconnecting ─delay─► Connecting
//!                        │                             └─► Terminated (reconnect disabled)
//!                        └─failed─► Closing
//! any ─close()─► Terminated
//! ```
//!
//! `close()` is the only cancellation path. After it, nothing is emitted
//! except exactly one `shutdown` event.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::SinkExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::application::ports::{
    Connection, EventSink, InboundFrame, Transport, TransportError,
};
use crate::domain::metrics::{MetricsEngine, MetricsReport};
use crate::domain::streaming::{
    CloseInfo, CloseReason, ConnectionState, ErrorInfo, ErrorKind, RawFrame, ShutdownInfo,
    StreamEvent,
};
use crate::domain::subscription::{SubscriptionCommand, SymbolRegistry};
use crate::infrastructure::config::{ConfigError, StreamConfig};
use crate::infrastructure::metrics::{self as prom, FrameType};
use crate::infrastructure::yahoo::clock::SessionClock;
use crate::infrastructure::yahoo::codec::{Decoded, MessageDecoder};
use crate::infrastructure::yahoo::heartbeat::HeartbeatMonitor;
use crate::infrastructure::yahoo::reconnect::ReconnectPolicy;
use crate::infrastructure::yahoo::refresh::RefreshScheduler;
use crate::infrastructure::yahoo::transport::WebSocketTransport;

// =============================================================================
// Public Types
// =============================================================================

/// Point-in-time view of a session, for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatus {
    /// Session identifier.
    pub session_id: String,
    /// Current state.
    pub state: ConnectionState,
    /// Subscribed symbols, sorted.
    pub symbols: Vec<String>,
    /// Unintended closes since the last successful open.
    pub reconnect_attempts: u32,
    /// Time of the last inbound data frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_time: Option<DateTime<Utc>>,
    /// Most recent heartbeat verdict.
    pub alive: bool,
}

/// Client for one push-pricing streaming session.
///
/// Cheap to clone; clones share the session.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use quote_stream::application::ports::NoOpEventSink;
/// use quote_stream::infrastructure::config::StreamConfig;
/// use quote_stream::infrastructure::yahoo::ConnectionManager;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = ConnectionManager::with_websocket(StreamConfig::default(), Arc::new(NoOpEventSink))?;
/// manager.subscribe(["AAPL", "MSFT"]);
/// manager.connect();
/// manager.close_on(async {
///     let _ = tokio::signal::ctrl_c().await;
/// });
/// manager.stopped().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("session_id", &self.shared.session_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Shared State
// =============================================================================

enum Command {
    /// Registry change to forward while open.
    Sync {
        command: SubscriptionCommand,
        generation: u64,
    },
    /// Drop the live connection as an unintended close.
    ForceReconnect,
}

#[derive(Default)]
struct Subscriptions {
    registry: SymbolRegistry,
    /// Bumped on every registry change; lets the driver skip commands
    /// already covered by a full replay.
    generation: u64,
}

#[derive(Default)]
struct Lifecycle {
    close_requested: bool,
    driver_started: bool,
    driver_running: bool,
    state_at_close: Option<ConnectionState>,
}

#[derive(Default)]
struct StatusMirror {
    reconnect_attempts: u32,
    last_message_time: Option<DateTime<Utc>>,
    alive: bool,
}

struct Shared {
    config: StreamConfig,
    session_id: String,
    clock: SessionClock,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    finished: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
    subscriptions: Mutex<Subscriptions>,
    status: Mutex<StatusMirror>,
    state: watch::Sender<ConnectionState>,
    commands: mpsc::UnboundedSender<Command>,
    command_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Move to `next` unless already terminated.
    fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            tracing::debug!(state = %next, "State changed");
            prom::set_connection_state(next);
        }
    }

    /// Publish unless the session has been closed.
    fn emit(&self, event: StreamEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.sink.publish(event);
    }

    fn emit_error(&self, kind: ErrorKind, message: String) {
        self.emit(StreamEvent::Error(ErrorInfo {
            kind,
            message,
            timestamp: self.clock.now(),
        }));
    }

    fn publish_shutdown(&self, previous_state: ConnectionState) {
        tracing::info!(previous_state = %previous_state, "Session shut down");
        self.sink.publish(StreamEvent::Shutdown(ShutdownInfo {
            session_id: self.session_id.clone(),
            previous_state,
            timestamp: self.clock.now(),
        }));
    }
}

// =============================================================================
// Connection Manager
// =============================================================================

impl ConnectionManager {
    /// Create a session over an arbitrary transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn new(
        config: StreamConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        Self::with_clock(config, transport, sink, SessionClock::start())
    }

    /// Create a session whose timestamps start at `origin`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn with_origin(
        config: StreamConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn EventSink>,
        origin: DateTime<Utc>,
    ) -> Result<Self, ConfigError> {
        Self::with_clock(config, transport, sink, SessionClock::anchored_at(origin))
    }

    /// Create a session over the WebSocket transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn with_websocket(
        config: StreamConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        Self::new(config, Arc::new(WebSocketTransport::new()), sink)
    }

    fn with_clock(
        config: StreamConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn EventSink>,
        clock: SessionClock,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (state, _) = watch::channel(ConnectionState::Idle);
        let (commands, command_rx) = mpsc::unbounded_channel();

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                session_id: uuid::Uuid::new_v4().to_string(),
                clock,
                transport,
                sink,
                cancel: CancellationToken::new(),
                finished: CancellationToken::new(),
                lifecycle: Mutex::new(Lifecycle::default()),
                subscriptions: Mutex::new(Subscriptions::default()),
                status: Mutex::new(StatusMirror {
                    alive: true,
                    ..StatusMirror::default()
                }),
                state,
                commands,
                command_rx: Mutex::new(Some(command_rx)),
            }),
        })
    }

    /// Start the session.
    ///
    /// Only acts from `Idle`; later calls are no-ops. Must be called from
    /// within a tokio runtime, otherwise an `error` event is emitted and the
    /// session stays idle.
    pub fn connect(&self) {
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.close_requested || lifecycle.driver_started {
            tracing::debug!(state = %self.state(), "connect() ignored");
            return;
        }

        let Ok(handle) = Handle::try_current() else {
            drop(lifecycle);
            tracing::error!("connect() called outside a tokio runtime");
            self.shared
                .emit_error(ErrorKind::Runtime, "no tokio runtime available".to_string());
            return;
        };
        let Some(commands) = self.shared.command_rx.lock().take() else {
            return;
        };

        lifecycle.driver_started = true;
        lifecycle.driver_running = true;
        drop(lifecycle);

        let span = tracing::info_span!("quote_stream", session_id = %self.shared.session_id);
        let driver = Driver::new(Arc::clone(&self.shared));
        handle.spawn(driver.run(commands).instrument(span));
    }

    /// Add symbols; sends a subscribe command for the new ones when open.
    pub fn subscribe<I, S>(&self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.update_registry(|registry| registry.add(symbols));
    }

    /// Remove symbols; sends an unsubscribe command for the removed ones when open.
    pub fn unsubscribe<I, S>(&self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.update_registry(|registry| registry.remove(symbols));
    }

    fn update_registry(
        &self,
        change: impl FnOnce(&mut SymbolRegistry) -> Option<SubscriptionCommand>,
    ) {
        let mut subscriptions = self.shared.subscriptions.lock();
        let Some(command) = change(&mut subscriptions.registry) else {
            return;
        };
        subscriptions.generation += 1;
        let generation = subscriptions.generation;
        prom::set_subscribed_symbols(subscriptions.registry.len());
        tracing::info!(
            command = command.verb(),
            symbols = ?command.symbols(),
            "Subscription changed"
        );
        // Sent under the lock so commands reach the driver in change order.
        if self
            .shared
            .commands
            .send(Command::Sync {
                command,
                generation,
            })
            .is_err()
        {
            tracing::debug!("Driver stopped; change kept in registry only");
        }
    }

    /// Drop the live connection as if the feed had closed it.
    ///
    /// The reconnect policy then takes over. Ignored unless open.
    pub fn force_reconnect(&self) {
        if self.shared.commands.send(Command::ForceReconnect).is_err() {
            tracing::debug!("force_reconnect() ignored; driver stopped");
        }
    }

    /// Terminate the session.
    ///
    /// Idempotent and safe from any state. Cancels all timers and releases
    /// the transport without a close handshake; exactly one `shutdown`
    /// event follows.
    pub fn close(&self) {
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.close_requested {
            return;
        }
        lifecycle.close_requested = true;

        let previous = self.shared.state();
        lifecycle.state_at_close = Some(previous);
        self.shared.set_state(ConnectionState::Terminated);
        self.shared.cancel.cancel();

        if lifecycle.driver_running {
            tracing::info!(state = %previous, "Close requested");
            return;
        }
        drop(lifecycle);

        self.shared.publish_shutdown(previous);
        self.shared.finished.cancel();
    }

    /// Call `close()` when `signal` resolves.
    ///
    /// The session itself installs no signal handlers; the embedding
    /// application decides what shuts it down.
    pub fn close_on<F>(&self, signal: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            tracing::error!("close_on() called outside a tokio runtime");
            self.shared
                .emit_error(ErrorKind::Runtime, "no tokio runtime available".to_string());
            return;
        };
        let manager = self.clone();
        let finished = self.shared.finished.clone();
        handle.spawn(async move {
            tokio::select! {
                () = signal => {
                    tracing::info!("Shutdown signal received");
                    manager.close();
                }
                () = finished.cancelled() => {}
            }
        });
    }

    /// Wait until the session has stopped.
    ///
    /// Resolves after `close()` (once `shutdown` is emitted) or after the
    /// session terminates on its own with reconnect disabled.
    pub async fn stopped(&self) {
        self.shared.finished.cancelled().await;
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Subscribed symbols, sorted.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        self.shared.subscriptions.lock().registry.snapshot()
    }

    /// Session identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &StreamConfig {
        &self.shared.config
    }

    /// Snapshot for health reporting.
    #[must_use]
    pub fn status(&self) -> StreamStatus {
        let (reconnect_attempts, last_message_time, alive) = {
            let status = self.shared.status.lock();
            (
                status.reconnect_attempts,
                status.last_message_time,
                status.alive,
            )
        };
        StreamStatus {
            session_id: self.shared.session_id.clone(),
            state: self.state(),
            symbols: self.symbols(),
            reconnect_attempts,
            last_message_time,
            alive,
        }
    }
}

// =============================================================================
// Driver
// =============================================================================

enum Phase {
    Connecting(BoxFuture<'static, Result<Connection, TransportError>>),
    Open(Connection),
    Backoff(Pin<Box<Sleep>>),
    Stopped,
}

enum PhaseEvent {
    Opened(Connection),
    ConnectFailed(TransportError),
    Frame(InboundFrame),
    StreamFailed(TransportError),
    StreamEnded,
    BackoffElapsed,
}

/// Wait for the current phase to produce its next event.
///
/// Cancel-safe: dropping the future leaves the phase resumable.
async fn next_transition(phase: &mut Phase) -> PhaseEvent {
    match phase {
        Phase::Connecting(open) => match open.as_mut().await {
            Ok(connection) => PhaseEvent::Opened(connection),
            Err(err) => PhaseEvent::ConnectFailed(err),
        },
        Phase::Open(connection) => match connection.stream.next().await {
            Some(Ok(frame)) => PhaseEvent::Frame(frame),
            Some(Err(err)) => PhaseEvent::StreamFailed(err),
            None => PhaseEvent::StreamEnded,
        },
        Phase::Backoff(sleep) => {
            sleep.as_mut().await;
            PhaseEvent::BackoffElapsed
        }
        Phase::Stopped => std::future::pending().await,
    }
}

async fn maybe_tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Periodic timer starting one `period` from now.
///
/// `None` when the first deadline is not representable.
fn ticker(period: std::time::Duration) -> Option<Interval> {
    let Some(start) = Instant::now().checked_add(period) else {
        tracing::warn!(period_ms = period.as_millis(), "Timer period too long; timer disabled");
        return None;
    };
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    Some(interval)
}

/// Marks the driver as exited when dropped.
///
/// Runs on a normal return and when the driver task is torn down after a
/// panic, so `close()` and `stopped()` never wait on a dead driver.
struct DriverExit {
    shared: Arc<Shared>,
    completed: bool,
}

impl Drop for DriverExit {
    fn drop(&mut self) {
        let state_at_close = {
            let mut lifecycle = self.shared.lifecycle.lock();
            lifecycle.driver_running = false;
            if lifecycle.close_requested {
                lifecycle.state_at_close
            } else {
                None
            }
        };
        if !self.completed {
            tracing::error!("Session driver exited abnormally");
            self.shared.emit_error(
                ErrorKind::Runtime,
                "session driver exited abnormally".to_string(),
            );
            self.shared.set_state(ConnectionState::Terminated);
        }
        if let Some(previous) = state_at_close {
            self.shared.publish_shutdown(previous);
        }
        tracing::info!("Session driver stopped");
        self.shared.finished.cancel();
    }
}

struct Driver {
    shared: Arc<Shared>,
    decoder: MessageDecoder,
    metrics: MetricsEngine,
    heartbeat: HeartbeatMonitor,
    policy: ReconnectPolicy,
    refresh: RefreshScheduler,
    /// Registry generation covered by the last full replay.
    flushed_generation: u64,
}

impl Driver {
    fn new(shared: Arc<Shared>) -> Self {
        let config = &shared.config;
        let start = shared.clock.now();
        Self {
            decoder: MessageDecoder::new(),
            metrics: MetricsEngine::new(config.metrics_config(), start),
            heartbeat: HeartbeatMonitor::new(config.heartbeat_config(), start),
            policy: ReconnectPolicy::new(config.reconnect_config()),
            refresh: config.refresh_scheduler(),
            flushed_generation: 0,
            shared,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        tracing::info!(url = %self.shared.config.url, "Session driver started");

        let mut exit = DriverExit {
            shared: Arc::clone(&self.shared),
            completed: false,
        };
        let cancel = self.shared.cancel.clone();
        let mut heartbeat_tick = if self.shared.config.features.heartbeat {
            ticker(self.heartbeat.config().check_interval)
        } else {
            None
        };
        let mut refresh_tick = self.refresh.interval().and_then(ticker);
        let mut phase = self.start_connect();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = maybe_tick(heartbeat_tick.as_mut()) => self.on_heartbeat_tick(),
                () = maybe_tick(refresh_tick.as_mut()) => self.on_refresh_tick(&mut phase).await,
                Some(command) = commands.recv() => self.on_command(&mut phase, command).await,
                event = next_transition(&mut phase) => self.on_phase_event(&mut phase, event).await,
            }

            if matches!(phase, Phase::Stopped) {
                break;
            }
        }

        drop(phase);
        exit.completed = true;
    }

    fn start_connect(&self) -> Phase {
        self.shared.set_state(ConnectionState::Connecting);
        let transport = Arc::clone(&self.shared.transport);
        let url = self.shared.config.url.clone();
        tracing::info!(url = %url, "Connecting");
        Phase::Connecting(Box::pin(async move { transport.open(&url).await }))
    }

    // -------------------------------------------------------------------------
    // Phase Events
    // -------------------------------------------------------------------------

    async fn on_phase_event(&mut self, phase: &mut Phase, event: PhaseEvent) {
        match event {
            PhaseEvent::Opened(connection) => self.on_open(phase, connection).await,
            PhaseEvent::ConnectFailed(err) => {
                tracing::warn!(error = %err, "Connect failed");
                self.report_transport_error(&err);
                self.on_connection_lost(phase, CloseReason::ConnectFailed(err.to_string()));
            }
            PhaseEvent::Frame(frame) => match frame {
                InboundFrame::Text(text) => self.on_data(RawFrame::Text(text)),
                InboundFrame::Binary(bytes) => self.on_data(RawFrame::Binary(bytes)),
                InboundFrame::Ping | InboundFrame::Pong => tracing::trace!("Keepalive frame"),
                InboundFrame::Close(reason) => {
                    tracing::warn!(reason = ?reason, "Feed closed the connection");
                    self.on_connection_lost(phase, CloseReason::RemoteClosed(reason));
                }
            },
            PhaseEvent::StreamFailed(err) => {
                tracing::warn!(error = %err, "Connection failed");
                self.report_transport_error(&err);
                self.on_connection_lost(phase, CloseReason::TransportFailure(err.to_string()));
            }
            PhaseEvent::StreamEnded => {
                tracing::warn!("Connection stream ended");
                self.on_connection_lost(phase, CloseReason::StreamEnded);
            }
            PhaseEvent::BackoffElapsed => *phase = self.start_connect(),
        }
    }

    async fn on_open(&mut self, phase: &mut Phase, connection: Connection) {
        self.policy.reset();
        self.shared.status.lock().reconnect_attempts = 0;
        *phase = Phase::Open(connection);
        self.shared.set_state(ConnectionState::Open);

        let (replay, generation) = {
            let subscriptions = self.shared.subscriptions.lock();
            (subscriptions.registry.replay(), subscriptions.generation)
        };
        self.flushed_generation = generation;
        if let Some(command) = replay {
            if !self.send_command(phase, &command).await {
                return;
            }
        }

        tracing::info!("Connection open");
        self.shared.emit(StreamEvent::Open);
    }

    fn on_connection_lost(&mut self, phase: &mut Phase, reason: CloseReason) {
        *phase = Phase::Stopped;
        self.shared.set_state(ConnectionState::Closing);
        let timestamp = self.shared.clock.now();

        if !self.shared.config.features.reconnect {
            tracing::warn!("Reconnect disabled; terminating session");
            self.shared.emit(StreamEvent::Close(CloseInfo {
                reason,
                will_reconnect: false,
                attempt: None,
                delay_ms: None,
                timestamp,
            }));
            self.shared.set_state(ConnectionState::Terminated);
            return;
        }

        let delay = self.policy.next_delay();
        let attempt = self.policy.attempt_count();
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.shared.status.lock().reconnect_attempts = attempt;
        prom::record_reconnect();
        tracing::warn!(attempt, delay_ms, "Reconnecting");

        self.shared.emit(StreamEvent::Close(CloseInfo {
            reason,
            will_reconnect: true,
            attempt: Some(attempt),
            delay_ms: Some(delay_ms),
            timestamp,
        }));
        self.shared.set_state(ConnectionState::Reconnecting);
        *phase = Phase::Backoff(Box::pin(tokio::time::sleep(delay)));
    }

    fn report_transport_error(&self, err: &TransportError) {
        prom::record_transport_error();
        self.shared.emit_error(ErrorKind::Transport, err.to_string());
    }

    // -------------------------------------------------------------------------
    // Inbound Data
    // -------------------------------------------------------------------------

    fn on_data(&mut self, frame: RawFrame) {
        let now = self.shared.clock.now();
        prom::record_frame_received(match frame {
            RawFrame::Text(_) => FrameType::Text,
            RawFrame::Binary(_) => FrameType::Binary,
        });
        self.heartbeat.touch(now);
        self.shared.status.lock().last_message_time = Some(now);
        self.metrics.record_global(now);

        let decoded = self.decoder.decode(&frame, now);
        self.shared.emit(StreamEvent::Message(frame));

        match decoded {
            Ok(Decoded::Pricing(quote)) => {
                prom::record_quote();
                self.metrics.record_symbol(&quote.symbol, now);
                let latency = self.metrics.record_latency(&quote);
                tracing::trace!(symbol = %quote.symbol, price = quote.price, "Quote");
                self.shared.emit(StreamEvent::Pricing(quote));
                if let Some(latency) = latency {
                    prom::record_quote_latency(latency.latency_ms);
                    self.shared.emit(StreamEvent::Latency(latency));
                }
            }
            Ok(Decoded::Passthrough { kind }) => {
                tracing::trace!(kind = ?kind, "Non-pricing frame");
            }
            Err(err) => {
                prom::record_decode_error(err.kind());
                tracing::warn!(error = %err, "Dropping undecodable frame");
            }
        }

        if let Some(report) = self.metrics.poll_report(now) {
            self.publish_report(report);
        }
    }

    fn publish_report(&self, report: MetricsReport) {
        let verbose = self.shared.config.verbose_metrics;
        if let Some(info) = report.throughput {
            if verbose {
                tracing::info!(count = info.count, interval_minutes = info.interval_minutes, "Global throughput");
            } else {
                tracing::debug!(count = info.count, "Global throughput");
            }
            self.shared.emit(StreamEvent::Throughput(info));
        }
        if let Some(info) = report.symbol_throughput {
            if verbose {
                tracing::info!(counts = ?info.per_symbol_count, "Per-symbol throughput");
            }
            self.shared.emit(StreamEvent::SymbolThroughput(info));
        }
        if let Some(info) = report.symbol_averages {
            if verbose {
                tracing::info!(
                    averages = ?info.per_symbol_average,
                    window = info.window_size,
                    "Per-symbol moving averages"
                );
            }
            self.shared.emit(StreamEvent::SymbolAverages(info));
        }
    }

    // -------------------------------------------------------------------------
    // Timers and Commands
    // -------------------------------------------------------------------------

    fn on_heartbeat_tick(&mut self) {
        let info = self.heartbeat.check(self.shared.clock.now());
        prom::set_heartbeat_alive(info.alive);
        self.shared.status.lock().alive = info.alive;
        self.shared.emit(StreamEvent::Heartbeat(info));
    }

    async fn on_refresh_tick(&mut self, phase: &mut Phase) {
        let commands = {
            let subscriptions = self.shared.subscriptions.lock();
            self.refresh
                .on_tick(self.shared.state(), &subscriptions.registry)
        };
        if commands.is_empty() {
            return;
        }
        tracing::info!(cycle = self.refresh.cycles(), "Refreshing subscriptions");
        for command in &commands {
            if !self.send_command(phase, command).await {
                return;
            }
        }
    }

    async fn on_command(&mut self, phase: &mut Phase, command: Command) {
        match command {
            Command::Sync {
                command,
                generation,
            } => {
                if let SubscriptionCommand::Unsubscribe(symbols) = &command {
                    self.metrics.forget(symbols);
                }
                if generation <= self.flushed_generation {
                    return;
                }
                if matches!(phase, Phase::Open(_)) {
                    self.send_command(phase, &command).await;
                }
            }
            Command::ForceReconnect => {
                if matches!(phase, Phase::Open(_)) {
                    tracing::info!("Forcing reconnect");
                    self.on_connection_lost(phase, CloseReason::Forced);
                } else {
                    tracing::debug!(state = %self.shared.state(), "force_reconnect() ignored");
                }
            }
        }
    }

    /// Write a command to the open connection.
    ///
    /// Returns `false` when the connection is gone, either because it was
    /// not open or because the write failed and the loss was handled.
    async fn send_command(&mut self, phase: &mut Phase, command: &SubscriptionCommand) -> bool {
        let Phase::Open(connection) = phase else {
            return false;
        };
        let text = match serde_json::to_string(command) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(error = %err, "Failed to encode subscription command");
                return true;
            }
        };

        let cancel = self.shared.cancel.clone();
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return false,
            result = connection.sink.send(text) => result,
        };

        match result {
            Ok(()) => {
                prom::record_command_sent(command.verb());
                tracing::debug!(
                    command = command.verb(),
                    symbols = command.symbols().len(),
                    "Command sent"
                );
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "Command write failed");
                self.report_transport_error(&err);
                self.on_connection_lost(phase, CloseReason::TransportFailure(err.to_string()));
                false
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
