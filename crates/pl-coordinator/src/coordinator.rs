//! Public coordinator API
//!
//! Every connect/disconnect method only queues an intent and returns; the
//! outcome is reported through the event bus. Queries read the shared
//! flags directly and never wait on the worker.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use pl_core::config::{CoordinatorConfig, DeviceConfig};
use pl_core::traits::TransportSet;
use pl_core::{
    CommandOutput, CoordinatorError, Credentials, Point, PointerAction, Resolution, ViewPoint,
};

use crate::events::{ConnectionListener, EventBus};
use crate::intent::Intent;
use crate::state::{ConnectionSnapshot, ConnectionState};
use crate::worker::{Worker, WorkerThread};

/// Port of the device's raw socket service
pub const DEFAULT_SOCKET_PORT: u16 = 80;

/// Port of the device's framebuffer server
pub const DEFAULT_FRAMEBUFFER_PORT: u16 = 5900;

/// Per-transport connect timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectTimeouts {
    pub socket: Duration,
    pub shell: Duration,
    pub framebuffer: Duration,
}

impl Default for ConnectTimeouts {
    fn default() -> Self {
        Self {
            socket: Duration::from_secs(2),
            shell: Duration::from_secs(5),
            framebuffer: Duration::from_secs(5),
        }
    }
}

impl From<&DeviceConfig> for ConnectTimeouts {
    fn from(config: &DeviceConfig) -> Self {
        Self {
            socket: config.socket_timeout,
            shell: config.shell_timeout,
            framebuffer: config.framebuffer_timeout,
        }
    }
}

/// Serializes connection work for one device
///
/// Owns the three transport handles, the shared flags, the listener
/// registry and the worker thread. Intents queued before
/// [`start_worker`](Self::start_worker) run once the worker starts.
pub struct ConnectionCoordinator {
    transports: TransportSet,
    config: CoordinatorConfig,
    timeouts: ConnectTimeouts,
    state: Arc<ConnectionState>,
    bus: Arc<EventBus>,
    teardown_in_progress: Arc<AtomicBool>,
    intents: mpsc::UnboundedSender<Intent>,
    /// Receiving end of the queue until the worker takes it
    pending: Mutex<Option<mpsc::UnboundedReceiver<Intent>>>,
    worker: Mutex<Option<WorkerThread>>,
    cancel: CancellationToken,
}

impl ConnectionCoordinator {
    /// Create a coordinator around existing transport handles
    ///
    /// Registers the socket's disconnect callback; the handles are reused
    /// across reconnects for the coordinator's whole life.
    pub fn new(transports: TransportSet, config: CoordinatorConfig) -> Self {
        let (intents, queue) = mpsc::unbounded_channel();
        let teardown_in_progress = Arc::new(AtomicBool::new(false));

        transports.socket.set_on_disconnect(Some(lost_socket_callback(
            intents.clone(),
            Arc::clone(&teardown_in_progress),
        )));

        Self {
            transports,
            config,
            timeouts: ConnectTimeouts::default(),
            state: Arc::new(ConnectionState::new()),
            bus: Arc::new(EventBus::new()),
            teardown_in_progress,
            intents,
            pending: Mutex::new(Some(queue)),
            worker: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Use these connect timeouts instead of the defaults
    pub fn with_timeouts(mut self, timeouts: ConnectTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Start the worker thread
    ///
    /// Calling this again while the worker runs, or after `stop`, does
    /// nothing.
    pub fn start_worker(&self) -> Result<(), CoordinatorError> {
        let Some(queue) = self.pending.lock().take() else {
            tracing::warn!("Connection worker already started");
            return Ok(());
        };

        let worker = Worker {
            transports: self.transports.clone(),
            state: Arc::clone(&self.state),
            bus: Arc::clone(&self.bus),
            config: self.config.clone(),
            teardown_in_progress: Arc::clone(&self.teardown_in_progress),
            intents: self.intents.clone(),
        };

        let thread = WorkerThread::spawn(worker, queue, self.cancel.clone())?;
        *self.worker.lock() = Some(thread);
        tracing::info!("Connection worker started");
        Ok(())
    }

    /// Stop the worker
    ///
    /// The intent in flight (if any) finishes; queued intents are dropped.
    /// Waits at most `join_timeout` and always returns.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.transports.socket.set_on_disconnect(None);
        self.pending.lock().take();

        if let Some(thread) = self.worker.lock().take() {
            thread.stop(self.config.join_timeout);
            tracing::info!("Connection worker stopped");
        }
    }

    pub fn connect_socket(&self, address: &str, port: u16) {
        self.enqueue(Intent::ConnectSocket {
            address: address.to_string(),
            port,
            timeout: self.timeouts.socket,
        });
    }

    /// Queue a shell connect; the shell starts the framebuffer server
    pub fn connect_shell(&self, address: &str, credentials: Credentials) {
        self.enqueue(Intent::ConnectShell {
            address: address.to_string(),
            credentials,
            timeout: self.timeouts.shell,
        });
    }

    /// Queue a framebuffer connect. Fails with a `ConnectionError` event
    /// unless the shell is connected by the time it runs.
    pub fn connect_framebuffer(&self, address: &str, port: u16) {
        self.enqueue(Intent::ConnectFramebuffer {
            address: address.to_string(),
            port,
            timeout: self.timeouts.framebuffer,
        });
    }

    /// Tear down framebuffer, shell and socket, in that order
    pub fn disconnect_socket(&self) {
        self.enqueue(Intent::DisconnectSocket);
    }

    /// Tear down framebuffer, then shell
    pub fn disconnect_shell(&self) {
        self.enqueue(Intent::DisconnectShell);
    }

    pub fn disconnect_framebuffer(&self) {
        self.enqueue(Intent::DisconnectFramebuffer);
    }

    /// Tear down every connected transport, dependents first
    pub fn disconnect_all(&self) {
        self.enqueue(Intent::DisconnectAll);
    }

    pub fn add_listener(&self, listener: &Arc<dyn ConnectionListener>) {
        self.bus.subscribe(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ConnectionListener>) {
        self.bus.unsubscribe(listener);
    }

    pub fn is_socket_connected(&self) -> bool {
        self.state.is_socket_connected()
    }

    pub fn is_shell_connected(&self) -> bool {
        self.state.is_shell_connected()
    }

    pub fn is_framebuffer_connected(&self) -> bool {
        self.state.is_framebuffer_connected()
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.state.snapshot()
    }

    /// Wait until every intent queued before this call has run
    pub async fn flush(&self) -> Result<(), CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(Intent::Flush(tx))?;
        rx.await.map_err(|_| CoordinatorError::WorkerStopped)
    }

    /// Capture the device screen as PNG bytes
    ///
    /// Runs on the worker after everything queued before it. Failures are
    /// returned here and also published as `ConnectionError`.
    pub async fn capture_frame(&self) -> Result<Bytes, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(Intent::CaptureFrame(tx))?;
        rx.await.map_err(|_| CoordinatorError::WorkerStopped)?
    }

    /// Run a command over the shell session
    pub async fn run_shell_command(&self, command: &str) -> Result<CommandOutput, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(Intent::RunShellCommand {
            command: command.to_string(),
            reply: tx,
        })?;
        rx.await.map_err(|_| CoordinatorError::WorkerStopped)?
    }

    /// Send a pointer gesture to the framebuffer
    pub async fn pointer(&self, action: PointerAction) -> Result<(), CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(Intent::Pointer { action, reply: tx })?;
        rx.await.map_err(|_| CoordinatorError::WorkerStopped)?
    }

    pub async fn click(&self, at: Point) -> Result<(), CoordinatorError> {
        self.pointer(PointerAction::Click(at)).await
    }

    pub async fn drag(&self, from: Point, to: Point) -> Result<(), CoordinatorError> {
        self.pointer(PointerAction::Drag { from, to }).await
    }

    /// Screen size of the connected framebuffer
    pub async fn resolution(&self) -> Result<Resolution, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(Intent::Resolution(tx))?;
        rx.await.map_err(|_| CoordinatorError::WorkerStopped)?
    }

    /// Map a position on a scaled, rotated view to a screen position
    pub async fn map_view_point(&self, view: ViewPoint) -> Result<Point, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(Intent::MapViewPoint { view, reply: tx })?;
        rx.await.map_err(|_| CoordinatorError::WorkerStopped)?
    }

    fn send(&self, intent: Intent) -> Result<(), CoordinatorError> {
        if self.cancel.is_cancelled() {
            return Err(CoordinatorError::WorkerStopped);
        }
        self.intents
            .send(intent)
            .map_err(|_| CoordinatorError::WorkerStopped)
    }

    fn enqueue(&self, intent: Intent) {
        let name = intent.name();
        if self.send(intent).is_err() {
            tracing::warn!("Dropping {}: connection worker is not running", name);
        } else {
            tracing::debug!("Queued {}", name);
        }
    }
}

impl Drop for ConnectionCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Callback the socket fires when it goes down
///
/// Queues the lost-socket cascade unless this coordinator is already
/// tearing the socket down itself.
fn lost_socket_callback(
    intents: mpsc::UnboundedSender<Intent>,
    teardown_in_progress: Arc<AtomicBool>,
) -> pl_core::traits::DisconnectCallback {
    Arc::new(move || {
        if teardown_in_progress.load(Ordering::SeqCst) {
            tracing::debug!("Socket disconnect during teardown, cascade suppressed");
            return;
        }
        tracing::warn!("Socket disconnected unexpectedly");
        if intents.send(Intent::SocketLost).is_err() {
            tracing::debug!("Worker gone, lost-socket cascade not queued");
        }
    })
}
