//! Instrumented transports for coordinator tests
//!
//! Each stub records every connect/disconnect with its start and end time
//! so tests can check call order and that no two calls overlapped.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use pl_coordinator::{ChannelListener, ConnectionCoordinator, ConnectionListener};
use pl_core::config::CoordinatorConfig;
use pl_core::traits::{
    DisconnectCallback, FramebufferTransport, ShellTransport, SocketTransport, TransportSet,
};
use pl_core::{
    CommandOutput, ConnectionEvent, Credentials, Liveness, PointerAction, Resolution,
    TransportError, TransportKind,
};

pub const ADDRESS: &str = "1.2.3.4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Connect,
    Disconnect,
}

#[derive(Debug, Clone, Copy)]
pub struct Span {
    pub kind: TransportKind,
    pub op: Op,
    pub start: Instant,
    pub end: Instant,
}

/// Shared log of transport calls, in completion order
#[derive(Default)]
pub struct Recorder {
    spans: Mutex<Vec<Span>>,
}

impl Recorder {
    fn record(&self, kind: TransportKind, op: Op, start: Instant) {
        self.spans.lock().push(Span {
            kind,
            op,
            start,
            end: Instant::now(),
        });
    }

    pub fn spans(&self) -> Vec<Span> {
        self.spans.lock().clone()
    }

    pub fn calls(&self, op: Op) -> Vec<TransportKind> {
        self.spans
            .lock()
            .iter()
            .filter(|span| span.op == op)
            .map(|span| span.kind)
            .collect()
    }

    pub fn connects(&self) -> Vec<TransportKind> {
        self.calls(Op::Connect)
    }

    pub fn disconnects(&self) -> Vec<TransportKind> {
        self.calls(Op::Disconnect)
    }

    pub fn clear(&self) {
        self.spans.lock().clear();
    }
}

/// Knobs shared by all three stubs
#[derive(Default)]
pub struct Behaviour {
    pub fail_connect: AtomicBool,
    pub panic_on_connect: AtomicBool,
    pub connect_delay: Mutex<Duration>,
    pub disconnect_delay: Mutex<Duration>,
}

impl Behaviour {
    async fn connect(&self, kind: TransportKind) -> Result<(), TransportError> {
        let delay = *self.connect_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.panic_on_connect.load(Ordering::SeqCst) {
            panic!("{} stub exploded", kind);
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectFailed {
                kind,
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    async fn disconnect_delay(&self) {
        let delay = *self.disconnect_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

pub struct StubSocket {
    recorder: Arc<Recorder>,
    pub behaviour: Behaviour,
    connected: AtomicBool,
    /// Cleared to make liveness checks fail while the handle still
    /// believes it holds a connection
    reachable: AtomicBool,
    pub probe_result: Mutex<Liveness>,
    callback: Mutex<Option<DisconnectCallback>>,
}

impl StubSocket {
    fn new(recorder: Arc<Recorder>) -> Self {
        Self {
            recorder,
            behaviour: Behaviour::default(),
            connected: AtomicBool::new(false),
            reachable: AtomicBool::new(true),
            probe_result: Mutex::new(Liveness::Alive),
            callback: Mutex::new(None),
        }
    }

    /// Invoke the registered disconnect callback directly
    pub fn fire_on_disconnect(&self) {
        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// The device stops answering; the handle only notices when checked
    pub fn go_unreachable(&self) {
        self.reachable.store(false, Ordering::SeqCst);
    }

    pub fn has_callback(&self) -> bool {
        self.callback.lock().is_some()
    }
}

#[async_trait]
impl SocketTransport for StubSocket {
    async fn connect(&self, _: &str, _: u16, _: Duration) -> Result<(), TransportError> {
        let start = Instant::now();
        let result = self.behaviour.connect(TransportKind::Socket).await;
        if result.is_ok() {
            self.connected.store(true, Ordering::SeqCst);
            self.reachable.store(true, Ordering::SeqCst);
        }
        self.recorder.record(TransportKind::Socket, Op::Connect, start);
        result
    }

    async fn disconnect(&self) {
        let start = Instant::now();
        self.behaviour.disconnect_delay().await;
        let was_connected = self.connected.swap(false, Ordering::SeqCst);
        self.recorder.record(TransportKind::Socket, Op::Disconnect, start);
        if was_connected {
            self.fire_on_disconnect();
        }
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.reachable.load(Ordering::SeqCst)
    }

    async fn send(&self, data: &[u8]) -> Result<usize, TransportError> {
        Ok(data.len())
    }

    async fn recv(&self, _: usize) -> Result<Bytes, TransportError> {
        Ok(Bytes::new())
    }

    async fn probe(&self, _: Duration) -> Liveness {
        *self.probe_result.lock()
    }

    fn set_on_disconnect(&self, callback: Option<DisconnectCallback>) {
        *self.callback.lock() = callback;
    }
}

pub struct StubShell {
    recorder: Arc<Recorder>,
    pub behaviour: Behaviour,
}

#[async_trait]
impl ShellTransport for StubShell {
    async fn connect(&self, _: &str, _: &Credentials, _: Duration) -> Result<(), TransportError> {
        let start = Instant::now();
        let result = self.behaviour.connect(TransportKind::Shell).await;
        self.recorder.record(TransportKind::Shell, Op::Connect, start);
        result
    }

    async fn exec(&self, command: &str) -> Result<CommandOutput, TransportError> {
        Ok(CommandOutput {
            exit_status: 0,
            stdout: format!("ran {}", command),
            stderr: String::new(),
        })
    }

    async fn disconnect(&self) {
        let start = Instant::now();
        self.behaviour.disconnect_delay().await;
        self.recorder.record(TransportKind::Shell, Op::Disconnect, start);
    }

    async fn is_connected(&self) -> bool {
        true
    }
}

type Hook = Box<dyn Fn() + Send + Sync>;

pub struct StubFramebuffer {
    recorder: Arc<Recorder>,
    pub behaviour: Behaviour,
    /// Runs inside `disconnect`, after the delay
    on_disconnect: Mutex<Option<Hook>>,
    /// Every pointer gesture received, in order
    pub pointer_actions: Mutex<Vec<PointerAction>>,
    pub rotation: u16,
}

impl StubFramebuffer {
    pub fn during_disconnect(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_disconnect.lock() = Some(Box::new(hook));
    }
}

#[async_trait]
impl FramebufferTransport for StubFramebuffer {
    async fn connect(&self, _: &str, _: u16, _: Duration) -> Result<(), TransportError> {
        let start = Instant::now();
        let result = self.behaviour.connect(TransportKind::Framebuffer).await;
        self.recorder
            .record(TransportKind::Framebuffer, Op::Connect, start);
        result
    }

    async fn capture_frame(&self) -> Result<Bytes, TransportError> {
        Ok(Bytes::from_static(b"\x89PNG"))
    }

    async fn refresh(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn resolution(&self) -> Result<Resolution, TransportError> {
        Ok(Resolution::new(800, 480))
    }

    async fn pointer(&self, action: &PointerAction) -> Result<(), TransportError> {
        self.pointer_actions.lock().push(*action);
        Ok(())
    }

    fn rotation(&self) -> u16 {
        self.rotation
    }

    async fn disconnect(&self) {
        let start = Instant::now();
        self.behaviour.disconnect_delay().await;
        if let Some(hook) = self.on_disconnect.lock().as_ref() {
            hook();
        }
        self.recorder
            .record(TransportKind::Framebuffer, Op::Disconnect, start);
    }
}

/// A coordinator wired to stub transports, with an event channel attached
pub struct Harness {
    pub coordinator: ConnectionCoordinator,
    pub recorder: Arc<Recorder>,
    pub socket: Arc<StubSocket>,
    pub shell: Arc<StubShell>,
    pub framebuffer: Arc<StubFramebuffer>,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    _listener: Arc<dyn ConnectionListener>,
}

/// Coordinator config with the watchdog off
pub fn quiet_config() -> CoordinatorConfig {
    let mut config = CoordinatorConfig::default();
    config.watchdog.enabled = false;
    config
}

impl Harness {
    /// Build a harness without starting the worker
    pub fn idle(config: CoordinatorConfig) -> Self {
        let recorder = Arc::new(Recorder::default());
        let socket = Arc::new(StubSocket::new(Arc::clone(&recorder)));
        let shell = Arc::new(StubShell {
            recorder: Arc::clone(&recorder),
            behaviour: Behaviour::default(),
        });
        let framebuffer = Arc::new(StubFramebuffer {
            recorder: Arc::clone(&recorder),
            behaviour: Behaviour::default(),
            on_disconnect: Mutex::new(None),
            pointer_actions: Mutex::new(Vec::new()),
            rotation: 90,
        });

        let transports = TransportSet {
            socket: socket.clone(),
            shell: shell.clone(),
            framebuffer: framebuffer.clone(),
        };
        let coordinator = ConnectionCoordinator::new(transports, config);

        let (listener, events) = ChannelListener::channel();
        let listener: Arc<dyn ConnectionListener> = listener;
        coordinator.add_listener(&listener);

        Self {
            coordinator,
            recorder,
            socket,
            shell,
            framebuffer,
            events,
            _listener: listener,
        }
    }

    /// Build a harness with a running worker
    pub fn started(config: CoordinatorConfig) -> Self {
        let harness = Self::idle(config);
        harness.coordinator.start_worker().unwrap();
        harness
    }

    pub fn new() -> Self {
        Self::started(quiet_config())
    }

    /// Wait for the queue to drain and return the events published so far
    pub async fn settle(&mut self) -> Vec<ConnectionEvent> {
        self.coordinator.flush().await.unwrap();
        self.drain()
    }

    /// Events already delivered, without waiting
    pub fn drain(&mut self) -> Vec<ConnectionEvent> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }

    /// Bring all three transports up and forget the calls and events
    pub async fn connect_all(&mut self) {
        let coordinator = &self.coordinator;
        coordinator.connect_socket(ADDRESS, 80);
        coordinator.connect_shell(ADDRESS, Credentials::new("root", ""));
        coordinator.connect_framebuffer(ADDRESS, 5900);
        let events = self.settle().await;
        assert_eq!(events.len(), 3, "unexpected events: {:?}", events);
        self.recorder.clear();
    }

    pub fn flags(&self) -> (bool, bool, bool) {
        let snap = self.coordinator.snapshot();
        (snap.socket, snap.shell, snap.framebuffer)
    }
}
