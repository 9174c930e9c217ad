//! The connection worker
//!
//! A single OS thread with its own current-thread runtime drains the
//! intent queue one intent at a time. Every transport call happens here,
//! so no two connection operations ever overlap.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use pl_core::config::CoordinatorConfig;
use pl_core::traits::TransportSet;
use pl_core::{
    ConnectionEvent, CoordinatorError, Credentials, Point, PointerAction, Resolution,
    TransportError, TransportKind, ViewPoint,
};

use crate::events::EventBus;
use crate::intent::Intent;
use crate::state::ConnectionState;
use crate::watchdog::{socket_alive, SocketWatchdog};

const WORKER_THREAD_NAME: &str = "panelink-worker";

/// Holds the "user disconnect in progress" flag for its lifetime
struct TeardownGuard<'a>(&'a AtomicBool);

impl<'a> TeardownGuard<'a> {
    fn hold(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for TeardownGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Executes intents against the transports
pub(crate) struct Worker {
    pub(crate) transports: TransportSet,
    pub(crate) state: Arc<ConnectionState>,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) config: CoordinatorConfig,
    /// Set while a cascade started by this worker is tearing the socket down
    pub(crate) teardown_in_progress: Arc<AtomicBool>,
    /// Sender side of our own queue, for the watchdog
    pub(crate) intents: mpsc::UnboundedSender<Intent>,
}

impl Worker {
    /// Drain the queue until cancelled
    pub(crate) async fn run(self, mut queue: mpsc::UnboundedReceiver<Intent>, cancel: CancellationToken) {
        tracing::debug!("Connection worker started");

        let watchdog = self.config.watchdog.enabled.then(|| {
            SocketWatchdog::new(&self.config.watchdog).spawn(
                Arc::clone(&self.state),
                self.intents.clone(),
                cancel.child_token(),
            )
        });

        loop {
            let intent = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                intent = queue.recv() => match intent {
                    Some(intent) => intent,
                    None => break,
                },
            };
            self.execute(intent).await;
        }

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        let dropped = std::iter::from_fn(|| queue.try_recv().ok()).count();
        if dropped > 0 {
            tracing::debug!("Dropped {} queued intent(s) on shutdown", dropped);
        }
        tracing::debug!("Connection worker stopped");
    }

    /// Run one intent, turning any error or panic into a `ConnectionError`
    async fn execute(&self, intent: Intent) {
        let name = intent.name();
        tracing::debug!("Executing {:?}", intent);

        match AssertUnwindSafe(self.dispatch(intent)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.report(name, &e),
            Err(payload) => {
                self.report(name, &CoordinatorError::IntentPanicked(panic_message(&*payload)))
            }
        }
    }

    fn report(&self, name: &str, error: &CoordinatorError) {
        tracing::error!("{} failed: {}", name, error);
        self.bus.publish(&ConnectionEvent::error(error));
    }

    async fn dispatch(&self, intent: Intent) -> Result<(), CoordinatorError> {
        match intent {
            Intent::ConnectSocket {
                address,
                port,
                timeout,
            } => self.connect_socket(&address, port, timeout).await,
            Intent::ConnectShell {
                address,
                credentials,
                timeout,
            } => self.connect_shell(&address, &credentials, timeout).await,
            Intent::ConnectFramebuffer {
                address,
                port,
                timeout,
            } => self.connect_framebuffer(&address, port, timeout).await,
            Intent::DisconnectSocket => {
                if !self.state.is_socket_connected() {
                    tracing::debug!("Socket already disconnected");
                    return Ok(());
                }
                let _guard = TeardownGuard::hold(&self.teardown_in_progress);
                self.cascade(&TransportKind::TEARDOWN_ORDER).await;
                Ok(())
            }
            Intent::DisconnectShell => {
                if !self.state.is_shell_connected() {
                    tracing::debug!("Shell already disconnected");
                    return Ok(());
                }
                self.cascade(&[TransportKind::Framebuffer, TransportKind::Shell])
                    .await;
                Ok(())
            }
            Intent::DisconnectFramebuffer => {
                self.cascade(&[TransportKind::Framebuffer]).await;
                Ok(())
            }
            Intent::DisconnectAll => {
                let _guard = TeardownGuard::hold(&self.teardown_in_progress);
                self.cascade(&TransportKind::TEARDOWN_ORDER).await;
                Ok(())
            }
            Intent::SocketLost => {
                tracing::warn!("Socket lost, tearing down dependent transports");
                let _guard = TeardownGuard::hold(&self.teardown_in_progress);
                self.cascade(&TransportKind::TEARDOWN_ORDER).await;
                Ok(())
            }
            Intent::CheckSocket => {
                self.check_socket().await;
                Ok(())
            }
            Intent::CaptureFrame(reply) => {
                let result = self.capture_frame().await;
                if let Err(e) = &result {
                    self.report("capture_frame", e);
                }
                let _ = reply.send(result);
                Ok(())
            }
            Intent::RunShellCommand { command, reply } => {
                let result = self.run_shell_command(&command).await;
                if let Err(e) = &result {
                    self.report("run_shell_command", e);
                }
                let _ = reply.send(result);
                Ok(())
            }
            Intent::Pointer { action, reply } => {
                let result = self.pointer(&action).await;
                if let Err(e) = &result {
                    self.report("pointer", e);
                }
                let _ = reply.send(result);
                Ok(())
            }
            Intent::Resolution(reply) => {
                let result = self.resolution().await;
                if let Err(e) = &result {
                    self.report("resolution", e);
                }
                let _ = reply.send(result);
                Ok(())
            }
            Intent::MapViewPoint { view, reply } => {
                let result = self.map_view_point(&view).await;
                if let Err(e) = &result {
                    self.report("map_view_point", e);
                }
                let _ = reply.send(result);
                Ok(())
            }
            Intent::Flush(reply) => {
                let _ = reply.send(());
                Ok(())
            }
        }
    }

    async fn connect_socket(
        &self,
        address: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<(), CoordinatorError> {
        if self.state.is_socket_connected() {
            tracing::debug!("Socket already connected");
            return Ok(());
        }

        self.transports.socket.connect(address, port, timeout).await?;
        self.mark_connected(TransportKind::Socket);
        Ok(())
    }

    async fn connect_shell(
        &self,
        address: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<(), CoordinatorError> {
        if self.state.is_shell_connected() {
            tracing::debug!("Shell already connected");
            return Ok(());
        }
        if self.config.require_socket_for_shell && !self.state.is_socket_connected() {
            return Err(CoordinatorError::PreconditionFailed {
                requested: TransportKind::Shell,
                required: TransportKind::Socket,
            });
        }

        self.transports
            .shell
            .connect(address, credentials, timeout)
            .await?;
        self.mark_connected(TransportKind::Shell);
        Ok(())
    }

    async fn connect_framebuffer(
        &self,
        address: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<(), CoordinatorError> {
        if self.state.is_framebuffer_connected() {
            tracing::debug!("Framebuffer already connected");
            return Ok(());
        }
        if !self.state.is_shell_connected() {
            return Err(CoordinatorError::PreconditionFailed {
                requested: TransportKind::Framebuffer,
                required: TransportKind::Shell,
            });
        }

        self.transports
            .framebuffer
            .connect(address, port, timeout)
            .await?;
        self.mark_connected(TransportKind::Framebuffer);
        Ok(())
    }

    fn mark_connected(&self, kind: TransportKind) {
        self.state.set(kind, true);
        tracing::info!("{} connected", kind);
        self.bus.publish(&ConnectionEvent::connected(kind));
    }

    /// Tear down each listed transport whose flag is set, in order
    async fn cascade(&self, kinds: &[TransportKind]) {
        for &kind in kinds {
            if !self.state.get(kind) {
                continue;
            }

            match kind {
                TransportKind::Socket => self.transports.socket.disconnect().await,
                TransportKind::Shell => self.transports.shell.disconnect().await,
                TransportKind::Framebuffer => self.transports.framebuffer.disconnect().await,
            }

            self.state.set(kind, false);
            tracing::info!("{} disconnected", kind);
            self.bus.publish(&ConnectionEvent::disconnected(kind));
        }
    }

    /// Tear everything down if the socket stopped answering
    ///
    /// The cascade runs inside this intent so the flags are already clear
    /// when the next queued intent looks at them. The disconnect callback
    /// fired on the way is suppressed by the guard.
    async fn check_socket(&self) {
        if !self.state.is_socket_connected() {
            return;
        }

        if socket_alive(self.transports.socket.as_ref(), &self.config.watchdog).await {
            tracing::trace!("Socket alive");
            return;
        }

        tracing::warn!("Socket liveness lost, tearing down dependent transports");
        let _guard = TeardownGuard::hold(&self.teardown_in_progress);
        self.cascade(&TransportKind::TEARDOWN_ORDER).await;
    }

    fn require_framebuffer(&self) -> Result<(), CoordinatorError> {
        if !self.state.is_framebuffer_connected() {
            return Err(TransportError::NotConnected(TransportKind::Framebuffer).into());
        }
        Ok(())
    }

    async fn capture_frame(&self) -> Result<bytes::Bytes, CoordinatorError> {
        self.require_framebuffer()?;
        Ok(self.transports.framebuffer.capture_frame().await?)
    }

    async fn pointer(&self, action: &PointerAction) -> Result<(), CoordinatorError> {
        self.require_framebuffer()?;
        Ok(self.transports.framebuffer.pointer(action).await?)
    }

    async fn resolution(&self) -> Result<Resolution, CoordinatorError> {
        self.require_framebuffer()?;
        Ok(self.transports.framebuffer.resolution().await?)
    }

    async fn map_view_point(&self, view: &ViewPoint) -> Result<Point, CoordinatorError> {
        self.require_framebuffer()?;
        Ok(self.transports.framebuffer.map_view_point(view).await?)
    }

    async fn run_shell_command(
        &self,
        command: &str,
    ) -> Result<pl_core::CommandOutput, CoordinatorError> {
        if !self.state.is_shell_connected() {
            return Err(TransportError::NotConnected(TransportKind::Shell).into());
        }
        Ok(self.transports.shell.exec(command).await?)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// The running worker thread
pub(crate) struct WorkerThread {
    handle: JoinHandle<()>,
    done: std_mpsc::Receiver<()>,
    cancel: CancellationToken,
}

impl WorkerThread {
    /// Spawn the worker on its own thread
    pub(crate) fn spawn(
        worker: Worker,
        queue: mpsc::UnboundedReceiver<Intent>,
        cancel: CancellationToken,
    ) -> Result<Self, CoordinatorError> {
        let (done_tx, done) = std_mpsc::channel();
        let token = cancel.clone();

        let handle = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime.block_on(worker.run(queue, token)),
                    Err(e) => tracing::error!("Failed to start worker runtime: {}", e),
                }
                let _ = done_tx.send(());
            })
            .map_err(CoordinatorError::WorkerSpawn)?;

        Ok(Self {
            handle,
            done,
            cancel,
        })
    }

    /// Signal the worker and wait up to `timeout` for it to finish
    ///
    /// An intent already running is allowed to complete. A worker that
    /// does not finish in time is detached.
    pub(crate) fn stop(self, timeout: Duration) {
        self.cancel.cancel();

        if self.handle.thread().id() == std::thread::current().id() {
            tracing::debug!("Stop requested from the worker thread, detaching");
            return;
        }

        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    tracing::error!("Connection worker panicked");
                }
            }
            Err(std_mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "Connection worker did not stop within {:?}, detaching",
                    timeout
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teardown_guard_resets() {
        let flag = AtomicBool::new(false);
        {
            let _guard = TeardownGuard::hold(&flag);
            assert!(flag.load(Ordering::SeqCst));
        }
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }
}
