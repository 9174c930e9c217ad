//! pl-coordinator: Connection lifecycle for one device
//!
//! The [`ConnectionCoordinator`] owns a socket, a shell and a framebuffer
//! transport and runs every connect/disconnect through a single worker
//! thread, in FIFO order. It enforces the dependency between the
//! transports (the framebuffer needs the shell), cascades teardown from a
//! prerequisite to its dependents, and publishes each transition on an
//! [`EventBus`].

pub mod coordinator;
pub mod events;
mod intent;
pub mod state;
mod watchdog;
mod worker;

pub use coordinator::{
    ConnectTimeouts, ConnectionCoordinator, DEFAULT_FRAMEBUFFER_PORT, DEFAULT_SOCKET_PORT,
};
pub use events::{ChannelListener, ConnectionListener, EventBus};
pub use state::{ConnectionSnapshot, ConnectionState};
