//! pl-core: Core abstractions and configuration for panelink
//!
//! This crate provides the shared types, the transport traits the
//! coordinator drives, pointer input types, the error taxonomy, and the configuration
//! structures used by the transport, coordinator and CLI crates.

pub mod config;
pub mod error;
pub mod event;
pub mod pointer;
pub mod traits;
pub mod types;

pub use error::{ConfigError, CoordinatorError, PlError, TransportError};
pub use event::ConnectionEvent;
pub use pointer::{Point, PointerAction, Resolution, ScrollDirection, ViewPoint};
pub use types::{CommandOutput, Credentials, Liveness, TransportKind};
