//! CLI command implementations

mod capture;
mod config;
mod exec;
mod input;
mod status;
mod watch;

pub use capture::capture_command;
pub use config::{config_init, config_path, config_show, load_or_default};
pub use exec::exec_command;
pub use input::{input_command, InputGesture};
pub use status::status_command;
pub use watch::watch_command;
