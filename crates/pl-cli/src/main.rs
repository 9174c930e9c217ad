//! panelink CLI
//!
//! Talks to a printer's front panel over three transports:
//! - capture the panel screen to a PNG
//! - tap, drag and scroll on the panel
//! - run shell commands on the device
//! - watch connection state as it changes

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use panelink::commands;
use panelink::output::print_error;
use panelink::session::DeviceArgs;

#[derive(Parser)]
#[command(name = "panelink")]
#[command(author, version, about = "Printer front-panel connection tool")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture the front panel to a PNG file
    Capture {
        #[command(flatten)]
        device: DeviceArgs,
        /// Where to write the PNG
        #[arg(short, long, default_value = "panel.png")]
        output: PathBuf,
    },

    /// Run a command on the device over the shell
    Exec {
        #[command(flatten)]
        device: DeviceArgs,
        /// Command and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Send pointer input to the panel
    Input {
        #[command(flatten)]
        device: DeviceArgs,
        #[command(subcommand)]
        gesture: commands::InputGesture,
    },

    /// Connect and print connection events until Ctrl+C
    Watch {
        #[command(flatten)]
        device: DeviceArgs,
        /// One JSON object per event
        #[arg(long)]
        json: bool,
    },

    /// Show which transports can be connected
    Status {
        #[command(flatten)]
        device: DeviceArgs,
        /// Print the flags as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Capture { device, output } => {
            let config = commands::load_or_default(config_path)?;
            commands::capture_command(config, &device, &output).await
        }
        Commands::Exec { device, command } => {
            let config = commands::load_or_default(config_path)?;
            let status = commands::exec_command(config, &device, &command.join(" ")).await?;
            if status != 0 {
                std::process::exit(status);
            }
            Ok(())
        }
        Commands::Input { device, gesture } => {
            let config = commands::load_or_default(config_path)?;
            commands::input_command(config, &device, &gesture).await
        }
        Commands::Watch { device, json } => {
            let config = commands::load_or_default(config_path)?;
            commands::watch_command(config, &device, json).await
        }
        Commands::Status { device, json } => {
            let config = commands::load_or_default(config_path)?;
            commands::status_command(config, &device, json).await
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(config_path),
            ConfigAction::Init { force } => commands::config_init(config_path, force),
            ConfigAction::Path => commands::config_path(config_path),
        },
    }
}
