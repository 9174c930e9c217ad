//! Input command implementation

use anyhow::{anyhow, Context, Result};
use clap::{Subcommand, ValueEnum};

use pl_core::config::PanelinkConfig;
use pl_core::{Point, PointerAction, ScrollDirection, TransportKind, ViewPoint};

use crate::output::{print_info, print_success};
use crate::session::{DeviceArgs, DeviceSession};

/// A pointer gesture as typed on the command line
#[derive(Subcommand, Debug, Clone)]
pub enum InputGesture {
    /// Tap the screen once
    Tap {
        x: u32,
        y: u32,
        /// Coordinates are on a WIDTHxHEIGHT view of the rotated panel
        #[arg(long, value_parser = parse_view_size)]
        view: Option<(u32, u32)>,
    },
    /// Press, move and release
    Drag {
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        /// Coordinates are on a WIDTHxHEIGHT view of the rotated panel
        #[arg(long, value_parser = parse_view_size)]
        view: Option<(u32, u32)>,
    },
    /// Turn the scroll wheel
    Scroll {
        #[arg(value_enum)]
        direction: WheelDirection,
        /// Wheel notches
        #[arg(long, default_value_t = 1)]
        steps: u32,
        /// Move here first, as X,Y
        #[arg(long, value_parser = parse_position)]
        at: Option<(u32, u32)>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum WheelDirection {
    Up,
    Down,
    Left,
    Right,
}

impl From<WheelDirection> for ScrollDirection {
    fn from(direction: WheelDirection) -> Self {
        match direction {
            WheelDirection::Up => ScrollDirection::Up,
            WheelDirection::Down => ScrollDirection::Down,
            WheelDirection::Left => ScrollDirection::Left,
            WheelDirection::Right => ScrollDirection::Right,
        }
    }
}

fn parse_pair(value: &str, separator: char) -> Result<(u32, u32), String> {
    let (a, b) = value
        .split_once(separator)
        .ok_or_else(|| format!("expected A{}B, got '{}'", separator, value))?;
    let number = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|e| format!("'{}': {}", s, e))
    };
    Ok((number(a)?, number(b)?))
}

fn parse_view_size(value: &str) -> Result<(u32, u32), String> {
    parse_pair(&value.to_ascii_lowercase(), 'x')
}

fn parse_position(value: &str) -> Result<(u32, u32), String> {
    parse_pair(value, ',')
}

fn screen_point(x: u32, y: u32) -> Result<Point> {
    let coordinate = |v: u32| u16::try_from(v).map_err(|_| anyhow!("coordinate {} is off screen", v));
    Ok(Point::new(coordinate(x)?, coordinate(y)?))
}

/// Connect every transport, send one gesture, disconnect
pub async fn input_command(
    config: PanelinkConfig,
    args: &DeviceArgs,
    gesture: &InputGesture,
) -> Result<()> {
    let mut session = DeviceSession::open(config, args)?;
    print_info(&format!("Connecting to {}...", session.device().address));

    let result = send(&mut session, gesture).await;
    session.close().await?;

    let action = result?;
    print_success(&format!("Sent {}", action));
    Ok(())
}

async fn send(session: &mut DeviceSession, gesture: &InputGesture) -> Result<PointerAction> {
    session
        .connect(&[
            TransportKind::Socket,
            TransportKind::Shell,
            TransportKind::Framebuffer,
        ])
        .await?;

    let action = resolve(session, gesture).await?;
    session
        .coordinator()
        .pointer(action)
        .await
        .context("Failed to send pointer input")?;
    Ok(action)
}

/// Turn the typed gesture into screen coordinates
async fn resolve(session: &DeviceSession, gesture: &InputGesture) -> Result<PointerAction> {
    let coordinator = session.coordinator();
    let locate = move |x: u32, y: u32, view: Option<(u32, u32)>| async move {
        match view {
            Some((width, height)) => coordinator
                .map_view_point(ViewPoint {
                    x,
                    y,
                    width,
                    height,
                })
                .await
                .context("Failed to map view coordinates"),
            None => screen_point(x, y),
        }
    };

    Ok(match *gesture {
        InputGesture::Tap { x, y, view } => PointerAction::Click(locate(x, y, view).await?),
        InputGesture::Drag {
            x1,
            y1,
            x2,
            y2,
            view,
        } => PointerAction::Drag {
            from: locate(x1, y1, view).await?,
            to: locate(x2, y2, view).await?,
        },
        InputGesture::Scroll {
            direction,
            steps,
            at,
        } => PointerAction::Scroll {
            direction: direction.into(),
            steps: steps.max(1),
            at: at.map(|(x, y)| screen_point(x, y)).transpose()?,
        },
    })
}
