//! Pointer input for the front panel
//!
//! Positions are framebuffer pixels unless a type says otherwise.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wheel delta reported per notch by most desktop toolkits
const WHEEL_DELTA_PER_NOTCH: u32 = 120;

/// A framebuffer pixel position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: u16,
    pub y: u16,
}

impl Point {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Size of the device screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u16,
    pub height: u16,
}

impl Resolution {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Clamp a point onto the screen
    pub fn clamp(&self, point: Point) -> Point {
        Point {
            x: point.x.min(self.width.saturating_sub(1)),
            y: point.y.min(self.height.saturating_sub(1)),
        }
    }

    /// Map a point on a scaled, rotated view of the screen back to
    /// framebuffer coordinates
    ///
    /// The view is scaled to the screen size first, then the rotation the
    /// panel server was started with (0, 90, 180 or 270 degrees) is undone.
    /// Other rotations are treated as 0. Returns `None` for an empty view.
    pub fn map_view_point(&self, view: &ViewPoint, rotation: u16) -> Option<Point> {
        if view.width == 0 || view.height == 0 || self.width == 0 || self.height == 0 {
            return None;
        }

        let (w, h) = (i64::from(self.width), i64::from(self.height));
        let x = i64::from(view.x) * w / i64::from(view.width);
        let y = i64::from(view.y) * h / i64::from(view.height);

        let (x, y) = match rotation {
            90 => (h - y, x),
            180 => (w - x, h - y),
            270 => (y, w - x),
            _ => (x, y),
        };

        let clamp = |value: i64, size: i64| value.clamp(0, size - 1) as u16;
        Some(Point::new(clamp(x, w), clamp(y, h)))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A position on a view of the screen that may be scaled and rotated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPoint {
    pub x: u32,
    pub y: u32,
    /// Width of the view the position was taken on
    pub width: u32,
    /// Height of the view the position was taken on
    pub height: u32,
}

/// Wheel scroll direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Left => "left",
            ScrollDirection::Right => "right",
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pointer gesture, executed as a sequence of pointer events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PointerAction {
    /// Move, press and release the primary button
    Click(Point),
    /// Press at `from`, hold briefly, move to `to`, release
    Drag { from: Point, to: Point },
    /// Move and press the primary button, leaving it held
    Press(Point),
    /// Move without changing the held buttons
    Move(Point),
    /// Move and release the primary button
    Release(Point),
    /// Wheel notches, optionally after moving to `at`
    Scroll {
        direction: ScrollDirection,
        steps: u32,
        at: Option<Point>,
    },
}

impl PointerAction {
    /// Build a scroll from a raw wheel delta
    ///
    /// Positive deltas scroll up (or left when `horizontal`). Deltas of a
    /// full notch or more count in notches; smaller ones count as steps.
    /// A zero delta is no scroll at all.
    pub fn wheel(delta: i32, horizontal: bool, at: Option<Point>) -> Option<Self> {
        let magnitude = delta.unsigned_abs();
        if magnitude == 0 {
            return None;
        }

        let steps = if magnitude >= WHEEL_DELTA_PER_NOTCH {
            (magnitude + WHEEL_DELTA_PER_NOTCH / 2) / WHEEL_DELTA_PER_NOTCH
        } else {
            magnitude
        };

        let direction = match (horizontal, delta > 0) {
            (false, true) => ScrollDirection::Up,
            (false, false) => ScrollDirection::Down,
            (true, true) => ScrollDirection::Left,
            (true, false) => ScrollDirection::Right,
        };

        Some(Self::Scroll {
            direction,
            steps: steps.max(1),
            at,
        })
    }
}

impl fmt::Display for PointerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click(at) => write!(f, "click at {}", at),
            Self::Drag { from, to } => write!(f, "drag from {} to {}", from, to),
            Self::Press(at) => write!(f, "press at {}", at),
            Self::Move(at) => write!(f, "move to {}", at),
            Self::Release(at) => write!(f, "release at {}", at),
            Self::Scroll {
                direction, steps, ..
            } => write!(f, "scroll {} x{}", direction, steps),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PANEL: Resolution = Resolution::new(800, 480);

    fn view(x: u32, y: u32) -> ViewPoint {
        ViewPoint {
            x,
            y,
            width: 400,
            height: 240,
        }
    }

    #[test]
    fn test_map_view_point_scales() {
        assert_eq!(PANEL.map_view_point(&view(100, 60), 0), Some(Point::new(200, 120)));
    }

    #[test]
    fn test_map_view_point_rotations() {
        assert_eq!(PANEL.map_view_point(&view(100, 60), 180), Some(Point::new(600, 360)));
        assert_eq!(PANEL.map_view_point(&view(100, 60), 90), Some(Point::new(360, 200)));
        assert_eq!(PANEL.map_view_point(&view(100, 60), 270), Some(Point::new(120, 479)));
    }

    #[test]
    fn test_map_view_point_clamps_and_rejects_empty() {
        assert_eq!(PANEL.map_view_point(&view(400, 240), 0), Some(Point::new(799, 479)));
        let empty = ViewPoint {
            width: 0,
            ..view(1, 1)
        };
        assert_eq!(PANEL.map_view_point(&empty, 0), None);
    }

    #[test]
    fn test_wheel_steps() {
        assert_eq!(PointerAction::wheel(0, false, None), None);
        assert_eq!(
            PointerAction::wheel(240, false, None),
            Some(PointerAction::Scroll {
                direction: ScrollDirection::Up,
                steps: 2,
                at: None
            })
        );
        assert_eq!(
            PointerAction::wheel(-3, true, None),
            Some(PointerAction::Scroll {
                direction: ScrollDirection::Right,
                steps: 3,
                at: None
            })
        );
    }

    #[test]
    fn test_action_json_shape() {
        let json = serde_json::to_string(&PointerAction::Click(Point::new(3, 4))).unwrap();
        assert_eq!(json, r#"{"action":"click","x":3,"y":4}"#);
    }
}
