//! Screen geometry shared by the device adapters, config and campaign engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A pixel coordinate on the device screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Shift by `offset`, saturating instead of wrapping.
    #[must_use]
    pub fn offset_by(self, offset: Offset) -> Self {
        Self {
            x: self.x.saturating_add(offset.dx),
            y: self.y.saturating_add(offset.dy),
        }
    }

    /// Offset that moves `self` onto `target`.
    #[must_use]
    pub fn offset_to(self, target: Point) -> Offset {
        Offset::new(target.x - self.x, target.y - self.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Tap displacement relative to a matched template center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
}

impl Offset {
    pub const ZERO: Offset = Offset { dx: 0, dy: 0 };

    #[must_use]
    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.dx == 0 && self.dy == 0
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:+}, {:+})", self.dx, self.dy)
    }
}

/// A straight-line drag across the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Swipe {
    pub from: Point,
    pub to: Point,
    pub duration_ms: u64,
}

impl Swipe {
    #[must_use]
    pub const fn new(from: Point, to: Point, duration_ms: u64) -> Self {
        Self {
            from,
            to,
            duration_ms,
        }
    }

    /// A zero-length swipe, which most touch stacks treat as a long press.
    #[must_use]
    pub const fn press(at: Point, duration_ms: u64) -> Self {
        Self::new(at, at, duration_ms)
    }

    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}
