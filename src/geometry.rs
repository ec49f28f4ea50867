use serde::{Deserialize, Serialize};

/// A position on the touch surface, in screen pixels.
///
/// "No finger tracked" is expressed as `Option<Point>` rather than a
/// sentinel flag, so a missing position can never leak into a distance
/// or delta computation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`
    pub fn dist(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Vertical offset from `origin` (positive means further down the screen)
    pub fn dy_from(&self, origin: &Point) -> f32 {
        self.y - origin.y
    }

    /// Horizontal offset from `origin`
    pub fn dx_from(&self, origin: &Point) -> f32 {
        self.x - origin.x
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}
