//! Extents and integer rectangles

use serde::{Deserialize, Serialize};

/// A 2D extent in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub width: usize,
    pub height: usize,
}

impl Shape {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Total number of samples
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Cap both dimensions at `bounds`
    pub fn min(&self, bounds: Shape) -> Shape {
        Shape::new(self.width.min(bounds.width), self.height.min(bounds.height))
    }

    /// Component-wise maximum
    pub fn max(&self, other: Shape) -> Shape {
        Shape::new(self.width.max(other.width), self.height.max(other.height))
    }
}

/// An axis-aligned rectangle on the sample grid.
///
/// `x1()` and `y1()` are exclusive: the first column/row past the rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rectangle {
    pub x0: usize,
    pub y0: usize,
    pub width: usize,
    pub height: usize,
}

impl Rectangle {
    pub const fn new(x0: usize, y0: usize, width: usize, height: usize) -> Self {
        Self {
            x0,
            y0,
            width,
            height,
        }
    }

    /// Rectangle anchored at the origin covering `shape`
    pub fn from_shape(shape: Shape) -> Self {
        Self::new(0, 0, shape.width, shape.height)
    }

    pub fn x1(&self) -> usize {
        self.x0 + self.width
    }

    pub fn y1(&self) -> usize {
        self.y0 + self.height
    }

    pub fn shape(&self) -> Shape {
        Shape::new(self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether this rectangle lies entirely inside `extent` (anchored at the origin)
    pub fn fits_in(&self, extent: Shape) -> bool {
        self.x1() <= extent.width && self.y1() <= extent.height
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x0 && x < self.x1() && y >= self.y0 && y < self.y1()
    }
}
