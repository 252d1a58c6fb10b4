use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(width as f32, height as f32)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Rectangle in display space, origin at the top-left of the rendered image.
///
/// Width and height are never negative. A rectangle without area stands for
/// "no crop selected".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Builds the rectangle spanned by two opposite corners, whichever way
    /// round they are given.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (b.x - a.x).abs(),
            height: (b.y - a.y).abs(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleFactors {
    pub x: f32,
    pub y: f32,
}

impl ScaleFactors {
    pub fn identity() -> Self {
        Self { x: 1.0, y: 1.0 }
    }
}

/// Ratio between intrinsic pixels and rendered pixels on each axis.
/// A zero display dimension maps 1:1 on that axis.
pub fn scale_factors(natural: Size, display: Size) -> ScaleFactors {
    ScaleFactors {
        x: axis_scale(natural.width, display.width),
        y: axis_scale(natural.height, display.height),
    }
}

fn axis_scale(natural: f32, display: f32) -> f32 {
    if display <= 0.0 || !display.is_finite() {
        return 1.0;
    }
    natural / display
}

pub fn to_natural_space(rect: CropRect, scale: ScaleFactors) -> CropRect {
    CropRect {
        x: rect.x * scale.x,
        y: rect.y * scale.y,
        width: rect.width * scale.x,
        height: rect.height * scale.y,
    }
}

/// Intersects `rect` with `[0, bounds.width] x [0, bounds.height]`.
pub fn clamp_to_bounds(rect: CropRect, bounds: Size) -> CropRect {
    let max_x = bounds.width.max(0.0);
    let max_y = bounds.height.max(0.0);
    let left = rect.x.clamp(0.0, max_x);
    let top = rect.y.clamp(0.0, max_y);
    let right = rect.right().clamp(0.0, max_x);
    let bottom = rect.bottom().clamp(0.0, max_y);
    CropRect {
        x: left,
        y: top,
        width: (right - left).max(0.0),
        height: (bottom - top).max(0.0),
    }
}
