use serde::Serialize;

use crate::geometry::{CropRect, Point};

/// Raw pointer input in client coordinates, as delivered by the page.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerInput {
    MouseDown(Point),
    MouseMove(Point),
    MouseUp,
    TouchStart(Vec<Point>),
    TouchMove(Vec<Point>),
    TouchEnd,
}

/// Pointer input reduced to display space of the image element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GestureEvent {
    Begin(Point),
    Update(Point),
    End,
}

impl PointerInput {
    /// Translates client coordinates by the image element origin. Mouse and
    /// touch become indistinguishable here; only the first touch counts.
    pub fn reduce(&self, origin: Point) -> Option<GestureEvent> {
        let relative = |point: &Point| Point::new(point.x - origin.x, point.y - origin.y);
        match self {
            PointerInput::MouseDown(point) => Some(GestureEvent::Begin(relative(point))),
            PointerInput::MouseMove(point) => Some(GestureEvent::Update(relative(point))),
            PointerInput::TouchStart(touches) => {
                touches.first().map(|point| GestureEvent::Begin(relative(point)))
            }
            PointerInput::TouchMove(touches) => {
                touches.first().map(|point| GestureEvent::Update(relative(point)))
            }
            PointerInput::MouseUp | PointerInput::TouchEnd => Some(GestureEvent::End),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GestureTracker {
    start: Option<Point>,
    rect: CropRect,
    dragging: bool,
}

impl GestureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, point: Point) {
        self.start = Some(point);
        self.rect = CropRect::new(point.x, point.y, 0.0, 0.0);
        self.dragging = true;
    }

    /// Ignored unless a drag is active; move events keep arriving with the
    /// button released.
    pub fn update(&mut self, point: Point) {
        if !self.dragging {
            return;
        }
        let Some(start) = self.start else {
            return;
        };
        self.rect = CropRect::from_corners(start, point);
    }

    pub fn end(&mut self) {
        self.dragging = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn handle(&mut self, event: GestureEvent) {
        match event {
            GestureEvent::Begin(point) => self.begin(point),
            GestureEvent::Update(point) => self.update(point),
            GestureEvent::End => self.end(),
        }
    }

    pub fn rect(&self) -> CropRect {
        self.rect
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }
}
