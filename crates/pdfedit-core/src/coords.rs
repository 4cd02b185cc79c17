//! Coordinate transformation between page space and screen space
//!
//! Page space is the PDF page's own coordinate system after a single Y flip
//! (top-left origin, points, zoom independent). Screen space is the pixel
//! space of the rendered canvas inside its scroll container:
//!
//! ```text
//! screen = page * zoom + canvas_origin
//! page   = (screen - canvas_origin) / zoom
//! ```
//!
//! Every stored overlay coordinate lives in page space; projection happens
//! only when drawing or hit-testing.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

use crate::geometry::Rotation;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned rectangle, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build the smallest rectangle containing both corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

/// Top-left offset of the rendered bitmap within its scroll container.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CanvasOrigin {
    pub x: f64,
    pub y: f64,
}

impl CanvasOrigin {
    pub const ZERO: CanvasOrigin = CanvasOrigin { x: 0.0, y: 0.0 };

    /// Origin of a bitmap centered in a container, pinned to the top-left
    /// edge when the bitmap is larger than the container.
    pub fn centered(container: (f64, f64), bitmap: (u32, u32)) -> Self {
        let (cw, ch) = container;
        Self {
            x: ((cw - bitmap.0 as f64) / 2.0).max(0.0),
            y: ((ch - bitmap.1 as f64) / 2.0).max(0.0),
        }
    }

    fn as_point(self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Zoom and canvas origin captured after a render; everything needed to project.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub zoom: f64,
    pub origin: CanvasOrigin,
}

impl ViewTransform {
    pub fn new(zoom: f64, origin: CanvasOrigin) -> Self {
        Self { zoom, origin }
    }

    pub fn page_to_screen(&self, p: Point) -> Point {
        page_to_screen(p, self.zoom, self.origin)
    }

    pub fn screen_to_page(&self, s: Point) -> Point {
        screen_to_page(s, self.zoom, self.origin)
    }

    pub fn rect_to_screen(&self, r: PageRect) -> PageRect {
        rect_to_screen(r, self.zoom, self.origin)
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::new(1.0, CanvasOrigin::ZERO)
    }
}

pub fn page_to_screen(p: Point, zoom: f64, origin: CanvasOrigin) -> Point {
    Point::new(p.x * zoom, p.y * zoom) + origin.as_point()
}

pub fn screen_to_page(s: Point, zoom: f64, origin: CanvasOrigin) -> Point {
    let local = s - origin.as_point();
    Point::new(local.x / zoom, local.y / zoom)
}

pub fn rect_to_screen(r: PageRect, zoom: f64, origin: CanvasOrigin) -> PageRect {
    let top_left = page_to_screen(r.origin(), zoom, origin);
    PageRect::new(top_left.x, top_left.y, r.width * zoom, r.height * zoom)
}

/// Convert a bottom-left-origin Y (text baseline) to top-left origin.
pub fn flip_baseline(page_height: f64, y_baseline: f64) -> f64 {
    page_height - y_baseline
}

/// Map a point of an unrotated page (top-left origin, `width` x `height`)
/// into the space of the page as displayed with a clockwise `/Rotate`.
pub fn rotate_point(p: Point, width: f64, height: f64, rotation: Rotation) -> Point {
    match rotation {
        Rotation::None => p,
        Rotation::Quarter => Point::new(height - p.y, p.x),
        Rotation::Half => Point::new(width - p.x, height - p.y),
        Rotation::ThreeQuarter => Point::new(p.y, width - p.x),
    }
}

/// Inverse of [`rotate_point`]: displayed point back to the unrotated page.
pub fn unrotate_point(p: Point, width: f64, height: f64, rotation: Rotation) -> Point {
    match rotation {
        Rotation::None => p,
        Rotation::Quarter => Point::new(p.y, height - p.x),
        Rotation::Half => Point::new(width - p.x, height - p.y),
        Rotation::ThreeQuarter => Point::new(width - p.y, p.x),
    }
}

pub fn rotate_rect(r: PageRect, width: f64, height: f64, rotation: Rotation) -> PageRect {
    let a = rotate_point(r.origin(), width, height, rotation);
    let b = rotate_point(
        Point::new(r.x + r.width, r.y + r.height),
        width,
        height,
        rotation,
    );
    PageRect::from_corners(a, b)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn coordinate() -> impl Strategy<Value = f64> {
        -2000.0f64..2000.0
    }

    fn zoom() -> impl Strategy<Value = f64> {
        0.1f64..5.0
    }

    fn rotation() -> impl Strategy<Value = Rotation> {
        prop_oneof![
            Just(Rotation::None),
            Just(Rotation::Quarter),
            Just(Rotation::Half),
            Just(Rotation::ThreeQuarter),
        ]
    }

    proptest! {
        /// screen_to_page(page_to_screen(p, z), z) == p for any zoom and origin
        #[test]
        fn roundtrip_page_to_screen_to_page(
            x in coordinate(),
            y in coordinate(),
            z in zoom(),
            ox in 0.0f64..500.0,
            oy in 0.0f64..500.0,
        ) {
            let origin = CanvasOrigin { x: ox, y: oy };
            let p = Point::new(x, y);
            let back = screen_to_page(page_to_screen(p, z, origin), z, origin);

            let tolerance = 1e-9 * (1.0 + x.abs().max(y.abs()));
            prop_assert!((back.x - p.x).abs() < tolerance, "x: {} -> {}", p.x, back.x);
            prop_assert!((back.y - p.y).abs() < tolerance, "y: {} -> {}", p.y, back.y);
        }

        #[test]
        fn unrotate_inverts_rotate(
            x in 0.0f64..612.0,
            y in 0.0f64..792.0,
            r in rotation(),
        ) {
            let p = Point::new(x, y);
            let back = unrotate_point(rotate_point(p, 612.0, 792.0, r), 612.0, 792.0, r);
            prop_assert!((back.x - p.x).abs() < 1e-9);
            prop_assert!((back.y - p.y).abs() < 1e-9);
        }

        /// Rotating a quarter turn four times is the identity
        #[test]
        fn four_quarter_turns_compose_to_identity(x in 0.0f64..612.0, y in 0.0f64..792.0) {
            let (mut w, mut h) = (612.0, 792.0);
            let mut p = Point::new(x, y);
            for _ in 0..4 {
                p = rotate_point(p, w, h, Rotation::Quarter);
                std::mem::swap(&mut w, &mut h);
            }
            prop_assert!((p.x - x).abs() < 1e-9);
            prop_assert!((p.y - y).abs() < 1e-9);
        }
    }
}
