//! Editor window chrome
//!
//! The editing surface lives in a resizable, movable frame. Its gestures use
//! the same start-pointer arithmetic as overlay drags but are tracked here,
//! apart from [`InteractionController`](crate::interaction::InteractionController),
//! so a frame resize can never be mistaken for an overlay gesture.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EditorConfig;
use crate::coords::Point;
use crate::source::DocumentSource;

/// The document the frame was opened for.
#[derive(Debug, Clone)]
pub struct FileRef {
    pub name: String,
    pub source: DocumentSource,
}

impl FileRef {
    pub fn new(source: DocumentSource) -> Self {
        Self {
            name: source.display_name(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModalSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FrameGesture {
    Idle,
    Resizing { start: Point, start_size: ModalSize },
    Moving { start: Point, start_position: Point },
}

#[derive(Debug, Clone)]
pub struct ModalHost {
    file: Option<FileRef>,
    size: ModalSize,
    default_size: ModalSize,
    min_size: ModalSize,
    position: Point,
    gesture: FrameGesture,
}

impl ModalHost {
    pub fn new(config: &EditorConfig) -> Self {
        let default_size = ModalSize {
            width: config.modal_default_width.max(config.modal_min_width),
            height: config.modal_default_height.max(config.modal_min_height),
        };
        Self {
            file: None,
            size: default_size,
            default_size,
            min_size: ModalSize {
                width: config.modal_min_width,
                height: config.modal_min_height,
            },
            position: Point::default(),
            gesture: FrameGesture::Idle,
        }
    }

    /// Show the frame for `file` at its default size.
    pub fn open(&mut self, file: FileRef) {
        debug!(name = %file.name, "opening editor");
        self.file = Some(file);
        self.size = self.default_size;
        self.gesture = FrameGesture::Idle;
    }

    pub fn close(&mut self) -> Option<FileRef> {
        self.gesture = FrameGesture::Idle;
        self.file.take()
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn file(&self) -> Option<&FileRef> {
        self.file.as_ref()
    }

    pub fn size(&self) -> ModalSize {
        self.size
    }

    pub fn position(&self) -> Point {
        self.position
    }

    /// Area available to the page canvas, the container that
    /// [`CanvasOrigin::centered`](crate::coords::CanvasOrigin::centered) centres in.
    pub fn content_size(&self) -> (f64, f64) {
        (self.size.width, self.size.height)
    }

    fn clamped(&self, width: f64, height: f64) -> ModalSize {
        ModalSize {
            width: width.max(self.min_size.width),
            height: height.max(self.min_size.height),
        }
    }

    pub fn set_size(&mut self, width: f64, height: f64) -> ModalSize {
        self.size = self.clamped(width, height);
        self.size
    }

    /// Pointer-down on the resize grip. Ignored while closed or mid-gesture.
    pub fn begin_resize(&mut self, pointer: Point) -> bool {
        if !self.is_open() || self.gesture != FrameGesture::Idle {
            return false;
        }
        self.gesture = FrameGesture::Resizing {
            start: pointer,
            start_size: self.size,
        };
        true
    }

    pub fn resize_to(&mut self, pointer: Point) -> Option<ModalSize> {
        let FrameGesture::Resizing { start, start_size } = self.gesture else {
            return None;
        };
        let delta = pointer - start;
        self.size = self.clamped(start_size.width + delta.x, start_size.height + delta.y);
        Some(self.size)
    }

    pub fn end_resize(&mut self, pointer: Point) -> Option<ModalSize> {
        let size = self.resize_to(pointer)?;
        self.gesture = FrameGesture::Idle;
        debug!(width = size.width, height = size.height, "editor resized");
        Some(size)
    }

    /// Pointer-down on the title bar.
    pub fn begin_move(&mut self, pointer: Point) -> bool {
        if !self.is_open() || self.gesture != FrameGesture::Idle {
            return false;
        }
        self.gesture = FrameGesture::Moving {
            start: pointer,
            start_position: self.position,
        };
        true
    }

    pub fn move_to(&mut self, pointer: Point) -> Option<Point> {
        let FrameGesture::Moving {
            start,
            start_position,
        } = self.gesture
        else {
            return None;
        };
        self.position = start_position + (pointer - start);
        Some(self.position)
    }

    pub fn end_move(&mut self, pointer: Point) -> Option<Point> {
        let position = self.move_to(pointer)?;
        self.gesture = FrameGesture::Idle;
        Some(position)
    }
}

impl Default for ModalHost {
    fn default() -> Self {
        Self::new(&EditorConfig::default())
    }
}
