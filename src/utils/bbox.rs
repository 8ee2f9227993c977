use image::imageops::crop_imm;
use image::RgbImage;

/// Bounding box in the format (left, top, width, height)
///
#[derive(Clone, Default, Debug, Copy, PartialEq)]
pub struct BoundingBox {
    left: f32,
    top: f32,
    width: f32,
    height: f32,
}

impl BoundingBox {
    /// Constructor
    ///
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Creates the box from corner coordinates `(x1, y1, x2, y2)`, the format trackers
    /// usually emit.
    ///
    pub fn from_ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn left(&self) -> f32 {
        self.left
    }

    pub fn top(&self) -> f32 {
        self.top
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Cuts the box out of the frame.
    ///
    /// Coordinates are truncated to whole pixels and clamped to the frame. Returns `None` for
    /// a degenerate box and when the box and the frame have no pixels in common.
    ///
    pub fn crop(&self, frame: &RgbImage) -> Option<RgbImage> {
        if self.area() <= 0.0 {
            return None;
        }
        let clamp = |v: f32, max: u32| (v.max(0.0) as u32).min(max);

        let x1 = clamp(self.left, frame.width());
        let y1 = clamp(self.top, frame.height());
        let x2 = clamp(self.right(), frame.width());
        let y2 = clamp(self.bottom(), frame.height());

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(crop_imm(frame, x1, y1, x2 - x1, y2 - y1).to_image())
    }
}
