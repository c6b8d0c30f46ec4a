/// Axis-aligned rectangle in frame-pixel coordinates.
///
/// Regions carry no identity: every frame's detections are computed
/// independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn intersection_area(&self, other: &Region) -> i64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());
        (ix2 - ix1).max(0) as i64 * (iy2 - iy1).max(0) as i64
    }

    /// Fraction of `other` covered by this region.
    pub fn coverage_of(&self, other: &Region) -> f64 {
        let area = other.area();
        if area == 0 {
            return 0.0;
        }
        self.intersection_area(other) as f64 / area as f64
    }

    /// Whether the region lies entirely inside a `width x height` frame.
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && !self.is_empty()
            && self.right() as i64 <= width as i64
            && self.bottom() as i64 <= height as i64
    }

    /// Intersects the region with the frame, returning `None` when nothing
    /// remains.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Region> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = (self.right() as i64).min(width as i64) as i32;
        let y2 = (self.bottom() as i64).min(height as i64) as i32;
        let clamped = Region::new(x1, y1, x2 - x1, y2 - y1);
        (!clamped.is_empty()).then_some(clamped)
    }
}
