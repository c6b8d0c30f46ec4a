use image::GrayImage;

use crate::detection::domain::detection_params::DetectionParams;
use crate::shared::region::Region;

/// Domain interface for the "detect regions" primitive.
///
/// Implementations are read-only after construction (`&self`, `Sync`) so a
/// single instance can be shared across concurrent frame callbacks. Returned
/// regions lie inside the image bounds.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, gray: &GrayImage, params: &DetectionParams) -> Vec<Region>;
}
