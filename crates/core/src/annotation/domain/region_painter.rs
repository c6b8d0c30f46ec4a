use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Draws detection results onto a color frame in place.
///
/// Implementations must not touch pixels outside the given regions.
pub trait RegionPainter: Send + Sync {
    fn paint(&self, frame: &mut Frame, regions: &[Region]);
}
