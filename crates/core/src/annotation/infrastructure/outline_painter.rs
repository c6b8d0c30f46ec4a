use crate::annotation::domain::annotation_style::AnnotationStyle;
use crate::annotation::domain::region_painter::RegionPainter;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Draws a solid rectangular outline around each region.
///
/// Lines grow inward from the region edges, so an outline never extends past
/// its region and regions are clamped to the frame first.
pub struct OutlinePainter {
    style: AnnotationStyle,
}

impl OutlinePainter {
    pub fn new(style: AnnotationStyle) -> Self {
        Self { style }
    }
}

impl Default for OutlinePainter {
    fn default() -> Self {
        Self::new(AnnotationStyle::default())
    }
}

impl RegionPainter for OutlinePainter {
    fn paint(&self, frame: &mut Frame, regions: &[Region]) {
        if self.style.thickness == 0 {
            return;
        }
        let fw = frame.width() as usize;
        let channels = frame.channels() as usize;
        let (fw_u32, fh_u32) = (frame.width(), frame.height());
        let color = self.style.color.bytes_for(frame.format());
        let data = frame.data_mut();

        for r in regions.iter().filter_map(|r| r.clamp_to(fw_u32, fh_u32)) {
            let x0 = r.x as usize;
            let y0 = r.y as usize;
            let x1 = r.right() as usize;
            let y1 = r.bottom() as usize;
            let t = (self.style.thickness as usize).min(x1 - x0).min(y1 - y0);

            let mut fill = |y: usize, from: usize, to: usize| {
                let row = y * fw * channels;
                for px in data[row + from * channels..row + to * channels].chunks_exact_mut(channels) {
                    px[..3].copy_from_slice(&color);
                }
            };

            for y in y0..y1 {
                if y < y0 + t || y >= y1 - t {
                    fill(y, x0, x1);
                } else {
                    fill(y, x0, x0 + t);
                    fill(y, x1 - t, x1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::domain::annotation_style::BoxColor;
    use crate::shared::frame::PixelFormat;

    fn black(width: u32, height: u32) -> Frame {
        Frame::new(vec![0; (width * height * 3) as usize], width, height, 3, 0)
    }

    fn pixel(frame: &Frame, x: usize, y: usize) -> [u8; 3] {
        let i = (y * frame.width() as usize + x) * 3;
        [frame.data()[i], frame.data()[i + 1], frame.data()[i + 2]]
    }

    fn painted_pixels(frame: &Frame) -> Vec<(usize, usize)> {
        let w = frame.width() as usize;
        frame
            .data()
            .chunks_exact(3)
            .enumerate()
            .filter(|(_, px)| px.iter().any(|&v| v != 0))
            .map(|(i, _)| (i % w, i / w))
            .collect()
    }

    fn painter(color: BoxColor, thickness: u32) -> OutlinePainter {
        OutlinePainter::new(AnnotationStyle { color, thickness })
    }

    #[test]
    fn test_no_regions_leaves_frame_untouched() {
        let mut frame = black(20, 20);
        OutlinePainter::default().paint(&mut frame, &[]);
        assert_eq!(frame, black(20, 20));
    }

    #[test]
    fn test_two_pixel_outline_geometry() {
        let mut frame = black(20, 20);
        painter(BoxColor::Green, 2).paint(&mut frame, &[Region::new(5, 5, 10, 10)]);

        // Edges and the second inner ring are painted.
        assert_eq!(pixel(&frame, 5, 5), [0, 255, 0]);
        assert_eq!(pixel(&frame, 6, 10), [0, 255, 0]);
        assert_eq!(pixel(&frame, 14, 14), [0, 255, 0]);
        assert_eq!(pixel(&frame, 13, 10), [0, 255, 0]);
        // Interior and exterior are not.
        assert_eq!(pixel(&frame, 7, 7), [0, 0, 0]);
        assert_eq!(pixel(&frame, 4, 5), [0, 0, 0]);
        assert_eq!(pixel(&frame, 15, 15), [0, 0, 0]);
        // 10x10 box minus 6x6 interior
        assert_eq!(painted_pixels(&frame).len(), 100 - 36);
    }

    #[test]
    fn test_color_follows_pixel_format() {
        let mut frame = black(10, 10).with_format(PixelFormat::Bgr24);
        painter(BoxColor::Red, 1).paint(&mut frame, &[Region::new(0, 0, 10, 10)]);
        assert_eq!(pixel(&frame, 0, 0), [0, 0, 255]);
    }

    #[test]
    fn test_region_past_frame_edge_is_clamped() {
        let mut frame = black(20, 20);
        painter(BoxColor::Blue, 2).paint(&mut frame, &[Region::new(15, 15, 30, 30)]);
        let painted = painted_pixels(&frame);
        assert!(!painted.is_empty());
        assert!(painted.iter().all(|&(x, y)| x >= 15 && y >= 15 && x < 20 && y < 20));
    }

    #[test]
    fn test_region_outside_frame_draws_nothing() {
        let mut frame = black(20, 20);
        painter(BoxColor::Blue, 2).paint(&mut frame, &[Region::new(40, 40, 10, 10)]);
        assert!(painted_pixels(&frame).is_empty());
    }

    #[test]
    fn test_thin_region_is_filled() {
        let mut frame = black(20, 20);
        painter(BoxColor::Green, 2).paint(&mut frame, &[Region::new(2, 2, 3, 1)]);
        assert_eq!(painted_pixels(&frame), vec![(2, 2), (3, 2), (4, 2)]);
    }

    #[test]
    fn test_zero_thickness_draws_nothing() {
        let mut frame = black(20, 20);
        painter(BoxColor::Green, 0).paint(&mut frame, &[Region::new(2, 2, 10, 10)]);
        assert!(painted_pixels(&frame).is_empty());
    }
}
