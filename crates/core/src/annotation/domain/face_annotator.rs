use std::sync::Arc;

use crate::annotation::domain::frame_preprocessor::FramePreprocessor;
use crate::annotation::domain::frame_processor::FrameProcessor;
use crate::annotation::domain::region_painter::RegionPainter;
use crate::detection::domain::detection_params::DetectionParams;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::error::AnnotateError;
use crate::shared::frame::Frame;

/// Detects faces in `frame` and paints them onto it.
///
/// Returns the number of regions painted. The frame must already be valid.
pub fn annotate(
    frame: &mut Frame,
    detector: &dyn FaceDetector,
    params: &DetectionParams,
    painter: &dyn RegionPainter,
) -> usize {
    let gray = frame.to_luma();
    let regions = detector.detect(&gray, params);
    painter.paint(frame, &regions);
    regions.len()
}

/// Per-frame face annotation with a shared, read-only detector.
///
/// Every call is independent, so one annotator can be driven from a poll
/// loop or from many worker threads at once.
pub struct FaceAnnotator {
    detector: Arc<dyn FaceDetector>,
    params: DetectionParams,
    painter: Box<dyn RegionPainter>,
    preprocessors: Vec<Box<dyn FramePreprocessor>>,
}

impl FaceAnnotator {
    pub fn new(
        detector: Arc<dyn FaceDetector>,
        params: DetectionParams,
        painter: Box<dyn RegionPainter>,
    ) -> Self {
        Self {
            detector,
            params,
            painter,
            preprocessors: Vec::new(),
        }
    }

    /// Appends a step that runs on the frame before detection.
    pub fn with_preprocessor(mut self, preprocessor: Box<dyn FramePreprocessor>) -> Self {
        self.preprocessors.push(preprocessor);
        self
    }
}

impl FrameProcessor for FaceAnnotator {
    fn process(&self, mut frame: Frame) -> Result<Frame, AnnotateError> {
        frame.validate()?;
        for step in &self.preprocessors {
            step.apply(&mut frame);
        }
        let count = annotate(
            &mut frame,
            self.detector.as_ref(),
            &self.params,
            self.painter.as_ref(),
        );
        log::debug!("Frame {}: {count} face(s)", frame.index());
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::domain::annotation_style::AnnotationStyle;
    use crate::annotation::infrastructure::mirror_flip::MirrorFlip;
    use crate::annotation::infrastructure::outline_painter::OutlinePainter;
    use crate::shared::region::Region;
    use image::GrayImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubDetector {
        regions: Vec<Region>,
        calls: AtomicUsize,
    }

    impl StubDetector {
        fn new(regions: Vec<Region>) -> Arc<Self> {
            Arc::new(Self {
                regions,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl FaceDetector for StubDetector {
        fn detect(&self, _gray: &GrayImage, _params: &DetectionParams) -> Vec<Region> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.regions.clone()
        }
    }

    /// Finds bright pixels so tests can check detection ran on the flipped frame.
    struct BrightestColumnDetector;

    impl FaceDetector for BrightestColumnDetector {
        fn detect(&self, gray: &GrayImage, _params: &DetectionParams) -> Vec<Region> {
            gray.enumerate_pixels()
                .find(|(_, _, p)| p.0[0] > 200)
                .map(|(x, _, _)| vec![Region::new(x as i32, 0, 1, 1)])
                .unwrap_or_default()
        }
    }

    fn annotator(detector: Arc<dyn FaceDetector>) -> FaceAnnotator {
        FaceAnnotator::new(
            detector,
            DetectionParams::default(),
            Box::new(OutlinePainter::new(AnnotationStyle::default())),
        )
    }

    fn gradient(width: u32, height: u32) -> Frame {
        let data = (0..width * height * 3).map(|v| (v % 97) as u8).collect();
        Frame::new(data, width, height, 3, 7)
    }

    #[test]
    fn test_preserves_dimensions_and_index() {
        let stub = StubDetector::new(vec![Region::new(10, 10, 20, 20)]);
        let out = annotator(stub).process(gradient(64, 48)).unwrap();
        assert_eq!((out.width(), out.height(), out.channels()), (64, 48, 3));
        assert_eq!(out.index(), 7);
        assert_eq!(out.data().len(), 64 * 48 * 3);
    }

    #[test]
    fn test_no_regions_is_pixel_identical() {
        let frame = gradient(64, 48);
        let out = annotator(StubDetector::new(vec![])).process(frame.clone()).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn test_black_frame_unchanged_with_default_painter() {
        let frame = Frame::new(vec![0; 100 * 100 * 3], 100, 100, 3, 0);
        let out = annotator(StubDetector::new(vec![])).process(frame.clone()).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn test_drawn_pixels_stay_inside_regions() {
        let frame = Frame::new(vec![0; 40 * 30 * 3], 40, 30, 3, 0);
        let regions = vec![Region::new(-5, -5, 20, 20), Region::new(30, 20, 50, 50)];
        let out = annotator(StubDetector::new(regions.clone())).process(frame).unwrap();

        let w = out.width() as i32;
        let mut painted = 0;
        for (i, px) in out.data().chunks_exact(3).enumerate() {
            if px == [0, 0, 0] {
                continue;
            }
            painted += 1;
            let (x, y) = (i as i32 % w, i as i32 / w);
            let inside_any = regions
                .iter()
                .any(|r| x >= r.x && y >= r.y && x < r.right() && y < r.bottom());
            assert!(inside_any, "pixel ({x}, {y}) painted outside every region");
        }
        assert!(painted > 0);
    }

    #[test]
    fn test_zero_sized_frame_is_invalid() {
        let stub = StubDetector::new(vec![]);
        let result = annotator(stub.clone()).process(Frame::new(vec![], 0, 0, 3, 0));
        assert!(matches!(result, Err(AnnotateError::InvalidFrame(_))));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_preprocessors_run_before_detection() {
        // Bright pixel at x = 0 ends up at x = 3 after mirroring.
        let mut data = vec![0u8; 4 * 1 * 3];
        data[..3].copy_from_slice(&[255, 255, 255]);
        let frame = Frame::new(data, 4, 1, 3, 0);

        let out = annotator(Arc::new(BrightestColumnDetector))
            .with_preprocessor(Box::new(MirrorFlip))
            .process(frame)
            .unwrap();
        assert_eq!(&out.data()[9..12], &[0, 255, 0]);
        assert_eq!(&out.data()[..3], &[0, 0, 0]);
    }

    #[test]
    fn test_concurrent_calls_share_one_detector() {
        let stub = StubDetector::new(vec![Region::new(2, 2, 8, 8)]);
        let annotator = Arc::new(annotator(stub.clone()));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let annotator = Arc::clone(&annotator);
                std::thread::spawn(move || {
                    let frame = Frame::new(vec![0; 16 * 16 * 3], 16, 16, 3, i);
                    annotator.process(frame).unwrap()
                })
            })
            .collect();

        let outputs: Vec<Frame> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(stub.calls.load(Ordering::SeqCst), 4);
        for (i, out) in outputs.iter().enumerate() {
            assert_eq!(out.index(), i);
            assert_eq!(out.data(), outputs[0].data());
        }
    }

    #[test]
    fn test_annotate_reports_region_count() {
        let mut frame = gradient(32, 32);
        let stub = StubDetector::new(vec![Region::new(0, 0, 8, 8), Region::new(16, 16, 8, 8)]);
        let painter = OutlinePainter::default();
        let count = annotate(&mut frame, stub.as_ref(), &DetectionParams::default(), &painter);
        assert_eq!(count, 2);
    }
}
