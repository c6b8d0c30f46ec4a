use crate::annotation::domain::frame_preprocessor::FramePreprocessor;
use crate::shared::frame::Frame;

/// Horizontal mirror, so a front camera behaves like a selfie view.
pub struct MirrorFlip;

impl FramePreprocessor for MirrorFlip {
    fn apply(&self, frame: &mut Frame) {
        let channels = frame.channels() as usize;
        let row_len = frame.width() as usize * channels;
        if row_len == 0 {
            return;
        }
        for row in frame.data_mut().chunks_exact_mut(row_len) {
            let mut left = 0;
            let mut right = row_len - channels;
            while left < right {
                for c in 0..channels {
                    row.swap(left + c, right + c);
                }
                left += channels;
                right -= channels;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirrors_each_row() {
        #[rustfmt::skip]
        let data = vec![
            1, 1, 1,  2, 2, 2,  3, 3, 3,
            4, 4, 4,  5, 5, 5,  6, 6, 6,
        ];
        let mut frame = Frame::new(data, 3, 2, 3, 0);
        MirrorFlip.apply(&mut frame);
        #[rustfmt::skip]
        let expected = vec![
            3, 3, 3,  2, 2, 2,  1, 1, 1,
            6, 6, 6,  5, 5, 5,  4, 4, 4,
        ];
        assert_eq!(frame.data(), expected.as_slice());
    }

    #[test]
    fn test_keeps_channel_order_within_pixel() {
        let mut frame = Frame::new(vec![10, 20, 30, 40, 50, 60], 2, 1, 3, 0);
        MirrorFlip.apply(&mut frame);
        assert_eq!(frame.data(), &[40, 50, 60, 10, 20, 30]);
    }

    #[test]
    fn test_twice_is_identity() {
        let data: Vec<u8> = (0..5 * 4 * 3).map(|v| v as u8).collect();
        let mut frame = Frame::new(data.clone(), 5, 4, 3, 0);
        MirrorFlip.apply(&mut frame);
        assert_ne!(frame.data(), data.as_slice());
        MirrorFlip.apply(&mut frame);
        assert_eq!(frame.data(), data.as_slice());
    }
}
