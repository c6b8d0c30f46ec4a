use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::frame_source::FrameSource;

/// Adapts a single image file to the [`FrameSource`] interface.
///
/// The image is a one-frame stream with `fps = 0` and `total_frames = 1`,
/// so stills and streams go through the same annotator.
pub struct ImageFileReader {
    path: PathBuf,
    frame: Option<Frame>,
    opened: bool,
}

impl ImageFileReader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            frame: None,
            opened: false,
        }
    }
}

impl FrameSource for ImageFileReader {
    fn open(&mut self) -> Result<StreamMetadata, Box<dyn std::error::Error>> {
        let img = image::open(&self.path)?.into_rgb8();
        let (width, height) = img.dimensions();
        let format = image::ImageFormat::from_path(&self.path)
            .map(|f| format!("{f:?}").to_lowercase())
            .unwrap_or_default();

        self.frame = Some(Frame::new(img.into_raw(), width, height, 3, 0));
        self.opened = true;

        Ok(StreamMetadata {
            width,
            height,
            fps: 0.0,
            total_frames: 1,
            codec: format,
            source_path: Some(self.path.clone()),
            live: false,
        })
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        if !self.opened {
            return Box::new(std::iter::once(Err("ImageFileReader: not opened".into())));
        }
        Box::new(self.frame.take().into_iter().map(Ok))
    }

    fn close(&mut self) {
        self.frame = None;
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_image(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("test.png");
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([50, 100, 200]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_open_returns_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 100, 80);
        let mut reader = ImageFileReader::new(&path);
        let meta = reader.open().unwrap();
        assert_eq!((meta.width, meta.height), (100, 80));
        assert_eq!(meta.fps, 0.0);
        assert_eq!(meta.total_frames, 1);
        assert_eq!(meta.codec, "png");
        assert_eq!(meta.source_path, Some(path));
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let mut reader = ImageFileReader::new(Path::new("/nonexistent/test.png"));
        assert!(reader.open().is_err());
    }

    #[test]
    fn test_single_rgb_frame_then_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 100, 80);
        let mut reader = ImageFileReader::new(&path);
        reader.open().unwrap();

        let frames: Vec<Frame> = reader.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].index(), 0);
        assert_eq!(&frames[0].data()[..3], &[50, 100, 200]);

        assert!(reader.frames().next().is_none());
    }

    #[test]
    fn test_frames_without_open_returns_error() {
        let mut reader = ImageFileReader::new(Path::new("unused.png"));
        assert!(reader.frames().next().unwrap().is_err());
    }

    #[test]
    fn test_close_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 10, 10);
        let mut reader = ImageFileReader::new(&path);
        reader.open().unwrap();
        reader.close();
        reader.close();
    }
}
