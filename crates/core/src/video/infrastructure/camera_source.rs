use crate::shared::error::AnnotateError;
use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::frame_source::FrameSource;
use crate::video::infrastructure::ffmpeg_decoder;

#[cfg(target_os = "linux")]
const CAPTURE_FORMAT: &str = "v4l2";
#[cfg(target_os = "macos")]
const CAPTURE_FORMAT: &str = "avfoundation";
#[cfg(target_os = "windows")]
const CAPTURE_FORMAT: &str = "dshow";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const CAPTURE_FORMAT: &str = "v4l2";

/// Live capture from a camera through the platform's libavdevice input.
///
/// The device name is whatever the capture format expects: a device node
/// on Linux, an index on macOS, a `video=<name>` string on Windows.
pub struct CameraSource {
    device: String,
    framerate: Option<u32>,
    video_size: Option<(u32, u32)>,
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    video_stream_index: usize,
}

// Safety: CameraSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for CameraSource {}

impl CameraSource {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            framerate: None,
            video_size: None,
            input_ctx: None,
            video_stream_index: 0,
        }
    }

    /// Requests a capture rate from the driver.
    pub fn with_framerate(mut self, fps: u32) -> Self {
        self.framerate = Some(fps);
        self
    }

    /// Requests a capture resolution from the driver.
    pub fn with_video_size(mut self, width: u32, height: u32) -> Self {
        self.video_size = Some((width, height));
        self
    }

    fn capture_options(&self) -> ffmpeg_next::Dictionary<'static> {
        let mut options = ffmpeg_next::Dictionary::new();
        if let Some(fps) = self.framerate {
            options.set("framerate", &fps.to_string());
        }
        if let Some((w, h)) = self.video_size {
            options.set("video_size", &format!("{w}x{h}"));
        }
        options
    }

    fn open_device(&self) -> Result<ffmpeg_next::format::context::Input, AnnotateError> {
        let unavailable =
            |reason: String| AnnotateError::DeviceUnavailable(format!("{}: {reason}", self.device));

        ffmpeg_next::init().map_err(|e| unavailable(e.to_string()))?;
        ffmpeg_next::device::register_all();

        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == CAPTURE_FORMAT)
            .ok_or_else(|| unavailable(format!("capture input '{CAPTURE_FORMAT}' not built into ffmpeg")))?;

        match ffmpeg_next::format::open_with(&self.device, &format, self.capture_options()) {
            Ok(ffmpeg_next::format::context::Context::Input(ictx)) => Ok(ictx),
            Ok(_) => Err(unavailable("not an input device".to_string())),
            Err(e) => Err(unavailable(e.to_string())),
        }
    }
}

impl FrameSource for CameraSource {
    fn open(&mut self) -> Result<StreamMetadata, Box<dyn std::error::Error>> {
        let ictx = self.open_device()?;
        let (mut metadata, index) = ffmpeg_decoder::describe(&ictx, Some(self.device.clone().into()))
            .map_err(|e| AnnotateError::DeviceUnavailable(format!("{}: {e}", self.device)))?;
        // Capture devices never report a length.
        metadata.total_frames = 0;
        metadata.live = true;
        log::info!(
            "Opened camera {} via {CAPTURE_FORMAT} ({}x{} @ {:.1} fps, {})",
            self.device,
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.codec
        );

        self.video_stream_index = index;
        self.input_ctx = Some(ictx);
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match self.input_ctx.as_mut() {
            Some(ictx) => ffmpeg_decoder::decode(ictx, self.video_stream_index),
            None => Box::new(std::iter::once(Err("CameraSource: not opened".into()))),
        }
    }

    fn close(&mut self) {
        if self.input_ctx.take().is_some() {
            log::info!("Released camera {}", self.device);
        }
    }
}
