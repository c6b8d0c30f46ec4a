use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use facecatcher_core::annotation::domain::annotation_style::{AnnotationStyle, BoxColor};
use facecatcher_core::annotation::domain::face_annotator::FaceAnnotator;
use facecatcher_core::annotation::infrastructure::mirror_flip::MirrorFlip;
use facecatcher_core::annotation::infrastructure::outline_painter::OutlinePainter;
use facecatcher_core::detection::domain::detection_params::DetectionParams;
use facecatcher_core::detection::domain::face_detector::FaceDetector;
use facecatcher_core::pipeline::annotate_stream_use_case::AnnotateStreamUseCase;
use facecatcher_core::pipeline::infrastructure::sequential_stream_executor::SequentialStreamExecutor;
use facecatcher_core::pipeline::stream_executor::StreamConfig;
use facecatcher_core::shared::frame::Frame;
use facecatcher_core::shared::stream_metadata::StreamMetadata;
use facecatcher_core::video::domain::frame_sink::FrameSink;
use facecatcher_core::video::domain::frame_source::FrameSource;
use facecatcher_core::video::infrastructure::camera_source::CameraSource;

/// Frames waiting for the UI. The oldest is dropped when it falls behind.
const FRAME_QUEUE: usize = 2;

/// An annotated frame ready for display.
#[derive(Debug, Clone)]
pub struct RgbaFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub index: usize,
}

/// Messages sent from the worker thread to the UI.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    Started { width: u32, height: u32, fps: f64 },
    Finished(String),
    Error(String),
}

pub struct CaptureParams {
    pub device: String,
    pub mirror: bool,
    pub box_color: BoxColor,
    pub min_size_filter: bool,
}

/// Live capture session running on a background thread.
pub struct CaptureHandle {
    pub frames: Receiver<RgbaFrame>,
    pub events: Receiver<WorkerMessage>,
    pub cancelled: Arc<AtomicBool>,
}

impl CaptureHandle {
    pub fn stop(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// The viewer keeps the frame channel open, so the worker only ends on
/// the stop flag.
impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn spawn(params: CaptureParams, detector: Arc<dyn FaceDetector>) -> CaptureHandle {
    let (frame_tx, frame_rx) = crossbeam_channel::bounded::<RgbaFrame>(FRAME_QUEUE);
    let (event_tx, event_rx) = crossbeam_channel::unbounded::<WorkerMessage>();
    let cancelled = Arc::new(AtomicBool::new(false));
    let cancelled_clone = cancelled.clone();
    let stale_rx = frame_rx.clone();

    thread::spawn(move || {
        let message = match run_capture(
            &params,
            detector,
            frame_tx,
            stale_rx,
            &event_tx,
            cancelled_clone,
        ) {
            Ok(summary) => WorkerMessage::Finished(summary),
            Err(e) => {
                log::error!("Capture failed: {e}");
                WorkerMessage::Error(e.to_string())
            }
        };
        let _ = event_tx.send(message);
    });

    CaptureHandle {
        frames: frame_rx,
        events: event_rx,
        cancelled,
    }
}

fn build_annotator(params: &CaptureParams, detector: Arc<dyn FaceDetector>) -> FaceAnnotator {
    let detection = if params.min_size_filter {
        DetectionParams::with_default_min_size()
    } else {
        DetectionParams::default()
    };
    let style = AnnotationStyle {
        color: params.box_color,
        ..AnnotationStyle::default()
    };
    let annotator = FaceAnnotator::new(detector, detection, Box::new(OutlinePainter::new(style)));
    if params.mirror {
        annotator.with_preprocessor(Box::new(MirrorFlip))
    } else {
        annotator
    }
}

fn run_capture(
    params: &CaptureParams,
    detector: Arc<dyn FaceDetector>,
    frame_tx: Sender<RgbaFrame>,
    frame_rx: Receiver<RgbaFrame>,
    event_tx: &Sender<WorkerMessage>,
    cancelled: Arc<AtomicBool>,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut camera: Box<dyn FrameSource> = Box::new(CameraSource::new(params.device.as_str()));
    let metadata = camera.open()?;
    let _ = event_tx.send(WorkerMessage::Started {
        width: metadata.width,
        height: metadata.height,
        fps: metadata.effective_fps(),
    });

    let config = StreamConfig {
        cancelled,
        ..StreamConfig::default()
    };
    let mut use_case = AnnotateStreamUseCase::new(
        camera,
        Box::new(ViewerSink::new(frame_tx, frame_rx)),
        Arc::new(build_annotator(params, detector)),
        Box::new(SequentialStreamExecutor),
        config,
    );
    let summary = use_case.execute(&metadata)?;
    Ok(summary.to_string())
}

/// Hands annotated frames to the UI thread as RGBA.
///
/// Holds a clone of the UI's receiver so a full queue can make room for
/// the newest frame.
struct ViewerSink {
    tx: Sender<RgbaFrame>,
    stale: Receiver<RgbaFrame>,
    dropped: usize,
}

impl ViewerSink {
    fn new(tx: Sender<RgbaFrame>, stale: Receiver<RgbaFrame>) -> Self {
        Self {
            tx,
            stale,
            dropped: 0,
        }
    }
}

fn to_rgba(frame: &Frame) -> Vec<u8> {
    let rgb = frame.rgb_data();
    let mut pixels = Vec::with_capacity(rgb.len() / 3 * 4);
    for px in rgb.chunks_exact(3) {
        pixels.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }
    pixels
}

impl FrameSink for ViewerSink {
    fn open(&mut self, metadata: &StreamMetadata) -> Result<(), Box<dyn std::error::Error>> {
        log::info!("Viewer showing {}x{}", metadata.width, metadata.height);
        Ok(())
    }

    fn show(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let rgba = RgbaFrame {
            width: frame.width(),
            height: frame.height(),
            pixels: to_rgba(frame),
            index: frame.index(),
        };
        let mut pending = rgba;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(frame)) => {
                    if self.stale.try_recv().is_ok() {
                        self.dropped += 1;
                    }
                    pending = frame;
                }
                Err(TrySendError::Disconnected(_)) => return Err("Viewer closed".into()),
            }
        }
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.dropped > 0 {
            log::debug!("Viewer skipped {} frames while busy", self.dropped);
        }
        Ok(())
    }
}
