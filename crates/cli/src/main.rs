use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use facecatcher_core::annotation::domain::annotation_style::{AnnotationStyle, BoxColor};
use facecatcher_core::annotation::domain::face_annotator::FaceAnnotator;
use facecatcher_core::annotation::infrastructure::mirror_flip::MirrorFlip;
use facecatcher_core::annotation::infrastructure::outline_painter::OutlinePainter;
use facecatcher_core::detection::domain::detection_params::DetectionParams;
use facecatcher_core::detection::domain::face_detector::FaceDetector;
use facecatcher_core::detection::infrastructure::haar_cascade_detector::HaarCascadeDetector;
use facecatcher_core::pipeline::annotate_image_use_case::AnnotateImageUseCase;
use facecatcher_core::pipeline::annotate_stream_use_case::AnnotateStreamUseCase;
use facecatcher_core::pipeline::infrastructure::sequential_stream_executor::SequentialStreamExecutor;
use facecatcher_core::pipeline::infrastructure::threaded_callback_executor::ThreadedCallbackExecutor;
use facecatcher_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facecatcher_core::pipeline::stream_executor::{StreamConfig, StreamExecutor};
use facecatcher_core::shared::constants::{
    CASCADE_MODEL_NAME, DEFAULT_CAMERA_DEVICE, DEFAULT_LINE_THICKNESS, DEFAULT_MIN_FACE_SIZE,
    DEFAULT_MIN_NEIGHBORS, DEFAULT_SCALE_FACTOR, IMAGE_EXTENSIONS,
};
use facecatcher_core::video::domain::frame_sink::FrameSink;
use facecatcher_core::video::domain::frame_source::FrameSource;
use facecatcher_core::video::infrastructure::camera_source::CameraSource;
use facecatcher_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use facecatcher_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use facecatcher_core::video::infrastructure::image_file_reader::ImageFileReader;
use facecatcher_core::video::infrastructure::image_file_writer::ImageFileWriter;
use facecatcher_core::video::infrastructure::image_sequence_writer::ImageSequenceWriter;

/// Draws boxes around faces in camera streams, videos and images.
#[derive(Parser)]
#[command(name = "facecatcher")]
struct Cli {
    /// Input video or image file. Omit to capture from a camera.
    input: Option<PathBuf>,

    /// Output file: an image, a video, or a directory for numbered PNG frames.
    #[arg(short, long)]
    output: PathBuf,

    /// Capture from a camera device instead of a file.
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_CAMERA_DEVICE)]
    camera: Option<String>,

    /// Requested camera frame rate.
    #[arg(long)]
    camera_fps: Option<u32>,

    /// Requested camera resolution, e.g. 640x480.
    #[arg(long)]
    camera_size: Option<String>,

    /// Haar cascade XML to load instead of the stock frontal face model.
    #[arg(long)]
    cascade: Option<PathBuf>,

    /// Ratio between successive scan scales (> 1.0).
    #[arg(long, default_value_t = DEFAULT_SCALE_FACTOR)]
    scale_factor: f64,

    /// Overlapping detections a face needs to be kept.
    #[arg(long, default_value_t = DEFAULT_MIN_NEIGHBORS)]
    min_neighbors: usize,

    /// Smallest face side length in pixels.
    #[arg(long, default_value_t = DEFAULT_MIN_FACE_SIZE)]
    min_size: u32,

    /// Scan every window size instead of applying --min-size.
    #[arg(long)]
    no_min_size: bool,

    /// Largest face side length in pixels.
    #[arg(long)]
    max_size: Option<u32>,

    /// Box color: red, green or blue.
    #[arg(long, default_value = "green")]
    color: String,

    /// Box line thickness in pixels.
    #[arg(long, default_value_t = DEFAULT_LINE_THICKNESS)]
    thickness: u32,

    /// Flip frames horizontally before detection (selfie view).
    #[arg(long)]
    mirror: bool,

    /// Annotation threads (1 = annotate on the reading thread).
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Print per-stage timings when the stream ends.
    #[arg(long)]
    profile: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let detector = build_detector(&cli)?;
    let annotator = Arc::new(build_annotator(&cli, detector)?);

    match &cli.input {
        Some(input) if is_image(input) => run_image(input, &cli.output, annotator),
        Some(input) => {
            let source: Box<dyn FrameSource> = Box::new(FfmpegReader::new(input));
            run_stream(&cli, source, annotator)
        }
        None => {
            let device = cli.camera.as_deref().unwrap_or(DEFAULT_CAMERA_DEVICE);
            let mut camera = CameraSource::new(device);
            if let Some(fps) = cli.camera_fps {
                camera = camera.with_framerate(fps);
            }
            if let Some(size) = &cli.camera_size {
                let (w, h) = parse_size(size)?;
                camera = camera.with_video_size(w, h);
            }
            run_stream(&cli, Box::new(camera), annotator)
        }
    }
}

fn run_image(
    input: &Path,
    output: &Path,
    annotator: Arc<FaceAnnotator>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut use_case = AnnotateImageUseCase::new(
        Box::new(ImageFileReader::new(input)),
        Box::new(ImageFileWriter::new(output)),
        annotator,
    );
    use_case.execute()?;
    log::info!("Output written to {}", output.display());
    Ok(())
}

fn run_stream(
    cli: &Cli,
    mut source: Box<dyn FrameSource>,
    annotator: Arc<FaceAnnotator>,
) -> Result<(), Box<dyn std::error::Error>> {
    let metadata = source.open()?;
    let sink = open_sink(&cli.output);

    let mut config = StreamConfig {
        max_frames: cli.max_frames,
        ..StreamConfig::default()
    };
    if cli.profile {
        config.logger = Box::new(StdoutPipelineLogger::default());
    }
    config.on_progress = Some(Box::new(|current, total| {
        if total > 0 {
            eprint!("\rAnnotating frame {current}/{total}");
        } else {
            eprint!("\rAnnotated {current} frames");
        }
        true
    }));
    if metadata.is_live() {
        eprintln!("Press Enter to stop");
        spawn_stop_listener(config.cancelled.clone());
    }

    let executor: Box<dyn StreamExecutor> = if cli.workers > 1 {
        Box::new(ThreadedCallbackExecutor::new(cli.workers))
    } else {
        Box::new(SequentialStreamExecutor)
    };

    let mut use_case = AnnotateStreamUseCase::new(source, sink, annotator, executor, config);
    let summary = use_case.execute(&metadata)?;
    eprintln!();
    log::info!("{summary}");
    log::info!("Output written to {}", cli.output.display());
    Ok(())
}

fn open_sink(output: &Path) -> Box<dyn FrameSink> {
    if output.extension().is_none() {
        Box::new(ImageSequenceWriter::new(output))
    } else {
        Box::new(FfmpegWriter::new(output))
    }
}

/// Raises the stop flag when the user presses Enter.
fn spawn_stop_listener(cancelled: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_ok() {
            cancelled.store(true, Ordering::Relaxed);
        }
    });
}

fn build_detector(cli: &Cli) -> Result<Arc<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {CASCADE_MODEL_NAME}");
    let detector = HaarCascadeDetector::frontal_face(
        cli.cascade.as_deref(),
        Some(Box::new(download_progress)),
    )?;
    Ok(Arc::new(detector))
}

fn build_annotator(
    cli: &Cli,
    detector: Arc<dyn FaceDetector>,
) -> Result<FaceAnnotator, Box<dyn std::error::Error>> {
    let style = AnnotationStyle {
        color: cli.color.parse::<BoxColor>()?,
        thickness: cli.thickness,
    };
    let mut annotator = FaceAnnotator::new(
        detector,
        detection_params(cli),
        Box::new(OutlinePainter::new(style)),
    );
    if cli.mirror {
        annotator = annotator.with_preprocessor(Box::new(MirrorFlip));
    }
    Ok(annotator)
}

fn detection_params(cli: &Cli) -> DetectionParams {
    DetectionParams {
        scale_factor: cli.scale_factor,
        min_neighbors: cli.min_neighbors,
        min_size: (!cli.no_min_size).then_some((cli.min_size, cli.min_size)),
        max_size: cli.max_size.map(|s| (s, s)),
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.input {
        Some(input) if cli.camera.is_some() => {
            return Err(format!(
                "--camera cannot be combined with an input file ({})",
                input.display()
            )
            .into());
        }
        Some(input) if !input.exists() => {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
        Some(input) if is_image(input) && !is_image(&cli.output) => {
            return Err(format!(
                "Output for an image input must be an image file, got {}",
                cli.output.display()
            )
            .into());
        }
        _ => {}
    }
    if cli.input.as_deref().map_or(true, |i| !is_image(i)) && is_image(&cli.output) {
        return Err(format!(
            "Output for a stream must be a video file or a directory, got {}",
            cli.output.display()
        )
        .into());
    }
    detection_params(cli).validate()?;
    cli.color.parse::<BoxColor>()?;
    if cli.thickness == 0 {
        return Err("Thickness must be at least 1 pixel".into());
    }
    if cli.max_frames == Some(0) {
        return Err("Max frames must be at least 1".into());
    }
    if let Some(size) = &cli.camera_size {
        parse_size(size)?;
    }
    Ok(())
}

fn parse_size(size: &str) -> Result<(u32, u32), String> {
    size.split_once('x')
        .and_then(|(w, h)| Some((w.trim().parse().ok()?, h.trim().parse().ok()?)))
        .filter(|&(w, h)| w > 0 && h > 0)
        .ok_or_else(|| format!("Size must look like WIDTHxHEIGHT, got '{size}'"))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
