mod app;
mod settings;
mod tabs;
mod theme;
mod workers;

use std::process;
use std::sync::Arc;

use facecatcher_core::detection::domain::face_detector::FaceDetector;
use facecatcher_core::detection::infrastructure::haar_cascade_detector::HaarCascadeDetector;
use facecatcher_core::shared::constants::CASCADE_MODEL_NAME;

use app::App;

fn main() -> iced::Result {
    env_logger::init();

    let detector = match load_detector() {
        Ok(detector) => detector,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    iced::application(move || App::new(detector.clone()), App::update, App::view)
        .title("FaceCatcher - Real-Time Face Detection")
        .theme(App::theme)
        .subscription(App::subscription)
        .window(iced::window::Settings {
            size: iced::Size::new(800.0, 640.0),
            ..Default::default()
        })
        .run()
}

/// The cascade is loaded once, before the window opens.
fn load_detector() -> Result<Arc<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {CASCADE_MODEL_NAME}");
    let detector = HaarCascadeDetector::frontal_face(
        None,
        Some(Box::new(|downloaded, total| {
            if total > 0 {
                let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
                eprint!("\rDownloading face detection model... {pct}%");
            }
        })),
    )?;
    Ok(Arc::new(detector))
}
