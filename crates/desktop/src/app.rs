use std::sync::Arc;
use std::time::Duration;

use iced::widget::{button, column, container, image, row, text};
use iced::{Element, Length, Subscription, Task, Theme};

use facecatcher_core::annotation::domain::annotation_style::BoxColor;
use facecatcher_core::detection::domain::face_detector::FaceDetector;

use crate::settings::{Appearance, Settings};
use crate::tabs;
use crate::theme;
use crate::workers::capture_worker::{self, CaptureHandle, CaptureParams, WorkerMessage};

/// UI refresh interval while the camera is live.
const FRAME_POLL: Duration = Duration::from_millis(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Live,
    Settings,
}

impl Tab {
    const ALL: &[Tab] = &[Tab::Live, Tab::Settings];

    fn label(self) -> &'static str {
        match self {
            Tab::Live => "Live",
            Tab::Settings => "Settings",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    TabSelected(Tab),
    Start,
    Stop,
    Tick,
    CameraDeviceChanged(String),
    MirrorToggled(bool),
    BoxColorChanged(BoxColor),
    MinSizeToggled(bool),
    AppearanceChanged(Appearance),
    RestoreDefaults,
    PollSystemTheme,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureStatus {
    Idle,
    Starting,
    Live { width: u32, height: u32, fps: f64 },
    Stopping,
    Finished(String),
    Error(String),
}

impl CaptureStatus {
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            CaptureStatus::Starting | CaptureStatus::Live { .. } | CaptureStatus::Stopping
        )
    }

    pub fn describe(&self) -> String {
        match self {
            CaptureStatus::Idle => "Press Start to open the camera".to_string(),
            CaptureStatus::Starting => "Opening camera...".to_string(),
            CaptureStatus::Live { width, height, fps } => {
                format!("Live {width}x{height} @ {fps:.0} fps")
            }
            CaptureStatus::Stopping => "Stopping...".to_string(),
            CaptureStatus::Finished(summary) => format!("Stopped: {summary}"),
            CaptureStatus::Error(e) => format!("Error: {e}"),
        }
    }
}

pub struct App {
    active_tab: Tab,
    pub settings: Settings,
    detector: Arc<dyn FaceDetector>,
    capture: Option<CaptureHandle>,
    pub frame: Option<image::Handle>,
    pub status: CaptureStatus,
}

impl App {
    pub fn new(detector: Arc<dyn FaceDetector>) -> (Self, Task<Message>) {
        (
            Self {
                active_tab: Tab::Live,
                settings: Settings::load(),
                detector,
                capture: None,
                frame: None,
                status: CaptureStatus::Idle,
            },
            Task::none(),
        )
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::TabSelected(tab) => {
                self.active_tab = tab;
            }
            Message::Start => {
                if self.capture.is_none() {
                    let params = CaptureParams {
                        device: self.settings.camera_device.clone(),
                        mirror: self.settings.mirror,
                        box_color: self.settings.box_color,
                        min_size_filter: self.settings.min_size_filter,
                    };
                    log::info!("Starting capture on {}", params.device);
                    self.capture = Some(capture_worker::spawn(params, self.detector.clone()));
                    self.status = CaptureStatus::Starting;
                    self.active_tab = Tab::Live;
                }
            }
            Message::Stop => {
                if let Some(capture) = &self.capture {
                    capture.stop();
                    self.status = CaptureStatus::Stopping;
                }
            }
            Message::Tick => self.drain_capture(),
            Message::CameraDeviceChanged(device) => {
                self.settings.camera_device = device;
                self.settings.save();
            }
            Message::MirrorToggled(mirror) => {
                self.settings.mirror = mirror;
                self.settings.save();
            }
            Message::BoxColorChanged(color) => {
                self.settings.box_color = color;
                self.settings.save();
            }
            Message::MinSizeToggled(enabled) => {
                self.settings.min_size_filter = enabled;
                self.settings.save();
            }
            Message::AppearanceChanged(appearance) => {
                self.settings.appearance = appearance;
                self.settings.save();
            }
            Message::RestoreDefaults => {
                self.settings = Settings {
                    appearance: self.settings.appearance,
                    ..Settings::default()
                };
                self.settings.save();
            }
            Message::PollSystemTheme => {
                // Theme is resolved fresh in theme() on every render,
                // so just requesting a redraw is enough.
            }
        }
        Task::none()
    }

    /// Shows the newest frame and applies worker status changes.
    fn drain_capture(&mut self) {
        let Some(capture) = &self.capture else {
            return;
        };
        if let Some(latest) = capture.frames.try_iter().last() {
            self.frame = Some(image::Handle::from_rgba(
                latest.width,
                latest.height,
                latest.pixels,
            ));
        }

        let mut finished = false;
        for event in capture.events.try_iter() {
            match event {
                WorkerMessage::Started { width, height, fps } => {
                    if self.status == CaptureStatus::Starting {
                        self.status = CaptureStatus::Live { width, height, fps };
                    }
                }
                WorkerMessage::Finished(summary) => {
                    self.status = CaptureStatus::Finished(summary);
                    finished = true;
                }
                WorkerMessage::Error(e) => {
                    self.status = CaptureStatus::Error(e);
                    finished = true;
                }
            }
        }
        if finished {
            self.capture = None;
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let tab_bar = row(Tab::ALL
            .iter()
            .map(|&tab| {
                let btn = button(text(tab.label()).size(13))
                    .on_press(Message::TabSelected(tab))
                    .padding([6, 14]);
                if tab == self.active_tab {
                    btn.style(button::primary).into()
                } else {
                    btn.style(button::text).into()
                }
            })
            .collect::<Vec<_>>())
        .spacing(2);

        let content: Element<'_, Message> = match self.active_tab {
            Tab::Live => tabs::live_tab::view(self.frame.as_ref(), &self.status, &self.theme()),
            Tab::Settings => tabs::settings_tab::view(&self.settings, self.status.is_running()),
        };

        column![
            tab_bar,
            container(content).padding(16).height(Length::Fill)
        ]
        .spacing(0)
        .height(Length::Fill)
        .into()
    }

    pub fn theme(&self) -> Theme {
        theme::resolve_theme(self.settings.appearance)
    }

    pub fn subscription(&self) -> Subscription<Message> {
        let frames = if self.capture.is_some() {
            iced::time::every(FRAME_POLL).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };
        let system_theme = if self.settings.appearance == Appearance::System {
            iced::time::every(Duration::from_secs(2)).map(|_| Message::PollSystemTheme)
        } else {
            Subscription::none()
        };
        Subscription::batch([frames, system_theme])
    }
}
