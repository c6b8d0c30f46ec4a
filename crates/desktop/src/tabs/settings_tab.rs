use iced::widget::{button, checkbox, column, pick_list, row, text, text_input, Space};
use iced::Element;

use facecatcher_core::annotation::domain::annotation_style::BoxColor;

use crate::app::Message;
use crate::settings::{Appearance, Settings};

pub fn view<'a>(settings: &Settings, running: bool) -> Element<'a, Message> {
    let restart_hint: Element<'a, Message> = if running {
        text("Changes apply the next time the camera starts.")
            .size(12)
            .into()
    } else {
        Space::new().height(0).into()
    };

    column![
        text("Camera").size(16),
        Space::new().height(8),
        row![
            text("Device").size(13),
            text_input("Camera device", &settings.camera_device)
                .on_input(Message::CameraDeviceChanged)
                .size(13),
        ]
        .spacing(12)
        .align_y(iced::Alignment::Center),
        Space::new().height(8),
        checkbox(settings.mirror)
            .label("Mirror picture")
            .on_toggle(Message::MirrorToggled)
            .text_size(13),
        Space::new().height(20),
        text("Detection").size(16),
        Space::new().height(8),
        row![
            text("Box color").size(13),
            pick_list(BoxColor::ALL, Some(settings.box_color), Message::BoxColorChanged)
                .text_size(13),
        ]
        .spacing(12)
        .align_y(iced::Alignment::Center),
        Space::new().height(8),
        checkbox(settings.min_size_filter)
            .label("Ignore faces smaller than 30x30 pixels")
            .on_toggle(Message::MinSizeToggled)
            .text_size(13),
        Space::new().height(20),
        text("Theme").size(16),
        Space::new().height(8),
        row![
            text("Mode").size(13),
            pick_list(Appearance::ALL, Some(settings.appearance), Message::AppearanceChanged)
                .text_size(13),
        ]
        .spacing(12)
        .align_y(iced::Alignment::Center),
        Space::new().height(20),
        restart_hint,
        Space::new().height(8),
        button(text("Restore defaults").size(13))
            .on_press(Message::RestoreDefaults)
            .style(button::secondary)
            .padding([6, 14]),
    ]
    .spacing(0)
    .into()
}
