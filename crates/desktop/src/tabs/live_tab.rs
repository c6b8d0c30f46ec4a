use iced::widget::{button, column, container, image, row, text, Space};
use iced::{ContentFit, Element, Length, Theme};

use crate::app::{CaptureStatus, Message};
use crate::theme::muted_color;

pub fn view<'a>(
    frame: Option<&image::Handle>,
    status: &CaptureStatus,
    theme: &Theme,
) -> Element<'a, Message> {
    let viewer: Element<'a, Message> = match frame {
        Some(handle) => image(handle.clone())
            .content_fit(ContentFit::Contain)
            .width(Length::Fill)
            .height(Length::Fill)
            .into(),
        None => container(text("No picture yet").size(14).color(muted_color(theme)))
            .center(Length::Fill)
            .into(),
    };

    let control = if status.is_running() {
        let stop = button(text("Stop").size(14)).padding([8, 24]).style(button::danger);
        if *status == CaptureStatus::Stopping {
            stop
        } else {
            stop.on_press(Message::Stop)
        }
    } else {
        button(text("Start").size(14))
            .padding([8, 24])
            .style(button::primary)
            .on_press(Message::Start)
    };

    let status_line = text(status.describe()).size(13).color(match status {
        CaptureStatus::Error(_) => theme.palette().danger,
        _ => muted_color(theme),
    });

    column![
        viewer,
        Space::new().height(12),
        row![control, status_line]
            .spacing(16)
            .align_y(iced::Alignment::Center),
    ]
    .height(Length::Fill)
    .into()
}
