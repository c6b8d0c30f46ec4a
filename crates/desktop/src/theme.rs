use iced::color;
use iced::theme::Palette;
use iced::{Color, Theme};

use crate::settings::Appearance;

pub fn resolve_theme(appearance: Appearance) -> Theme {
    let dark = match appearance {
        Appearance::Dark => true,
        Appearance::Light => false,
        Appearance::System => system_prefers_dark(),
    };
    // Green accent, matching the default box color.
    let palette = if dark {
        Palette {
            primary: color!(0x30, 0xd1, 0x58),
            ..Palette::DARK
        }
    } else {
        Palette {
            primary: color!(0x24, 0x8a, 0x3d),
            ..Palette::LIGHT
        }
    };
    Theme::custom("FaceCatcher", palette)
}

/// Secondary text color for status lines.
pub fn muted_color(theme: &Theme) -> Color {
    Color {
        a: 0.6,
        ..theme.palette().text
    }
}

#[cfg(target_os = "macos")]
fn system_prefers_dark() -> bool {
    std::process::Command::new("defaults")
        .args(["read", "-g", "AppleInterfaceStyle"])
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).trim() == "Dark")
        .unwrap_or(true)
}

#[cfg(not(target_os = "macos"))]
fn system_prefers_dark() -> bool {
    true
}
