use std::fmt;
use std::str::FromStr;

use crate::shared::constants::DEFAULT_LINE_THICKNESS;
use crate::shared::frame::PixelFormat;

/// Outline color, resolved against the frame's channel order when drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoxColor {
    Red,
    #[default]
    Green,
    Blue,
}

impl BoxColor {
    pub const ALL: &[BoxColor] = &[BoxColor::Red, BoxColor::Green, BoxColor::Blue];

    pub fn rgb(self) -> [u8; 3] {
        match self {
            BoxColor::Red => [255, 0, 0],
            BoxColor::Green => [0, 255, 0],
            BoxColor::Blue => [0, 0, 255],
        }
    }

    /// Byte triple to write into a frame stored in `format`.
    pub fn bytes_for(self, format: PixelFormat) -> [u8; 3] {
        format.from_rgb(self.rgb())
    }
}

impl fmt::Display for BoxColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxColor::Red => write!(f, "red"),
            BoxColor::Green => write!(f, "green"),
            BoxColor::Blue => write!(f, "blue"),
        }
    }
}

impl FromStr for BoxColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "red" => Ok(BoxColor::Red),
            "green" => Ok(BoxColor::Green),
            "blue" => Ok(BoxColor::Blue),
            other => Err(format!(
                "Box color must be one of: red, green, blue, got '{other}'"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnnotationStyle {
    pub color: BoxColor,
    pub thickness: u32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            color: BoxColor::default(),
            thickness: DEFAULT_LINE_THICKNESS,
        }
    }
}
