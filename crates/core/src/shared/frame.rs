use std::borrow::Cow;

use image::GrayImage;

use crate::shared::error::AnnotateError;

// BT.601 luma weights in 14-bit fixed point.
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;

/// Channel-order convention of the collaborator that produced a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PixelFormat {
    #[default]
    Rgb24,
    Bgr24,
}

impl PixelFormat {
    pub fn red_index(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 0,
            PixelFormat::Bgr24 => 2,
        }
    }

    pub fn blue_index(self) -> usize {
        2 - self.red_index()
    }

    /// Reorders an `[r, g, b]` triple into this format's byte order.
    pub fn from_rgb(self, rgb: [u8; 3]) -> [u8; 3] {
        match self {
            PixelFormat::Rgb24 => rgb,
            PixelFormat::Bgr24 => [rgb[2], rgb[1], rgb[0]],
        }
    }
}

/// A single video/image frame: contiguous 8-bit pixels in row-major order.
///
/// The channel order is carried in [`PixelFormat`]; sinks translate to RGB
/// at the display boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
    format: PixelFormat,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
            format: PixelFormat::Rgb24,
        }
    }

    /// Tags the frame with a channel order without touching the pixels.
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Checks the frame is a non-empty three-channel image whose buffer
    /// matches its dimensions.
    pub fn validate(&self) -> Result<(), AnnotateError> {
        if self.width == 0 || self.height == 0 {
            return Err(AnnotateError::InvalidFrame(format!(
                "zero-sized frame {}x{}",
                self.width, self.height
            )));
        }
        if self.channels != 3 {
            return Err(AnnotateError::InvalidFrame(format!(
                "expected 3 channels, got {}",
                self.channels
            )));
        }
        let expected = self.width as usize * self.height as usize * 3;
        if self.data.len() != expected {
            return Err(AnnotateError::InvalidFrame(format!(
                "buffer holds {} bytes, {}x{} needs {expected}",
                self.data.len(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }

    /// Single-channel intensity copy of the frame.
    pub fn to_luma(&self) -> GrayImage {
        let r = self.format.red_index();
        let b = self.format.blue_index();
        let luma: Vec<u8> = self
            .data
            .chunks_exact(self.channels as usize)
            .map(|px| {
                let y = px[r] as u32 * LUMA_R
                    + px[1] as u32 * LUMA_G
                    + px[b] as u32 * LUMA_B
                    + (1 << (LUMA_SHIFT - 1));
                (y >> LUMA_SHIFT) as u8
            })
            .collect();
        GrayImage::from_raw(self.width, self.height, luma)
            .expect("luma buffer is width * height bytes")
    }

    /// Returns the frame in the requested channel order, swapping red and
    /// blue when the formats differ.
    pub fn into_format(mut self, format: PixelFormat) -> Self {
        if self.format != format {
            for px in self.data.chunks_exact_mut(self.channels as usize) {
                px.swap(0, 2);
            }
            self.format = format;
        }
        self
    }

    /// Pixel bytes in RGB order, copied only when the frame is BGR.
    pub fn rgb_data(&self) -> Cow<'_, [u8]> {
        match self.format {
            PixelFormat::Rgb24 => Cow::Borrowed(&self.data),
            PixelFormat::Bgr24 => Cow::Owned(self.clone().into_format(PixelFormat::Rgb24).data),
        }
    }

}
