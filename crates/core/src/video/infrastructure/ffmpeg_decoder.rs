//! Decoding shared by every libavformat-backed source: video files and
//! capture devices are both demuxed inputs with one video stream.

use std::path::PathBuf;

use ffmpeg_next::format::context::Input;

use crate::shared::frame::{Frame, PixelFormat};
use crate::shared::stream_metadata::StreamMetadata;

pub(super) type FrameResult = Result<Frame, Box<dyn std::error::Error>>;

/// Reads stream properties from the best video stream of `ictx`.
///
/// Returns the metadata together with the index of the chosen stream.
pub(super) fn describe(
    ictx: &Input,
    source_path: Option<PathBuf>,
) -> Result<(StreamMetadata, usize), Box<dyn std::error::Error>> {
    let stream = ictx
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or("No video stream found")?;

    let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
    let decoder = codec_ctx.decoder().video()?;

    let fps = [stream.avg_frame_rate(), stream.rate()]
        .into_iter()
        .find(|r| r.numerator() > 0 && r.denominator() > 0)
        .map(|r| r.numerator() as f64 / r.denominator() as f64)
        .unwrap_or(0.0);

    let metadata = StreamMetadata {
        width: decoder.width(),
        height: decoder.height(),
        fps,
        total_frames: stream.frames().max(0) as usize,
        codec: decoder
            .codec()
            .map(|c| c.name().to_string())
            .unwrap_or_default(),
        source_path,
        live: false,
    };
    Ok((metadata, stream.index()))
}

/// Lazily decodes the stream at `stream_index` into RGB24 frames.
pub(super) fn decode(
    ictx: &mut Input,
    stream_index: usize,
) -> Box<dyn Iterator<Item = FrameResult> + '_> {
    match FfmpegFrameIter::new(ictx, stream_index) {
        Ok(iter) => Box::new(iter),
        Err(e) => Box::new(std::iter::once(Err(e))),
    }
}

/// Pulls packets on demand so a live device or a long file is never
/// buffered in memory.
struct FfmpegFrameIter<'a> {
    ictx: &'a mut Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    stream_index: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl<'a> FfmpegFrameIter<'a> {
    fn new(ictx: &'a mut Input, stream_index: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let decoder = {
            let stream = ictx
                .stream(stream_index)
                .ok_or("Video stream disappeared after open")?;
            ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?
                .decoder()
                .video()?
        };

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            ictx,
            decoder,
            scaler,
            width,
            height,
            stream_index,
            frame_index: 0,
            flushing: false,
            done: false,
        })
    }

    fn try_receive(&mut self) -> Option<FrameResult> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb_frame) {
            return Some(Err(Box::new(e)));
        }

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index)
            .with_format(PixelFormat::Rgb24);
        self.frame_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for FfmpegFrameIter<'_> {
    type Item = FrameResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(result) = self.try_receive() {
            return Some(result);
        }
        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(result) = self.try_receive() {
                    return Some(result);
                }
                self.done = true;
                return None;
            };

            if stream.index() != self.stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::warn!("Dropping undecodable packet: {e}");
                continue;
            }
            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Copies the first plane into a tightly-packed buffer, dropping row padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}
