//! Local file frame source using FFmpeg.
//!
//! Packets of the best video stream are decoded in-memory and converted to
//! RGB24 at the stream's native resolution. Once the container is exhausted
//! the decoder is drained so trailing buffered frames are not lost.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use super::file::FileConfig;
use super::VideoInfo;
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    info: VideoInfo,
    eof_sent: bool,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: &FileConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("failed to open file input '{}' with ffmpeg", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let fps = rational_to_f64(input_stream.avg_frame_rate())
            .or_else(|| rational_to_f64(input_stream.rate()));
        let frame_count_hint = u64::try_from(input_stream.frames())
            .ok()
            .filter(|count| *count > 0);
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        let info = VideoInfo {
            fps,
            width: Some(decoder.width()).filter(|w| *w > 0),
            height: Some(decoder.height()).filter(|h| *h > 0),
            frame_count_hint,
        };
        log::debug!("FileSource: {} stream info {:?}", config.path, info);

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            info,
            eof_sent: false,
        })
    }

    pub(crate) fn info(&self) -> VideoInfo {
        self.info.clone()
    }

    pub(crate) fn next_frame(&mut self, index: u64) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded, index).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }

            let next = self
                .input
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));
            match next {
                Some((stream_index, packet)) => {
                    if stream_index != self.stream_index {
                        continue;
                    }
                    self.decoder
                        .send_packet(&packet)
                        .context("send packet to ffmpeg decoder")?;
                }
                None => {
                    self.decoder.send_eof().context("flush ffmpeg decoder")?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video, index: u64) -> Result<Frame> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
        Frame::new(pixels, width, height, index)
    }
}

fn rational_to_f64(rate: ffmpeg::Rational) -> Option<f64> {
    if rate.denominator() == 0 || rate.numerator() <= 0 {
        return None;
    }
    Some(f64::from(rate))
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let pixels = data
            .get(..row_bytes * height as usize)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((pixels.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
