//! Network stream source decoded with FFmpeg.
//!
//! The drone pushes raw H.264 over UDP once `streamon` has been acknowledged,
//! so the input is opened lazily in `start()` rather than at construction.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use std::time::Instant;

use super::SourceStats;
use crate::error::FacelinkError;
use crate::frame::{Frame, PixelFormat};

struct Decoding {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
}

pub(crate) struct FfmpegStreamSource {
    url: String,
    decoding: Option<Decoding>,
    frame_count: u64,
    started_at: Option<Instant>,
    last_error: Option<String>,
}

impl FfmpegStreamSource {
    pub(crate) fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            decoding: None,
            frame_count: 0,
            started_at: None,
            last_error: None,
        }
    }

    pub(crate) fn start(&mut self) -> Result<()> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&self.url).map_err(|e| {
            FacelinkError::Capture(format!("failed to open stream '{}': {}", self.url, e))
        })?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("stream '{}' has no video track", self.url))?;
        let stream_index = stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;
        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::BGR24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        self.decoding = Some(Decoding {
            input,
            stream_index,
            decoder,
            scaler,
        });
        self.started_at = Some(Instant::now());
        log::info!("video source {} started (ffmpeg)", self.url);
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        let Some(decoding) = self.decoding.as_mut() else {
            return Err(FacelinkError::Capture(format!("{} not started", self.url)).into());
        };

        let mut decoded = ffmpeg::frame::Video::empty();
        let mut bgr = ffmpeg::frame::Video::empty();

        for (stream, packet) in decoding.input.packets() {
            if stream.index() != decoding.stream_index {
                continue;
            }
            // Corrupt packets are routine on a lossy UDP link; skip them.
            if let Err(e) = decoding.decoder.send_packet(&packet) {
                log::debug!("{}: dropped packet: {}", self.url, e);
                continue;
            }
            if decoding.decoder.receive_frame(&mut decoded).is_ok() {
                decoding
                    .scaler
                    .run(&decoded, &mut bgr)
                    .context("scale frame to BGR")?;
                let (pixels, width, height) = frame_to_pixels(&bgr)?;
                self.frame_count += 1;
                return Frame::new(pixels, width, height, PixelFormat::Bgr24);
            }
        }

        self.last_error = Some("stream ended".to_string());
        Err(FacelinkError::Capture(format!("{}: stream ended", self.url)).into())
    }

    pub(crate) fn stop(&mut self) -> Result<()> {
        if self.decoding.take().is_some() {
            log::info!("video source {} stopped", self.url);
        }
        Ok(())
    }

    pub(crate) fn is_healthy(&self) -> bool {
        self.last_error.is_none() && self.started_at.is_some()
    }

    pub(crate) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.url.clone(),
        }
    }
}

/// Copy the packed BGR plane, dropping any row padding.
fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = width as usize * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let plane = data
            .get(..row_bytes * height as usize)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((plane.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(
            data.get(start..start + row_bytes)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }
    Ok((pixels, width, height))
}
