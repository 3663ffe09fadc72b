//! Video sources.
//!
//! - `stub://...`: synthetic frames with a moving bright square
//! - a local directory: replays the images in it, sorted by file name
//! - `udp://...` and other stream URLs: FFmpeg decoder (feature: ingest-ffmpeg)
//!
//! Every source delivers BGR frames at their native resolution; the frame
//! processor does its own downscaling.

#[cfg(feature = "ingest-ffmpeg")]
mod ffmpeg;
pub mod images;
pub mod synthetic;

use anyhow::Result;
use std::path::Path;

#[cfg(feature = "ingest-ffmpeg")]
use self::ffmpeg::FfmpegStreamSource;
pub use images::ImageDirSource;
pub use synthetic::SyntheticSource;

use crate::config::VideoSettings;
use crate::error::FacelinkError;
use crate::frame::Frame;

/// Frame producer owned by the control loop.
pub trait VideoSource {
    fn start(&mut self) -> Result<()>;

    /// Block until the next frame is available.
    fn next_frame(&mut self) -> Result<Frame>;

    fn stop(&mut self) -> Result<()>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a video source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// Source selected from a URL or path.
pub struct VideoStream {
    backend: StreamBackend,
}

enum StreamBackend {
    Synthetic(SyntheticSource),
    Images(ImageDirSource),
    #[cfg(feature = "ingest-ffmpeg")]
    Ffmpeg(FfmpegStreamSource),
}

impl VideoStream {
    pub fn open(settings: &VideoSettings) -> Result<Self> {
        let url = settings.url.trim();
        if url.is_empty() {
            return Err(FacelinkError::Config("video url must not be empty".to_string()).into());
        }
        let backend = if url.starts_with("stub://") {
            StreamBackend::Synthetic(SyntheticSource::new(url))
        } else if !url.contains("://") && Path::new(url).is_dir() {
            StreamBackend::Images(ImageDirSource::new(url)?)
        } else {
            Self::stream_backend(url)?
        };
        Ok(Self { backend })
    }

    #[cfg(feature = "ingest-ffmpeg")]
    fn stream_backend(url: &str) -> Result<StreamBackend> {
        Ok(StreamBackend::Ffmpeg(FfmpegStreamSource::new(url)))
    }

    #[cfg(not(feature = "ingest-ffmpeg"))]
    fn stream_backend(url: &str) -> Result<StreamBackend> {
        Err(FacelinkError::Config(format!(
            "video url '{}' requires the ingest-ffmpeg feature",
            url
        ))
        .into())
    }
}

impl VideoSource for VideoStream {
    fn start(&mut self) -> Result<()> {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.start(),
            StreamBackend::Images(source) => source.start(),
            #[cfg(feature = "ingest-ffmpeg")]
            StreamBackend::Ffmpeg(source) => source.start(),
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.next_frame(),
            StreamBackend::Images(source) => source.next_frame(),
            #[cfg(feature = "ingest-ffmpeg")]
            StreamBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn stop(&mut self) -> Result<()> {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.stop(),
            StreamBackend::Images(source) => source.stop(),
            #[cfg(feature = "ingest-ffmpeg")]
            StreamBackend::Ffmpeg(source) => source.stop(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            StreamBackend::Synthetic(source) => source.is_healthy(),
            StreamBackend::Images(source) => source.is_healthy(),
            #[cfg(feature = "ingest-ffmpeg")]
            StreamBackend::Ffmpeg(source) => source.is_healthy(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            StreamBackend::Synthetic(source) => source.stats(),
            StreamBackend::Images(source) => source.stats(),
            #[cfg(feature = "ingest-ffmpeg")]
            StreamBackend::Ffmpeg(source) => source.stats(),
        }
    }
}
