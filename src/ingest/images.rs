//! Image directory replay.
//!
//! Plays back still images from a local directory in file-name order, one per
//! frame. Reaching the end of the directory is a capture failure, which ends
//! the loop.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::SourceStats;
use crate::error::FacelinkError;
use crate::frame::Frame;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub struct ImageDirSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    frame_count: u64,
    last_error: Option<String>,
}

impl ImageDirSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)
            .with_context(|| format!("read image directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| has_image_extension(path))
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(anyhow!("no images found in {}", dir.display()));
        }
        Ok(Self {
            dir,
            files,
            next: 0,
            frame_count: 0,
            last_error: None,
        })
    }

    pub fn start(&mut self) -> Result<()> {
        self.next = 0;
        log::info!(
            "video source {} started ({} images)",
            self.dir.display(),
            self.files.len()
        );
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<Frame> {
        let Some(path) = self.files.get(self.next) else {
            self.last_error = Some("image directory exhausted".to_string());
            return Err(FacelinkError::Capture(format!(
                "{}: no more images",
                self.dir.display()
            ))
            .into());
        };
        self.next += 1;
        let image = image::open(path).map_err(|e| {
            self.last_error = Some(e.to_string());
            FacelinkError::Capture(format!("decode {}: {}", path.display(), e))
        })?;
        self.frame_count += 1;
        Ok(Frame::from_rgb_image(image.to_rgb8()).into_bgr())
    }

    pub fn stop(&mut self) -> Result<()> {
        log::info!("video source {} stopped", self.dir.display());
        Ok(())
    }

    pub fn is_healthy(&self) -> bool {
        self.last_error.is_none()
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.dir.display().to_string(),
        }
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn replays_in_name_order_then_fails() -> Result<()> {
        let dir = TempDir::new()?;
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 255])).save(dir.path().join("b.png"))?;
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])).save(dir.path().join("a.png"))?;
        std::fs::write(dir.path().join("notes.txt"), "not an image")?;

        let mut source = ImageDirSource::new(dir.path())?;
        source.start()?;

        let first = source.next_frame()?;
        assert_eq!(first.format(), PixelFormat::Bgr24);
        assert_eq!(first.rgb_at(0, 0), Some([255, 0, 0]));
        assert_eq!(source.next_frame()?.rgb_at(0, 0), Some([0, 0, 255]));

        let err = source.next_frame().unwrap_err();
        assert_eq!(
            FacelinkError::classify(&err).map(|k| k.code()),
            Some("CAPTURE")
        );
        assert!(!source.is_healthy());
        Ok(())
    }

    #[test]
    fn empty_directory_is_rejected() -> Result<()> {
        let dir = TempDir::new()?;
        assert!(ImageDirSource::new(dir.path()).is_err());
        Ok(())
    }
}
