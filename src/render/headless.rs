//! Headless surface: draws the overlay, downscales for display and optionally
//! writes annotated frames as JPEG snapshots. It never asks to quit; runs end
//! on Ctrl-C, a frame limit or a capture failure.

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::overlay::{draw_box, draw_label_marker, BOX_RGB, BOX_THICKNESS, LABEL_RGB};
use super::{Annotation, RenderSurface};
use crate::config::RenderSettings;
use crate::frame::{Frame, Resolution};

pub struct HeadlessSurface {
    display: Resolution,
    snapshot_dir: Option<PathBuf>,
    presented: u64,
    last: Option<Frame>,
}

impl HeadlessSurface {
    pub fn new(settings: &RenderSettings) -> Result<Self> {
        if let Some(dir) = &settings.snapshot_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create snapshot directory {}", dir.display()))?;
            log::info!("headless render: snapshots to {}", dir.display());
        } else {
            log::info!("headless render: no display");
        }
        Ok(Self {
            display: settings.display,
            snapshot_dir: settings.snapshot_dir.clone(),
            presented: 0,
            last: None,
        })
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    /// Most recent display-sized frame.
    pub fn last(&self) -> Option<&Frame> {
        self.last.as_ref()
    }
}

impl RenderSurface for HeadlessSurface {
    fn present(&mut self, frame: &Frame, annotations: &[Annotation]) -> Result<()> {
        let mut canvas = frame.clone();
        for annotation in annotations {
            draw_box(&mut canvas, &annotation.bbox, BOX_RGB, BOX_THICKNESS);
            draw_label_marker(&mut canvas, &annotation.bbox, &annotation.label, LABEL_RGB);
        }
        let shown = canvas.resize(self.display)?;
        self.presented += 1;

        if let Some(dir) = &self.snapshot_dir {
            if !annotations.is_empty() {
                let path = dir.join(format!("frame-{:06}.jpg", self.presented));
                shown
                    .to_rgb_image()?
                    .save(&path)
                    .with_context(|| format!("write snapshot {}", path.display()))?;
                log::debug!("snapshot {}", path.display());
            }
        }

        self.last = Some(shown);
        Ok(())
    }

    fn poll_quit(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn close(&mut self) -> Result<()> {
        log::info!("headless render closed after {} frames", self.presented);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderMode;
    use crate::frame::{BoundingBox, PixelFormat};
    use tempfile::TempDir;

    fn settings(snapshot_dir: Option<PathBuf>) -> RenderSettings {
        RenderSettings {
            mode: RenderMode::Headless,
            window_title: "video".to_string(),
            quit_key: 'q',
            snapshot_dir,
            display: Resolution::new(320, 240),
        }
    }

    #[test]
    fn downscales_to_display_size() -> Result<()> {
        let mut surface = HeadlessSurface::new(&settings(None))?;
        let frame = Frame::solid(960, 720, [0, 0, 0], PixelFormat::Bgr24);
        surface.present(&frame, &[])?;
        assert_eq!(surface.last().map(Frame::resolution), Some(Resolution::new(320, 240)));
        assert!(!surface.poll_quit()?);
        Ok(())
    }

    #[test]
    fn snapshots_only_annotated_frames() -> Result<()> {
        let dir = TempDir::new()?;
        let mut surface = HeadlessSurface::new(&settings(Some(dir.path().to_path_buf())))?;
        let frame = Frame::solid(960, 720, [0, 0, 0], PixelFormat::Bgr24);

        surface.present(&frame, &[])?;
        surface.present(
            &frame,
            &[Annotation {
                bbox: BoundingBox::new(30, 180, 150, 60),
                label: "A".to_string(),
            }],
        )?;

        let written: Vec<_> = std::fs::read_dir(dir.path())?.collect();
        assert_eq!(written.len(), 1);
        assert!(dir.path().join("frame-000002.jpg").exists());
        Ok(())
    }
}
