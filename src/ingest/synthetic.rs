//! Synthetic source (`stub://`) for dry runs and tests.

use anyhow::Result;

use super::SourceStats;
use crate::error::FacelinkError;
use crate::frame::{Frame, PixelFormat};

/// Native resolution of the drone camera.
const WIDTH: u32 = 960;
const HEIGHT: u32 = 720;
const SQUARE: u32 = 180;
const SQUARE_RGB: [u8; 3] = [196, 160, 140];

/// Black scene with one bright square drifting across it.
pub struct SyntheticSource {
    url: String,
    frame_count: u64,
    started: bool,
}

impl SyntheticSource {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            frame_count: 0,
            started: false,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        self.started = true;
        log::info!("video source {} started (synthetic)", self.url);
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<Frame> {
        if !self.started {
            return Err(FacelinkError::Capture(format!("{} not started", self.url)).into());
        }
        self.frame_count += 1;

        let mut frame = Frame::solid(WIDTH, HEIGHT, [0, 0, 0], PixelFormat::Bgr24);
        let span = (WIDTH - SQUARE) as u64;
        let left = ((self.frame_count * 8) % span) as u32;
        let top = (HEIGHT - SQUARE) / 2;
        let bgr = [SQUARE_RGB[2], SQUARE_RGB[1], SQUARE_RGB[0]];
        let pixels = frame.pixels_mut();
        for y in top..top + SQUARE {
            for x in left..left + SQUARE {
                let offset = ((y * WIDTH + x) * 3) as usize;
                pixels[offset..offset + 3].copy_from_slice(&bgr);
            }
        }
        Ok(frame)
    }

    pub fn stop(&mut self) -> Result<()> {
        if self.started {
            self.started = false;
            log::info!("video source {} stopped", self.url);
        }
        Ok(())
    }

    pub fn is_healthy(&self) -> bool {
        self.started
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_require_start() {
        let mut source = SyntheticSource::new("stub://test");
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn square_moves_between_frames() -> Result<()> {
        let mut source = SyntheticSource::new("stub://test");
        source.start()?;
        let first = source.next_frame()?;
        let second = source.next_frame()?;
        assert_ne!(first, second);
        assert_eq!(first.rgb_at(100, 360), Some(SQUARE_RGB));
        assert_eq!(first.rgb_at(0, 0), Some([0, 0, 0]));
        Ok(())
    }
}
