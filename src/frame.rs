//! Frame container and geometry.
//!
//! - `Frame`: owned, packed 8-bit three-channel pixel buffer tagged with its channel order.
//! - `Resolution`: width/height pair used for the working and display sizes.
//! - `BoundingBox`: face location in `(top, right, bottom, left)` order.
//!
//! Captured frames arrive as BGR (the order video decoders and display surfaces use);
//! the detection capability expects RGB, so the processor converts after downscaling.

use anyhow::{anyhow, Result};
use image::{imageops, ImageBuffer, Rgb, RgbImage};

/// Default working resolution for detection.
pub const WORKING_RESOLUTION: Resolution = Resolution {
    width: 320,
    height: 240,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Bgr24,
    Rgb24,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Owned video frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    /// Frame filled with a single colour given in RGB order.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3], format: PixelFormat) -> Self {
        let px = match format {
            PixelFormat::Rgb24 => rgb,
            PixelFormat::Bgr24 => [rgb[2], rgb[1], rgb[0]],
        };
        let data = px
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            data,
            width,
            height,
            format,
        }
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            format: PixelFormat::Rgb24,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Pixel at `(x, y)` in RGB order regardless of storage order.
    pub fn rgb_at(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        let px = &self.data[offset..offset + 3];
        Some(match self.format {
            PixelFormat::Rgb24 => [px[0], px[1], px[2]],
            PixelFormat::Bgr24 => [px[2], px[1], px[0]],
        })
    }

    /// Resample to `target`, keeping the channel order.
    pub fn resize(&self, target: Resolution) -> Result<Frame> {
        if target.is_empty() {
            return Err(anyhow!("cannot resize to an empty resolution"));
        }
        if target == self.resolution() {
            return Ok(self.clone());
        }
        // Channel order does not matter to the resampler.
        let buffer: ImageBuffer<Rgb<u8>, &[u8]> =
            ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
                .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        let resized = imageops::resize(
            &buffer,
            target.width,
            target.height,
            imageops::FilterType::Triangle,
        );
        Ok(Frame {
            data: resized.into_raw(),
            width: target.width,
            height: target.height,
            format: self.format,
        })
    }

    /// Convert to RGB channel order (no-op for RGB frames).
    pub fn into_rgb(mut self) -> Frame {
        if self.format == PixelFormat::Bgr24 {
            for px in self.data.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            self.format = PixelFormat::Rgb24;
        }
        self
    }

    /// Convert to BGR channel order (no-op for BGR frames).
    pub fn into_bgr(mut self) -> Frame {
        if self.format == PixelFormat::Rgb24 {
            for px in self.data.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            self.format = PixelFormat::Bgr24;
        }
        self
    }

    /// Copy into an `RgbImage` for encoding or inspection.
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        let rgb = self.clone().into_rgb();
        RgbImage::from_raw(rgb.width, rgb.height, rgb.data)
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))
    }
}

/// Face location in pixel coordinates, `(top, right, bottom, left)` order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl BoundingBox {
    pub fn new(top: u32, right: u32, bottom: u32, left: u32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Map a box found at `from` resolution onto `to` resolution.
    pub fn rescale(&self, from: Resolution, to: Resolution) -> BoundingBox {
        let sx = to.width as f32 / from.width.max(1) as f32;
        let sy = to.height as f32 / from.height.max(1) as f32;
        BoundingBox {
            top: (self.top as f32 * sy).round() as u32,
            right: (self.right as f32 * sx).round() as u32,
            bottom: (self.bottom as f32 * sy).round() as u32,
            left: (self.left as f32 * sx).round() as u32,
        }
    }

    /// Clamp to the given bounds so the box can index into a frame.
    pub fn clamp_to(&self, bounds: Resolution) -> BoundingBox {
        let max_x = bounds.width.saturating_sub(1);
        let max_y = bounds.height.saturating_sub(1);
        BoundingBox {
            top: self.top.min(max_y),
            right: self.right.min(max_x),
            bottom: self.bottom.min(max_y),
            left: self.left.min(max_x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_length() {
        assert!(Frame::new(vec![0u8; 10], 2, 2, PixelFormat::Rgb24).is_err());
        assert!(Frame::new(vec![0u8; 12], 2, 2, PixelFormat::Rgb24).is_ok());
    }

    #[test]
    fn bgr_to_rgb_swaps_channels() -> Result<()> {
        let frame = Frame::new(vec![1, 2, 3, 4, 5, 6], 2, 1, PixelFormat::Bgr24)?;
        let rgb = frame.into_rgb();
        assert_eq!(rgb.format(), PixelFormat::Rgb24);
        assert_eq!(rgb.pixels(), &[3, 2, 1, 6, 5, 4]);
        Ok(())
    }

    #[test]
    fn solid_frame_reads_back_in_rgb() {
        let frame = Frame::solid(4, 4, [10, 20, 30], PixelFormat::Bgr24);
        assert_eq!(frame.pixels()[..3], [30, 20, 10]);
        assert_eq!(frame.rgb_at(3, 3), Some([10, 20, 30]));
        assert_eq!(frame.rgb_at(4, 0), None);
    }

    #[test]
    fn resize_to_working_resolution() -> Result<()> {
        let frame = Frame::solid(960, 720, [200, 100, 50], PixelFormat::Bgr24);
        let small = frame.resize(WORKING_RESOLUTION)?;
        assert_eq!(small.resolution(), WORKING_RESOLUTION);
        assert_eq!(small.format(), PixelFormat::Bgr24);
        assert_eq!(small.rgb_at(160, 120), Some([200, 100, 50]));
        Ok(())
    }

    #[test]
    fn rescale_maps_working_box_to_display() {
        let bbox = BoundingBox::new(10, 60, 50, 20);
        let scaled = bbox.rescale(WORKING_RESOLUTION, Resolution::new(960, 720));
        assert_eq!(scaled, BoundingBox::new(30, 180, 150, 60));
    }
}
